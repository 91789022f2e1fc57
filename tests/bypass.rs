use datagram_dtls::transport::{PacketOptions, SentPacket};
use datagram_dtls::{AdaptorError, DtlsTransportState};

mod common;
use common::{fire_ice, tsn_config, Ev, RtpBuilder, TestAdaptor};

#[test]
pub fn bypass_sends_raw_over_ice() {
    let t = TestAdaptor::bypass(tsn_config(5));
    assert!(t.adaptor.borrow().is_bypass());

    let pkt = RtpBuilder::new(0xDEADBEEF).tsn(5, 0x1234).total_len(200).build();
    assert_eq!(t.send(&pkt, 42), 200);

    // Unchanged, and not tracked.
    assert_eq!(t.ice.borrow().sent, vec![(pkt, 42)]);
    assert_eq!(t.adaptor.borrow().outstanding_datagrams(), 0);

    // The datagram transport is never touched.
    let datagram = t.datagram.borrow();
    assert!(datagram.sent.is_empty());
    assert!(!datagram.has_sink());
    assert!(!datagram.has_state_callback());
}

#[test]
pub fn bypass_send_failure() {
    let t = TestAdaptor::bypass(tsn_config(5));
    {
        let mut ice = t.ice.borrow_mut();
        ice.fail_send = true;
        ice.error = 111;
    }

    let pkt = RtpBuilder::new(1).build();
    assert_eq!(t.send(&pkt, 1), -1);

    let err = t
        .adaptor
        .borrow_mut()
        .send_packet_checked(&pkt, &PacketOptions::new(1), 0)
        .unwrap_err();
    assert!(matches!(err, AdaptorError::IceSend(111)));
    assert_eq!(t.adaptor.borrow().error(), 111);
}

#[test]
pub fn bypass_follows_ice() {
    let t = TestAdaptor::bypass(tsn_config(5));

    t.set_ice_writable(true);
    t.set_ice_receiving(true);
    assert_eq!(
        t.take_events(),
        vec![Ev::ReadyToSend, Ev::Writable(true), Ev::Receiving(true)]
    );

    t.set_ice_writable(false);
    t.set_ice_receiving(false);
    assert_eq!(
        t.take_events(),
        vec![Ev::Writable(false), Ev::Receiving(false)]
    );

    // No DTLS state to speak of.
    assert_eq!(t.dtls_state(), DtlsTransportState::New);
}

#[test]
pub fn bypass_forwards_ice_packets() {
    let t = TestAdaptor::bypass(tsn_config(5));

    let sent = SentPacket {
        packet_id: 5,
        send_time_ms: 1_234,
    };

    fire_ice(&t.ice, |o| o.on_read_packet(&[0x80, 96, 0, 1], 99, 0));
    fire_ice(&t.ice, |o| o.on_sent_packet(sent));

    assert_eq!(
        t.take_events(),
        vec![
            Ev::Read {
                data: vec![0x80, 96, 0, 1],
                packet_time_us: 99,
                flags: 0
            },
            Ev::Sent(sent)
        ]
    );
}

#[test]
pub fn bypass_drop_releases_nothing() {
    let t = TestAdaptor::bypass(tsn_config(5));
    assert_eq!(t.ice.borrow().observer_count(), 1);

    drop(t.adaptor);

    assert_eq!(t.ice.borrow().observer_count(), 0);
    assert!(!*t.released.borrow());
}
