use datagram_dtls::config::{FieldTrials, DISABLE_FEEDBACK_TRANSLATION_TRIAL};
use datagram_dtls::error::DatagramError;
use datagram_dtls::transport::PacketOptions;
use datagram_dtls::{AdaptorConfig, AdaptorError, SentPacketInfo};

mod common;
use common::{contains_seq, sender_report, tsn_config, RtpBuilder, TestAdaptor};

#[test]
pub fn rtp_send_strips_transport_sequence_number() {
    let t = TestAdaptor::new(tsn_config(5));
    t.connect();

    let pkt = RtpBuilder::new(0xDEADBEEF).tsn(5, 0x1234).total_len(200).build();
    assert_eq!(pkt.len(), 200);

    let n = t.send(&pkt, 77);
    let (id, sent) = t.last_datagram();

    // Extension header word and the padded element.
    assert_eq!(sent.len(), 192);
    assert_eq!(n, 192);

    assert!(!contains_seq(&sent, &[0x12, 0x34]));
    assert!(!contains_seq(&sent, &[0xBE, 0xDE]));
    assert_eq!(sent[0] & 0b0001_0000, 0, "X bit cleared");
    assert_eq!(&sent[8..12], &[0xDE, 0xAD, 0xBE, 0xEF]);
    assert_eq!(&sent[12..], &pkt[20..]);

    assert_eq!(
        t.adaptor.borrow().sent_packet_info(id),
        Some(SentPacketInfo::with_transport_sequence_number(
            77,
            0xDEADBEEF.into(),
            0x1234
        ))
    );
    assert_eq!(t.adaptor.borrow().outstanding_datagrams(), 1);
}

#[test]
pub fn rtp_send_keeps_other_extensions() {
    let t = TestAdaptor::new(tsn_config(5));

    let with = RtpBuilder::new(1)
        .ext(3, &[0x11, 0x22, 0x33])
        .tsn(5, 0x4321);
    let without = RtpBuilder::new(1).ext(3, &[0x11, 0x22, 0x33]);

    t.send(&with.build(), 1);
    let (_, sent) = t.last_datagram();

    assert_eq!(sent, without.build());
}

#[test]
pub fn rtp_without_transport_sequence_number_passes_through() {
    let t = TestAdaptor::new(tsn_config(5));

    let pkt = RtpBuilder::new(42).ext(3, &[1, 2, 3]).build();
    assert_eq!(t.send(&pkt, 9), pkt.len() as i32);

    let (id, sent) = t.last_datagram();
    assert_eq!(sent, pkt);
    assert_eq!(
        t.adaptor.borrow().sent_packet_info(id),
        Some(SentPacketInfo::new(9))
    );
}

#[test]
pub fn rtcp_passes_through() {
    let t = TestAdaptor::new(tsn_config(5));
    t.connect();
    t.take_events();

    let sr = sender_report(60);
    assert_eq!(t.send(&sr, 3), 60);

    let (id, sent) = t.last_datagram();
    assert_eq!(sent, sr);
    assert_eq!(
        t.adaptor.borrow().sent_packet_info(id),
        Some(SentPacketInfo::new(3))
    );

    // No feedback for RTCP, only the sent notification.
    t.ack(id, 1_000_000);
    let events = t.take_events();
    assert_eq!(events.len(), 1);
    assert!(matches!(events[0], common::Ev::Sent(s) if s.packet_id == 3));
}

#[test]
pub fn unparseable_rtp_is_not_sent() {
    let t = TestAdaptor::new(tsn_config(5));

    // Says RTP version 2 with an extension, but ends after the fixed header.
    let broken = [0x90, 96, 0, 1, 0, 0, 0, 1, 0, 0, 0, 1];
    assert_eq!(t.send(&broken, 1), -1);

    let err = t
        .adaptor
        .borrow_mut()
        .send_packet_checked(&broken, &PacketOptions::new(1), 0)
        .unwrap_err();
    assert!(matches!(err, AdaptorError::Rtp(_)));

    assert!(t.datagram.borrow().sent.is_empty());
    assert_eq!(t.adaptor.borrow().outstanding_datagrams(), 0);
}

#[test]
pub fn failed_datagram_send_leaves_nothing_outstanding() {
    let t = TestAdaptor::new(tsn_config(5));
    t.datagram.borrow_mut().fail_with = Some(DatagramError::NotWritable);

    let pkt = RtpBuilder::new(1).tsn(5, 1).build();
    assert_eq!(t.send(&pkt, 1), -1);

    let err = t
        .adaptor
        .borrow_mut()
        .send_packet_checked(&pkt, &PacketOptions::new(2), 0)
        .unwrap_err();
    assert!(matches!(
        err,
        AdaptorError::Datagram(DatagramError::NotWritable)
    ));

    assert_eq!(t.adaptor.borrow().outstanding_datagrams(), 0);

    // Recovers once the transport takes datagrams again.
    t.datagram.borrow_mut().fail_with = None;
    assert!(t.send(&pkt, 3) > 0);
    assert_eq!(t.adaptor.borrow().outstanding_datagrams(), 1);
}

#[test]
pub fn datagram_ids_increase() {
    let t = TestAdaptor::new(tsn_config(5));

    for i in 0..5 {
        t.send(&RtpBuilder::new(1).tsn(5, i).build(), i as i64);
    }

    let ids: Vec<u64> = t.datagram.borrow().sent.iter().map(|(id, _)| **id).collect();
    assert_eq!(ids, vec![0, 1, 2, 3, 4]);
}

#[test]
pub fn translation_disabled_sends_unchanged() {
    let trials = FieldTrials::new().set(DISABLE_FEEDBACK_TRANSLATION_TRIAL, "Enabled");
    let t = TestAdaptor::new(tsn_config(5).set_field_trials(trials));
    t.connect();
    t.take_events();

    let pkt = RtpBuilder::new(0xDEADBEEF).tsn(5, 0x1234).total_len(200).build();
    assert_eq!(t.send(&pkt, 8), 200);

    let (id, sent) = t.last_datagram();
    assert_eq!(sent, pkt);
    assert_eq!(
        t.adaptor.borrow().sent_packet_info(id),
        Some(SentPacketInfo::new(8))
    );

    // Acked, but no feedback is made up.
    t.ack(id, 12_345_000);
    let events = t.take_events();
    assert_eq!(events.len(), 1);
    assert!(matches!(events[0], common::Ev::Sent(s) if s.packet_id == 8));
}

#[test]
pub fn missing_extension_config_still_sends() {
    let t = TestAdaptor::new(AdaptorConfig::new());

    let pkt = RtpBuilder::new(1).tsn(5, 0x1234).build();
    assert_eq!(t.send(&pkt, 1), pkt.len() as i32);

    let (_, sent) = t.last_datagram();
    assert_eq!(sent, pkt);
}
