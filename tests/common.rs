#![allow(unused)]

use std::cell::RefCell;
use std::rc::{Rc, Weak};
use std::sync::Once;

use datagram_dtls::clock::ManualClock;
use datagram_dtls::dtls::DtlsTransportInternal;
use datagram_dtls::error::DatagramError;
use datagram_dtls::event_log::{MemoryEventLog, SharedEventLog};
use datagram_dtls::rtp::Extension;
use datagram_dtls::transport::{DatagramAck, DatagramHandle, DatagramSink, DatagramTransport};
use datagram_dtls::transport::{DatagramTransportState, IceTransport, IceTransportObserver};
use datagram_dtls::transport::{LowerTransport, NetworkRoute, PacketOptions, SentPacket};
use datagram_dtls::transport::{SocketOption, TransportEvent, TransportStateCallback};
use datagram_dtls::{AdaptorConfig, DatagramDtlsAdaptor, DatagramId, DtlsTransportState, SinkId};

pub fn init_log() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"));

    static START: Once = Once::new();

    START.call_once(|| {
        tracing_subscriber::registry()
            .with(fmt::layer())
            .with(env_filter)
            .init();
    });
}

/// ICE transport that records what it's asked to do.
pub struct FakeIce {
    pub name: String,
    pub writable: bool,
    pub receiving: bool,
    pub error: i32,
    pub fail_send: bool,
    /// Report sent packets from inside `send_packet`, like a socket would.
    pub sent_inline: bool,
    pub sent: Vec<(Vec<u8>, i64)>,
    pub options: Vec<(SocketOption, i32)>,
    observers: Vec<(SinkId, Weak<dyn IceTransportObserver>)>,
    last_id: u64,
}

impl FakeIce {
    pub fn new(name: &str) -> Self {
        FakeIce {
            name: name.to_string(),
            writable: false,
            receiving: false,
            error: 0,
            fail_send: false,
            sent_inline: false,
            sent: vec![],
            options: vec![],
            observers: vec![],
            last_id: 0,
        }
    }

    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }
}

impl IceTransport for FakeIce {
    fn transport_name(&self) -> &str {
        &self.name
    }

    fn writable(&self) -> bool {
        self.writable
    }

    fn receiving(&self) -> bool {
        self.receiving
    }

    fn send_packet(&mut self, data: &[u8], options: &PacketOptions) -> i32 {
        if self.fail_send {
            return -1;
        }
        self.sent.push((data.to_vec(), options.packet_id));
        if self.sent_inline {
            let sent = SentPacket {
                packet_id: options.packet_id,
                send_time_ms: 777,
            };
            for o in self.observers.iter().filter_map(|(_, o)| o.upgrade()) {
                o.on_sent_packet(sent);
            }
        }
        data.len() as i32
    }

    fn set_option(&mut self, opt: SocketOption, value: i32) -> i32 {
        self.options.push((opt, value));
        0
    }

    fn error(&self) -> i32 {
        self.error
    }

    fn subscribe(&mut self, observer: Weak<dyn IceTransportObserver>) -> SinkId {
        self.last_id += 1;
        let id = SinkId::from(self.last_id);
        self.observers.push((id, observer));
        id
    }

    fn unsubscribe(&mut self, id: SinkId) {
        self.observers.retain(|(i, _)| *i != id);
    }
}

/// Deliver an ICE event to every live observer.
pub fn fire_ice(ice: &Rc<RefCell<FakeIce>>, f: impl Fn(&dyn IceTransportObserver)) {
    let observers: Vec<_> = ice
        .borrow()
        .observers
        .iter()
        .filter_map(|(_, o)| o.upgrade())
        .collect();

    for o in observers {
        f(&*o);
    }
}

/// Datagram transport that records sent datagrams.
#[derive(Default)]
pub struct FakeDatagram {
    pub sent: Vec<(DatagramId, Vec<u8>)>,
    pub fail_with: Option<DatagramError>,
    /// Report datagrams sent from inside `send_datagram`.
    pub sent_inline: bool,
    /// Ack datagrams from inside `send_datagram`, with this receive time.
    pub ack_inline_at: Option<i64>,
    sink: Option<Weak<dyn DatagramSink>>,
    state_callback: Option<Weak<dyn TransportStateCallback>>,
}

impl FakeDatagram {
    pub fn has_sink(&self) -> bool {
        self.sink.is_some()
    }

    pub fn has_state_callback(&self) -> bool {
        self.state_callback.is_some()
    }
}

impl DatagramTransport for FakeDatagram {
    fn send_datagram(&mut self, data: &[u8], id: DatagramId) -> Result<(), DatagramError> {
        if let Some(e) = &self.fail_with {
            return Err(e.clone());
        }
        self.sent.push((id, data.to_vec()));

        if let Some(sink) = self.sink.as_ref().and_then(|s| s.upgrade()) {
            if self.sent_inline {
                sink.on_datagram_sent(id);
            }
            if let Some(receive_timestamp_us) = self.ack_inline_at {
                sink.on_datagram_acked(DatagramAck {
                    datagram_id: id,
                    receive_timestamp_us,
                });
            }
        }

        Ok(())
    }

    fn set_datagram_sink(&mut self, sink: Option<Weak<dyn DatagramSink>>) {
        self.sink = sink;
    }

    fn set_transport_state_callback(&mut self, callback: Option<Weak<dyn TransportStateCallback>>) {
        self.state_callback = callback;
    }
}

pub fn with_sink(datagram: &Rc<RefCell<FakeDatagram>>, f: impl FnOnce(&dyn DatagramSink)) {
    let sink = datagram
        .borrow()
        .sink
        .as_ref()
        .and_then(|s| s.upgrade())
        .expect("datagram sink");
    f(&*sink);
}

pub fn set_datagram_state(datagram: &Rc<RefCell<FakeDatagram>>, state: DatagramTransportState) {
    let callback = datagram
        .borrow()
        .state_callback
        .as_ref()
        .and_then(|s| s.upgrade())
        .expect("state callback");
    callback.on_state_changed(state);
}

/// Owned copy of a [`TransportEvent`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ev {
    Read {
        data: Vec<u8>,
        packet_time_us: i64,
        flags: i32,
    },
    Sent(SentPacket),
    ReadyToSend,
    Writable(bool),
    Receiving(bool),
    Dtls(DtlsTransportState),
    Route(Option<NetworkRoute>),
}

impl From<&TransportEvent<'_>> for Ev {
    fn from(e: &TransportEvent<'_>) -> Self {
        match e {
            TransportEvent::ReadPacket {
                data,
                packet_time_us,
                flags,
            } => Ev::Read {
                data: data.to_vec(),
                packet_time_us: *packet_time_us,
                flags: *flags,
            },
            TransportEvent::SentPacket(s) => Ev::Sent(*s),
            TransportEvent::ReadyToSend => Ev::ReadyToSend,
            TransportEvent::WritableState(w) => Ev::Writable(*w),
            TransportEvent::ReceivingState(r) => Ev::Receiving(*r),
            TransportEvent::DtlsState(s) => Ev::Dtls(*s),
            TransportEvent::NetworkRouteChanged(r) => Ev::Route(*r),
        }
    }
}

/// Adaptor wired to fakes, recording everything it signals.
pub struct TestAdaptor {
    pub adaptor: Rc<RefCell<DatagramDtlsAdaptor>>,
    pub ice: Rc<RefCell<FakeIce>>,
    pub datagram: Rc<RefCell<FakeDatagram>>,
    pub clock: Rc<ManualClock>,
    pub log: Rc<RefCell<MemoryEventLog>>,
    pub released: Rc<RefCell<bool>>,
    events: Rc<RefCell<Vec<Ev>>>,
}

impl TestAdaptor {
    pub fn new(config: AdaptorConfig) -> Self {
        Self::build(config, false)
    }

    pub fn bypass(config: AdaptorConfig) -> Self {
        Self::build(config, true)
    }

    fn build(config: AdaptorConfig, bypass: bool) -> Self {
        init_log();

        let ice = Rc::new(RefCell::new(FakeIce::new("audio")));
        let datagram = Rc::new(RefCell::new(FakeDatagram::default()));
        let clock = Rc::new(ManualClock::new(5_000_000));
        let log = Rc::new(RefCell::new(MemoryEventLog::new()));
        let released = Rc::new(RefCell::new(false));

        let lower = if bypass {
            LowerTransport::RawIce
        } else {
            let r = released.clone();
            LowerTransport::Datagram(DatagramHandle::with_release(datagram.clone(), move || {
                *r.borrow_mut() = true;
            }))
        };

        let adaptor = DatagramDtlsAdaptor::with_collaborators(
            config,
            ice.clone(),
            lower,
            clock.clone(),
            Some(log.clone() as SharedEventLog),
        );

        let events = Rc::new(RefCell::new(vec![]));
        let e = events.clone();
        adaptor
            .borrow_mut()
            .subscribe(move |ev: &TransportEvent<'_>| e.borrow_mut().push(ev.into()));

        TestAdaptor {
            adaptor,
            ice,
            datagram,
            clock,
            log,
            released,
            events,
        }
    }

    pub fn take_events(&self) -> Vec<Ev> {
        std::mem::take(&mut *self.events.borrow_mut())
    }

    pub fn send(&self, data: &[u8], packet_id: i64) -> i32 {
        self.adaptor
            .borrow_mut()
            .send_packet(data, &PacketOptions::new(packet_id), 0)
    }

    pub fn set_ice_writable(&self, writable: bool) {
        self.ice.borrow_mut().writable = writable;
        fire_ice(&self.ice, |o| o.on_writable_state(writable));
    }

    pub fn set_ice_receiving(&self, receiving: bool) {
        self.ice.borrow_mut().receiving = receiving;
        fire_ice(&self.ice, |o| o.on_receiving_state(receiving));
    }

    pub fn ice_ready_to_send(&self) {
        fire_ice(&self.ice, |o| o.on_ready_to_send());
    }

    pub fn set_datagram_state(&self, state: DatagramTransportState) {
        set_datagram_state(&self.datagram, state);
    }

    /// ICE writable, then the datagram transport goes pending and writable.
    pub fn connect(&self) {
        self.set_ice_writable(true);
        self.set_datagram_state(DatagramTransportState::Pending);
        self.set_datagram_state(DatagramTransportState::Writable);
    }

    pub fn ack(&self, datagram_id: DatagramId, receive_timestamp_us: i64) {
        with_sink(&self.datagram, |s| {
            s.on_datagram_acked(DatagramAck {
                datagram_id,
                receive_timestamp_us,
            })
        });
    }

    pub fn lost(&self, id: DatagramId) {
        with_sink(&self.datagram, |s| s.on_datagram_lost(id));
    }

    pub fn datagram_sent(&self, id: DatagramId) {
        with_sink(&self.datagram, |s| s.on_datagram_sent(id));
    }

    pub fn receive(&self, data: &[u8]) {
        with_sink(&self.datagram, |s| s.on_datagram_received(data));
    }

    /// Id and bytes of the last datagram handed to the datagram transport.
    pub fn last_datagram(&self) -> (DatagramId, Vec<u8>) {
        self.datagram
            .borrow()
            .sent
            .last()
            .cloned()
            .expect("a sent datagram")
    }

    pub fn dtls_state(&self) -> DtlsTransportState {
        self.adaptor.borrow().dtls_state()
    }

    pub fn writable(&self) -> bool {
        self.adaptor.borrow().writable()
    }
}

/// Config with the transport sequence number at `id`.
pub fn tsn_config(id: u8) -> AdaptorConfig {
    AdaptorConfig::new()
        .add_rtp_header_extension(Extension::AbsoluteSendTime, 3)
        .add_rtp_header_extension(Extension::TransportSequenceNumber, id)
}

/// Builds RTP packets with one-byte form header extensions.
#[derive(Debug, Clone)]
pub struct RtpBuilder {
    pub ssrc: u32,
    pub seq: u16,
    pub timestamp: u32,
    pub pt: u8,
    pub marker: bool,
    pub csrcs: Vec<u32>,
    /// (id, value) elements in order.
    pub exts: Vec<(u8, Vec<u8>)>,
    pub payload: Vec<u8>,
}

impl RtpBuilder {
    pub fn new(ssrc: u32) -> Self {
        RtpBuilder {
            ssrc,
            seq: 1,
            timestamp: 0x1000,
            pt: 96,
            marker: false,
            csrcs: vec![],
            exts: vec![],
            payload: vec![0xAA; 100],
        }
    }

    pub fn tsn(mut self, id: u8, seq: u16) -> Self {
        self.exts.push((id, seq.to_be_bytes().to_vec()));
        self
    }

    pub fn ext(mut self, id: u8, value: &[u8]) -> Self {
        self.exts.push((id, value.to_vec()));
        self
    }

    pub fn payload(mut self, payload: Vec<u8>) -> Self {
        self.payload = payload;
        self
    }

    /// Header length with the current extensions.
    pub fn header_len(&self) -> usize {
        12 + self.csrcs.len() * 4 + self.ext_block().len()
    }

    /// Pad the payload so the whole packet is `len` bytes.
    pub fn total_len(mut self, len: usize) -> Self {
        let n = len - self.header_len();
        self.payload = vec![0xAA; n];
        self
    }

    fn ext_block(&self) -> Vec<u8> {
        if self.exts.is_empty() {
            return vec![];
        }

        let mut body = vec![];
        for (id, value) in &self.exts {
            assert!((1..=14).contains(id));
            assert!((1..=16).contains(&value.len()));
            body.push((id << 4) | (value.len() as u8 - 1));
            body.extend_from_slice(value);
        }
        while body.len() % 4 != 0 {
            body.push(0);
        }

        let mut block = vec![0xBE, 0xDE];
        block.extend_from_slice(&((body.len() / 4) as u16).to_be_bytes());
        block.extend_from_slice(&body);
        block
    }

    pub fn build(&self) -> Vec<u8> {
        let ext_block = self.ext_block();

        let mut b0 = 0b1000_0000 | self.csrcs.len() as u8;
        if !ext_block.is_empty() {
            b0 |= 0b0001_0000;
        }
        let b1 = (if self.marker { 0x80 } else { 0 }) | self.pt;

        let mut buf = vec![b0, b1];
        buf.extend_from_slice(&self.seq.to_be_bytes());
        buf.extend_from_slice(&self.timestamp.to_be_bytes());
        buf.extend_from_slice(&self.ssrc.to_be_bytes());
        for c in &self.csrcs {
            buf.extend_from_slice(&c.to_be_bytes());
        }
        buf.extend_from_slice(&ext_block);
        buf.extend_from_slice(&self.payload);
        buf
    }
}

/// An RTCP sender report of `len` bytes, `len` a multiple of 4.
pub fn sender_report(len: usize) -> Vec<u8> {
    assert!(len % 4 == 0 && len >= 28);
    let mut buf = vec![0x80, 200];
    buf.extend_from_slice(&((len / 4 - 1) as u16).to_be_bytes());
    buf.extend_from_slice(&0xCAFEBABE_u32.to_be_bytes());
    buf.extend((0..len - 8).map(|i| i as u8));
    buf
}

pub fn contains_seq(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|w| w == needle)
}
