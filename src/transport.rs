//! Interfaces to the transports below the adaptor and the observers above it.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::id::{DatagramId, SinkId};
use crate::state::DtlsTransportState;

/// ICE transport shared between the adaptor and whoever created it.
pub type SharedIce = Rc<RefCell<dyn IceTransport>>;

/// Options passed along with an outgoing packet.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PacketOptions {
    /// Upper layer id, handed back in [`SentPacket`].
    pub packet_id: i64,
}

impl PacketOptions {
    /// Options carrying `packet_id`.
    pub fn new(packet_id: i64) -> Self {
        PacketOptions { packet_id }
    }
}

/// Notification that a packet left.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SentPacket {
    /// The id from [`PacketOptions`].
    pub packet_id: i64,
    /// Local time of sending.
    pub send_time_ms: i64,
}

/// Network route as reported by ICE. Forwarded, never interpreted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[allow(missing_docs)]
pub struct NetworkRoute {
    pub connected: bool,
    pub local_network_id: u16,
    pub remote_network_id: u16,
    pub last_sent_packet_id: i64,
    pub packet_overhead: u32,
}

/// Socket options forwarded to ICE.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum SocketOption {
    DontFragment,
    RcvBuf,
    SndBuf,
    NoDelay,
    Ipv6V6Only,
    Dscp,
    RtpSendTimeExtnId,
}

/// The ICE transport below the adaptor.
///
/// Provides liveness and routes. In bypass mode it also carries the packets.
pub trait IceTransport {
    /// Name of the transport, usually the MID it was created for.
    fn transport_name(&self) -> &str;

    /// Whether ICE can send.
    fn writable(&self) -> bool;

    /// Whether ICE is receiving.
    fn receiving(&self) -> bool;

    /// Send a packet. Byte count on success, -1 on failure.
    fn send_packet(&mut self, data: &[u8], options: &PacketOptions) -> i32;

    /// Set a socket option.
    fn set_option(&mut self, opt: SocketOption, value: i32) -> i32;

    /// Last socket error.
    fn error(&self) -> i32;

    /// Start delivering ICE events to `observer`.
    fn subscribe(&mut self, observer: Weak<dyn IceTransportObserver>) -> SinkId;

    /// Stop delivering events to a previous subscription.
    fn unsubscribe(&mut self, id: SinkId);
}

/// Events from the ICE transport.
///
/// May be called at any time, including from inside [`IceTransport::send_packet`].
pub trait IceTransportObserver {
    /// Writable state changed.
    fn on_writable_state(&self, writable: bool);

    /// Receiving state changed.
    fn on_receiving_state(&self, receiving: bool);

    /// ICE can take more packets.
    fn on_ready_to_send(&self);

    /// A packet arrived over ICE.
    fn on_read_packet(&self, data: &[u8], packet_time_us: i64, flags: i32);

    /// A packet was sent over ICE.
    fn on_sent_packet(&self, sent: SentPacket);

    /// Selected route changed.
    fn on_network_route_changed(&self, route: Option<NetworkRoute>);
}

/// Errors from [`DatagramTransport::send_datagram`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DatagramError {
    /// The transport is not up.
    #[error("Datagram transport is not writable")]
    NotWritable,

    /// The transport is closed.
    #[error("Datagram transport is closed")]
    Closed,

    /// Bigger than what fits a datagram.
    #[error("Datagram too large: {0} bytes")]
    TooLarge(usize),

    /// Some other transport specific failure.
    #[error("Datagram send failed: {0}")]
    Other(String),
}

/// State of the datagram transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DatagramTransportState {
    /// Connection is being set up.
    Pending,
    /// Datagrams can be sent.
    Writable,
    /// Closed, for good.
    Closed,
}

/// Ack for a sent datagram.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DatagramAck {
    /// The acked datagram.
    pub datagram_id: DatagramId,
    /// When the remote side received it.
    pub receive_timestamp_us: i64,
}

/// A secure datagram transport that acks or reports loss for every datagram.
pub trait DatagramTransport {
    /// Queue a datagram. Ack or loss is later reported for `id`.
    fn send_datagram(&mut self, data: &[u8], id: DatagramId) -> Result<(), DatagramError>;

    /// Set, or clear with `None`, where datagram events go.
    fn set_datagram_sink(&mut self, sink: Option<Weak<dyn DatagramSink>>);

    /// Set, or clear with `None`, where state changes go.
    fn set_transport_state_callback(&mut self, callback: Option<Weak<dyn TransportStateCallback>>);
}

/// Datagram events.
///
/// May be called at any time, including from inside
/// [`DatagramTransport::send_datagram`].
pub trait DatagramSink {
    /// A datagram arrived.
    fn on_datagram_received(&self, data: &[u8]);

    /// A datagram left.
    fn on_datagram_sent(&self, id: DatagramId);

    /// The remote side got a datagram.
    fn on_datagram_acked(&self, ack: DatagramAck);

    /// A datagram is considered lost.
    fn on_datagram_lost(&self, id: DatagramId);
}

/// Datagram transport state changes.
///
/// May be called at any time, including while the ICE transport is busy.
pub trait TransportStateCallback {
    /// The state changed.
    fn on_state_changed(&self, state: DatagramTransportState);
}

/// Datagram transport as handed to the adaptor.
///
/// The adaptor keeps the handle until dropped. The optional release action runs
/// when the adaptor drops, after the sinks are detached and before the ICE
/// transport is let go.
pub struct DatagramHandle {
    pub(crate) transport: Rc<RefCell<dyn DatagramTransport>>,
    pub(crate) on_drop: Option<Box<dyn FnOnce()>>,
}

impl DatagramHandle {
    /// Handle without a release action.
    pub fn new(transport: Rc<RefCell<dyn DatagramTransport>>) -> Self {
        DatagramHandle {
            transport,
            on_drop: None,
        }
    }

    /// Handle that runs `release` when the adaptor drops.
    pub fn with_release(
        transport: Rc<RefCell<dyn DatagramTransport>>,
        release: impl FnOnce() + 'static,
    ) -> Self {
        DatagramHandle {
            transport,
            on_drop: Some(Box::new(release)),
        }
    }
}

impl fmt::Debug for DatagramHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatagramHandle")
            .field("on_drop", &self.on_drop.is_some())
            .finish()
    }
}

/// What carries the packets below the adaptor.
#[derive(Debug)]
pub enum LowerTransport {
    /// The normal case.
    Datagram(DatagramHandle),
    /// Bypass. Packets go raw over ICE and no datagram transport is used.
    RawIce,
}

impl LowerTransport {
    /// Whether this is the raw ICE bypass.
    pub fn is_bypass(&self) -> bool {
        matches!(self, LowerTransport::RawIce)
    }
}

/// Events the adaptor signals upwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent<'a> {
    /// An incoming packet.
    ReadPacket {
        /// Packet bytes.
        data: &'a [u8],
        /// Arrival time, -1 when not known.
        packet_time_us: i64,
        /// Always 0.
        flags: i32,
    },
    /// A packet was sent.
    SentPacket(SentPacket),
    /// The adaptor can take more packets.
    ReadyToSend,
    /// Writable changed.
    WritableState(bool),
    /// Receiving changed.
    ReceivingState(bool),
    /// DTLS state changed.
    DtlsState(DtlsTransportState),
    /// ICE route changed.
    NetworkRouteChanged(Option<NetworkRoute>),
}

/// Receiver of [`TransportEvent`].
///
/// Called synchronously. Calling back into the adaptor from here is not allowed.
pub trait TransportEventSink {
    /// Handle an event.
    fn on_event(&mut self, event: &TransportEvent<'_>);
}

impl<F> TransportEventSink for F
where
    F: FnMut(&TransportEvent<'_>),
{
    fn on_event(&mut self, event: &TransportEvent<'_>) {
        (self)(event)
    }
}

/// Subscribed sinks in subscription order.
#[derive(Default)]
pub(crate) struct Sinks {
    last_id: u64,
    sinks: Vec<(SinkId, Box<dyn TransportEventSink>)>,
}

impl Sinks {
    pub fn add(&mut self, sink: Box<dyn TransportEventSink>) -> SinkId {
        let id = SinkId::from(self.last_id).next();
        self.last_id = *id;
        self.sinks.push((id, sink));
        id
    }

    pub fn remove(&mut self, id: SinkId) -> bool {
        let before = self.sinks.len();
        self.sinks.retain(|(i, _)| *i != id);
        self.sinks.len() != before
    }

    pub fn emit(&mut self, event: &TransportEvent<'_>) {
        for (_, sink) in &mut self.sinks {
            sink.on_event(event);
        }
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }
}

impl fmt::Debug for Sinks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sinks").field("len", &self.len()).finish()
    }
}
