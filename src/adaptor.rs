use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use crate::clock::{Clock, MonotonicClock};
use crate::config::{AdaptorConfig, CryptoOptions};
use crate::dtls::{Capability, DtlsCert, DtlsError, DtlsRole, DtlsTransportInternal};
use crate::dtls::{Fingerprint, SslCertChain, SslProtocolVersion};
use crate::event_log::{RtcEvent, SharedEventLog};
use crate::feedback::FeedbackSynthesizer;
use crate::id::{DatagramId, SinkId};
use crate::inbox::{Inbox, Input};
use crate::registry::{SentPacketInfo, SentPacketRegistry};
use crate::rewrite::RtpRewriter;
use crate::state::{DtlsTransportState, StateChange, StateMachine};
use crate::thread::ThreadChecker;
use crate::transport::{DatagramAck, DatagramSink, DatagramTransportState};
use crate::transport::{IceTransportObserver, LowerTransport, PacketOptions};
use crate::transport::{SentPacket, SharedIce, Sinks, SocketOption};
use crate::transport::{TransportEvent, TransportEventSink, TransportStateCallback};
use crate::AdaptorError;

/// Component reported by [`DatagramDtlsAdaptor::component()`].
pub const DATAGRAM_DTLS_ADAPTOR_COMPONENT: i32 = -1;

/// DTLS transport facade over a datagram transport.
///
/// Looks like a DTLS transport to the media stack above, while the datagram
/// transport below provides security and per datagram acks. Outgoing RTP has
/// its transport sequence number removed, and the acks are turned back into
/// transport wide RTCP feedback delivered as incoming packets.
///
/// All calls, including the callbacks from the transports below, must come
/// from the thread that created the adaptor. The transports may call back
/// while the adaptor is sending. Such callbacks are handled before the send
/// returns.
pub struct DatagramDtlsAdaptor {
    config: AdaptorConfig,
    rewriter: RtpRewriter,
    registry: SentPacketRegistry,
    feedback: FeedbackSynthesizer,
    state: StateMachine,
    // Last writable value reported by ICE.
    ice_writable: bool,
    sinks: Sinks,
    clock: Rc<dyn Clock>,
    event_log: Option<SharedEventLog>,
    thread: ThreadChecker,
    inbox: Rc<Inbox>,
    ice_subscription: Option<SinkId>,
    // Field order matters, the datagram transport goes before ICE.
    lower: LowerTransport,
    ice: SharedIce,
}

impl fmt::Debug for DatagramDtlsAdaptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatagramDtlsAdaptor").finish_non_exhaustive()
    }
}

impl DatagramDtlsAdaptor {
    /// Create the adaptor and subscribe it to the transports below.
    pub fn new(config: AdaptorConfig, ice: SharedIce, lower: LowerTransport) -> Rc<RefCell<Self>> {
        Self::with_collaborators(config, ice, lower, Rc::new(MonotonicClock::new()), None)
    }

    /// Like [`DatagramDtlsAdaptor::new()`] with a specific clock and event log.
    pub fn with_collaborators(
        config: AdaptorConfig,
        ice: SharedIce,
        lower: LowerTransport,
        clock: Rc<dyn Clock>,
        event_log: Option<SharedEventLog>,
    ) -> Rc<RefCell<Self>> {
        let rewriter = RtpRewriter::new(config.rtp_header_extensions(), config.translate_feedback());

        if !rewriter.has_transport_sequence_number() {
            error!("Transport sequence numbers are not supported in datagram transport connection");
        }
        if !rewriter.translates() {
            info!("Datagram to RTCP feedback translation disabled");
        }

        let bypass = lower.is_bypass();
        if bypass {
            debug!("Bypass datagram transport, packets go over ICE");
        }

        let ice_writable = ice.borrow().writable();

        let adaptor = Rc::new_cyclic(|weak: &Weak<RefCell<Self>>| {
            RefCell::new(DatagramDtlsAdaptor {
                config,
                rewriter,
                registry: SentPacketRegistry::new(),
                feedback: FeedbackSynthesizer::new(),
                state: StateMachine::new(bypass),
                ice_writable,
                sinks: Sinks::default(),
                clock,
                event_log,
                thread: ThreadChecker::new(),
                inbox: Rc::new(Inbox::new(weak.clone())),
                ice_subscription: None,
                lower,
                ice,
            })
        });

        Self::connect(&adaptor);

        adaptor
    }

    fn connect(this: &Rc<RefCell<Self>>) {
        // No adaptor borrow is held while the transports are called, they may
        // call straight back.
        let me = this.borrow();
        let inbox = me.inbox.clone();
        let ice = me.ice.clone();
        let datagram = match &me.lower {
            LowerTransport::Datagram(handle) => Some(handle.transport.clone()),
            LowerTransport::RawIce => None,
        };
        drop(me);

        let weak: Weak<Inbox> = Rc::downgrade(&inbox);
        let observer: Weak<dyn IceTransportObserver> = weak.clone();
        let sink: Weak<dyn DatagramSink> = weak.clone();
        let callback: Weak<dyn TransportStateCallback> = weak;

        let id = ice.borrow_mut().subscribe(observer);
        this.borrow_mut().ice_subscription = Some(id);

        if let Some(datagram) = datagram {
            let mut transport = datagram.borrow_mut();
            transport.set_datagram_sink(Some(sink));
            transport.set_transport_state_callback(Some(callback));
        }

        this.borrow_mut().handle_queued();
    }

    /// Send a packet. Byte count on success, -1 on failure.
    ///
    /// See [`DatagramDtlsAdaptor::send_packet_checked()`] for the reason of a failure.
    pub fn send_packet(&mut self, data: &[u8], options: &PacketOptions, flags: i32) -> i32 {
        match self.send_packet_checked(data, options, flags) {
            Ok(n) => n as i32,
            Err(e) => {
                debug!("Send packet failed, packet id {}: {}", options.packet_id, e);
                -1
            }
        }
    }

    /// Send a packet, returning the number of bytes handed to the transport below.
    ///
    /// RTCP and RTP without transport sequence number are sent as is. RTP with
    /// a transport sequence number is sent without it. RTP that fails to parse
    /// is an error and nothing is sent.
    pub fn send_packet_checked(
        &mut self,
        data: &[u8],
        options: &PacketOptions,
        flags: i32,
    ) -> Result<usize, AdaptorError> {
        self.thread.check();
        self.handle_queued();

        let ret = self.do_send_packet(data, options, flags);

        // Callbacks the transport made while sending.
        self.handle_queued();

        ret
    }

    fn do_send_packet(
        &mut self,
        data: &[u8],
        options: &PacketOptions,
        flags: i32,
    ) -> Result<usize, AdaptorError> {
        if flags != 0 {
            trace!("Ignoring send flags: {}", flags);
        }

        let handle = match &self.lower {
            LowerTransport::Datagram(handle) => handle,
            LowerTransport::RawIce => {
                let n = self.ice.borrow_mut().send_packet(data, options);
                if n < 0 {
                    return Err(AdaptorError::IceSend(self.ice.borrow().error()));
                }
                return Ok(n as usize);
            }
        };

        let prepared = self.rewriter.prepare(data, options.packet_id)?;
        // Registered first, the transport may report it sent before returning.
        let id = self.registry.insert(prepared.info);

        let sent = handle
            .transport
            .borrow_mut()
            .send_datagram(&prepared.payload, id);

        if let Err(e) = sent {
            // Never acked or lost, don't keep it.
            self.registry.take_by_id(id);
            return Err(e.into());
        }

        Ok(prepared.payload.len())
    }

    /// Forwarded to ICE.
    pub fn set_option(&mut self, opt: SocketOption, value: i32) -> i32 {
        self.thread.check();
        let ret = self.ice.borrow_mut().set_option(opt, value);
        self.handle_queued();
        ret
    }

    /// Last error from ICE.
    pub fn error(&self) -> i32 {
        self.ice.borrow().error()
    }

    /// Whether packets can be sent.
    ///
    /// Can be false even when ICE is writable, it's held back until the
    /// datagram transport is up.
    pub fn writable(&self) -> bool {
        self.state.writable()
    }

    /// Whether packets are received.
    pub fn receiving(&self) -> bool {
        self.state.receiving()
    }

    /// Name of the ICE transport.
    pub fn transport_name(&self) -> String {
        self.ice.borrow().transport_name().to_string()
    }

    /// The ICE transport below.
    pub fn ice_transport(&self) -> SharedIce {
        self.ice.clone()
    }

    /// The crypto options from the config.
    pub fn crypto_options(&self) -> &CryptoOptions {
        self.config.crypto_options()
    }

    /// Whether packets bypass the datagram transport.
    pub fn is_bypass(&self) -> bool {
        self.lower.is_bypass()
    }

    /// What is remembered about a datagram not yet acked or lost.
    pub fn sent_packet_info(&self, id: DatagramId) -> Option<SentPacketInfo> {
        self.registry.get(id).map(|e| e.info)
    }

    /// Number of datagrams not yet acked or lost.
    pub fn outstanding_datagrams(&self) -> usize {
        self.registry.len()
    }

    /// Receive [`TransportEvent`] until unsubscribed.
    pub fn subscribe(&mut self, sink: impl TransportEventSink + 'static) -> SinkId {
        self.thread.check();
        self.sinks.add(Box::new(sink))
    }

    /// Stop a subscription. False if it wasn't there.
    pub fn unsubscribe(&mut self, id: SinkId) -> bool {
        self.thread.check();
        self.sinks.remove(id)
    }

    /// Handle callbacks that arrived while the adaptor was busy.
    ///
    /// This happens by itself at the end of every send. It is only needed when
    /// a transport calls back while the adaptor is borrowed for something else.
    pub fn handle_queued(&mut self) {
        let n = self.inbox.len();
        if n > 0 {
            trace!("Handle {} queued inputs", n);
        }

        while let Some(input) = self.inbox.pop() {
            self.handle_input(input);
        }
    }

    pub(crate) fn handle_input(&mut self, input: Input<'_>) {
        self.thread.check();

        match input {
            Input::IceWritable(writable) => self.on_ice_writable(writable),
            Input::IceReceiving(receiving) => {
                trace!("ICE receiving: {}", receiving);
                let changes = self.state.on_ice_receiving(receiving);
                self.apply(changes);
            }
            Input::IceReadyToSend => {
                let changes = self.state.on_ice_ready_to_send();
                self.apply(changes);
            }
            Input::IceRead {
                data,
                packet_time_us,
                flags,
            } => self.on_ice_read(&data, packet_time_us, flags),
            Input::IceSent(sent) => self.on_ice_sent(sent),
            Input::RouteChanged(route) => {
                self.sinks.emit(&TransportEvent::NetworkRouteChanged(route));
            }
            Input::DatagramReceived(data) => {
                // No arrival time, layers above stamp -1 with their own clock.
                self.emit_read(&data, -1);
            }
            Input::DatagramSent(id) => self.on_datagram_sent(id),
            Input::DatagramAcked(ack) => self.on_datagram_acked(ack),
            Input::DatagramLost(id) => self.on_datagram_lost(id),
            Input::DatagramState(state) => self.on_datagram_state(state),
        }
    }

    fn apply(&mut self, changes: Vec<StateChange>) {
        for change in changes {
            let event = match change {
                StateChange::Writable(writable) => {
                    self.log_event(RtcEvent::DtlsWritableState { writable });
                    TransportEvent::WritableState(writable)
                }
                StateChange::ReadyToSend => TransportEvent::ReadyToSend,
                StateChange::Receiving(receiving) => TransportEvent::ReceivingState(receiving),
                StateChange::Dtls(state) => {
                    self.log_event(RtcEvent::DtlsTransportState { state });
                    TransportEvent::DtlsState(state)
                }
            };
            self.sinks.emit(&event);
        }
    }

    fn log_event(&self, event: RtcEvent) {
        if let Some(log) = &self.event_log {
            log.borrow_mut().log(event);
        }
    }

    fn emit_sent(&mut self, packet_id: i64) {
        let sent = SentPacket {
            packet_id,
            send_time_ms: self.clock.now_ms(),
        };
        self.sinks.emit(&TransportEvent::SentPacket(sent));
    }

    fn emit_read(&mut self, data: &[u8], packet_time_us: i64) {
        self.sinks.emit(&TransportEvent::ReadPacket {
            data,
            packet_time_us,
            flags: 0,
        });
    }

    fn on_ice_writable(&mut self, writable: bool) {
        trace!("ICE writable: {}", writable);
        self.ice_writable = writable;
        let changes = self.state.on_ice_writable(writable);
        self.apply(changes);
    }

    fn on_ice_read(&mut self, data: &[u8], packet_time_us: i64, flags: i32) {
        if !self.is_bypass() {
            trace!("Ignore ICE read packet, packets come from the datagram transport");
            return;
        }
        debug_assert_eq!(flags, 0);
        self.emit_read(data, packet_time_us);
    }

    fn on_ice_sent(&mut self, sent: SentPacket) {
        if !self.is_bypass() {
            trace!("Ignore ICE sent packet {}", sent.packet_id);
            return;
        }
        self.sinks.emit(&TransportEvent::SentPacket(sent));
    }

    fn on_datagram_sent(&mut self, id: DatagramId) {
        if let Some(info) = self.registry.mark_sent(id) {
            self.emit_sent(info.packet_id());
        } else if self.registry.contains(id) {
            trace!("Datagram {} already notified as sent", id);
        } else {
            warn!("No sent packet info for sent datagram id: {}", id);
        }
    }

    fn on_datagram_acked(&mut self, ack: DatagramAck) {
        let Some(entry) = self.registry.take_by_id(ack.datagram_id) else {
            // An ack after the loss is reported is late, not harmful.
            warn!("No sent packet info for acked datagram id: {}", ack.datagram_id);
            return;
        };

        trace!(
            "Datagram acked, id: {}, packet id: {}, transport seq: {:?}, receive: {}us",
            ack.datagram_id,
            entry.info.packet_id(),
            entry.info.transport_sequence_number(),
            ack.receive_timestamp_us
        );

        if !entry.sent_notified {
            self.emit_sent(entry.info.packet_id());
        }

        match self
            .feedback
            .synthesize(&entry.info, ack.receive_timestamp_us)
        {
            Ok(Some(data)) => {
                self.sinks.emit(&TransportEvent::ReadPacket {
                    data,
                    packet_time_us: -1,
                    flags: 0,
                });
            }
            Ok(None) => {}
            Err(e) => warn!("Failed to create RTCP feedback: {}", e),
        }
    }

    fn on_datagram_lost(&mut self, id: DatagramId) {
        info!("Datagram lost, id: {}", id);

        if self.registry.take_by_id(id).is_none() {
            warn!("No sent packet info for lost datagram id: {}", id);
        }
    }

    fn on_datagram_state(&mut self, state: DatagramTransportState) {
        debug!("Datagram transport state: {:?}", state);

        // The cached value, ICE may well be busy calling us.
        let changes = self.state.on_datagram_state(state, self.ice_writable);
        self.apply(changes);
    }
}

fn unsupported(operation: &'static str) -> DtlsError {
    DtlsError::Unsupported {
        capability: Capability::DatagramModeNoDtls,
        operation,
    }
}

impl DtlsTransportInternal for DatagramDtlsAdaptor {
    fn dtls_state(&self) -> DtlsTransportState {
        self.state.dtls_state()
    }

    fn component(&self) -> i32 {
        DATAGRAM_DTLS_ADAPTOR_COMPONENT
    }

    fn is_dtls_active(&self) -> bool {
        false
    }

    fn dtls_role(&self) -> Option<DtlsRole> {
        None
    }

    fn set_dtls_role(&mut self, _role: DtlsRole) -> Result<(), DtlsError> {
        Err(unsupported("set_dtls_role"))
    }

    fn srtp_crypto_suite(&self) -> Option<u16> {
        None
    }

    fn ssl_cipher_suite(&self) -> Option<u16> {
        None
    }

    fn local_certificate(&self) -> Option<DtlsCert> {
        None
    }

    fn set_local_certificate(&mut self, _cert: DtlsCert) -> Result<(), DtlsError> {
        Err(unsupported("set_local_certificate"))
    }

    fn remote_ssl_cert_chain(&self) -> Option<SslCertChain> {
        None
    }

    fn export_keying_material(
        &mut self,
        _label: &str,
        _context: Option<&[u8]>,
        _len: usize,
    ) -> Result<Vec<u8>, DtlsError> {
        Err(unsupported("export_keying_material"))
    }

    fn set_remote_fingerprint(&mut self, fingerprint: &Fingerprint) -> Result<(), DtlsError> {
        // TODO: fail here once the media stack stops setting fingerprints for datagram transports.
        debug!("Ignoring remote fingerprint: {}", fingerprint);
        Ok(())
    }

    fn set_ssl_max_protocol_version(
        &mut self,
        version: SslProtocolVersion,
    ) -> Result<(), DtlsError> {
        debug!("Ignoring max protocol version: {:?}", version);
        Ok(())
    }

    fn capability(&self) -> Capability {
        Capability::DatagramModeNoDtls
    }

    fn require_dtls(&self, operation: &'static str) -> Result<(), DtlsError> {
        Err(unsupported(operation))
    }
}

impl Drop for DatagramDtlsAdaptor {
    fn drop(&mut self) {
        let queued = self.inbox.len();
        if queued > 0 {
            debug!("Drop adaptor with {} unhandled inputs", queued);
        }

        if let LowerTransport::Datagram(handle) = &mut self.lower {
            match handle.transport.try_borrow_mut() {
                Ok(mut transport) => {
                    transport.set_datagram_sink(None);
                    transport.set_transport_state_callback(None);
                }
                Err(_) => warn!("Datagram transport busy, sinks not detached"),
            }

            if let Some(release) = handle.on_drop.take() {
                release();
            }
        }

        if let Some(id) = self.ice_subscription.take() {
            match self.ice.try_borrow_mut() {
                Ok(mut ice) => ice.unsubscribe(id),
                Err(_) => warn!("ICE transport busy, not unsubscribed"),
            }
        }
    }
}
