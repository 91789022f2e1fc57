use std::borrow::Cow;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Weak;

use crate::adaptor::DatagramDtlsAdaptor;
use crate::id::DatagramId;
use crate::transport::{DatagramAck, DatagramSink, DatagramTransportState};
use crate::transport::{IceTransportObserver, NetworkRoute, SentPacket, TransportStateCallback};

/// Something the transports below reported.
#[derive(Debug)]
pub(crate) enum Input<'a> {
    IceWritable(bool),
    IceReceiving(bool),
    IceReadyToSend,
    IceRead {
        data: Cow<'a, [u8]>,
        packet_time_us: i64,
        flags: i32,
    },
    IceSent(SentPacket),
    RouteChanged(Option<NetworkRoute>),
    DatagramReceived(Cow<'a, [u8]>),
    DatagramSent(DatagramId),
    DatagramAcked(DatagramAck),
    DatagramLost(DatagramId),
    DatagramState(DatagramTransportState),
}

impl Input<'_> {
    fn into_owned(self) -> Input<'static> {
        match self {
            Input::IceWritable(v) => Input::IceWritable(v),
            Input::IceReceiving(v) => Input::IceReceiving(v),
            Input::IceReadyToSend => Input::IceReadyToSend,
            Input::IceRead {
                data,
                packet_time_us,
                flags,
            } => Input::IceRead {
                data: Cow::Owned(data.into_owned()),
                packet_time_us,
                flags,
            },
            Input::IceSent(v) => Input::IceSent(v),
            Input::RouteChanged(v) => Input::RouteChanged(v),
            Input::DatagramReceived(data) => Input::DatagramReceived(Cow::Owned(data.into_owned())),
            Input::DatagramSent(v) => Input::DatagramSent(v),
            Input::DatagramAcked(v) => Input::DatagramAcked(v),
            Input::DatagramLost(v) => Input::DatagramLost(v),
            Input::DatagramState(v) => Input::DatagramState(v),
        }
    }
}

/// Where the transports below deliver their callbacks.
///
/// An input goes straight to the adaptor when it is free. When the adaptor is
/// busy, typically because the callback comes from inside a send the adaptor is
/// making, the input is queued and the adaptor handles it before returning.
pub(crate) struct Inbox {
    adaptor: Weak<RefCell<DatagramDtlsAdaptor>>,
    queue: RefCell<VecDeque<Input<'static>>>,
}

impl Inbox {
    pub fn new(adaptor: Weak<RefCell<DatagramDtlsAdaptor>>) -> Self {
        Inbox {
            adaptor,
            queue: RefCell::new(VecDeque::new()),
        }
    }

    /// Next queued input, oldest first.
    pub fn pop(&self) -> Option<Input<'static>> {
        self.queue.borrow_mut().pop_front()
    }

    pub fn len(&self) -> usize {
        self.queue.borrow().len()
    }

    fn deliver(&self, input: Input<'_>) {
        let Some(rc) = self.adaptor.upgrade() else {
            trace!("Adaptor gone, drop input: {:?}", input);
            return;
        };

        let Ok(mut adaptor) = rc.try_borrow_mut() else {
            trace!("Adaptor busy, queue input");
            self.queue.borrow_mut().push_back(input.into_owned());
            return;
        };

        // Anything queued came first.
        adaptor.handle_queued();
        adaptor.handle_input(input);
    }
}

impl IceTransportObserver for Inbox {
    fn on_writable_state(&self, writable: bool) {
        self.deliver(Input::IceWritable(writable));
    }

    fn on_receiving_state(&self, receiving: bool) {
        self.deliver(Input::IceReceiving(receiving));
    }

    fn on_ready_to_send(&self) {
        self.deliver(Input::IceReadyToSend);
    }

    fn on_read_packet(&self, data: &[u8], packet_time_us: i64, flags: i32) {
        self.deliver(Input::IceRead {
            data: Cow::Borrowed(data),
            packet_time_us,
            flags,
        });
    }

    fn on_sent_packet(&self, sent: SentPacket) {
        self.deliver(Input::IceSent(sent));
    }

    fn on_network_route_changed(&self, route: Option<NetworkRoute>) {
        self.deliver(Input::RouteChanged(route));
    }
}

impl DatagramSink for Inbox {
    fn on_datagram_received(&self, data: &[u8]) {
        self.deliver(Input::DatagramReceived(Cow::Borrowed(data)));
    }

    fn on_datagram_sent(&self, id: DatagramId) {
        self.deliver(Input::DatagramSent(id));
    }

    fn on_datagram_acked(&self, ack: DatagramAck) {
        self.deliver(Input::DatagramAcked(ack));
    }

    fn on_datagram_lost(&self, id: DatagramId) {
        self.deliver(Input::DatagramLost(id));
    }
}

impl TransportStateCallback for Inbox {
    fn on_state_changed(&self, state: DatagramTransportState) {
        self.deliver(Input::DatagramState(state));
    }
}
