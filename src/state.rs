use std::fmt;

use serde::{Deserialize, Serialize};

use crate::transport::DatagramTransportState;

/// Lifecycle of the secure channel as seen by the media stack above.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DtlsTransportState {
    /// Nothing heard from the datagram transport yet.
    New,
    /// Datagram transport is setting up.
    Connecting,
    /// Datagram transport is writable.
    Connected,
    /// Closed by the datagram transport. Terminal.
    Closed,
    /// Failed. Terminal.
    ///
    /// No datagram transport input leads here today. It is part of the DTLS
    /// state contract the layers above match on.
    Failed,
}

impl DtlsTransportState {
    /// Closed and Failed are never left.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Closed | Self::Failed)
    }
}

impl fmt::Display for DtlsTransportState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::New => "new",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Closed => "closed",
            Self::Failed => "failed",
        };
        write!(f, "{}", s)
    }
}

/// A change the state machine wants observers told about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateChange {
    /// New writable value.
    Writable(bool),
    /// The transport can take more packets.
    ReadyToSend,
    /// New receiving value.
    Receiving(bool),
    /// New DTLS state.
    Dtls(DtlsTransportState),
}

/// Combines ICE and datagram transport events into writable, receiving and
/// DTLS state.
///
/// Pure bookkeeping. Every input returns the changes in the order they must
/// be signalled, and writes that don't change a value produce nothing.
#[derive(Debug)]
pub struct StateMachine {
    bypass: bool,
    dtls_state: DtlsTransportState,
    writable: bool,
    receiving: bool,
}

impl StateMachine {
    /// In `bypass` writable and receiving follow ICE directly.
    pub fn new(bypass: bool) -> Self {
        StateMachine {
            bypass,
            dtls_state: DtlsTransportState::New,
            writable: false,
            receiving: false,
        }
    }

    /// Current DTLS state.
    pub fn dtls_state(&self) -> DtlsTransportState {
        self.dtls_state
    }

    /// Current writable state.
    pub fn writable(&self) -> bool {
        self.writable
    }

    /// Current receiving state.
    pub fn receiving(&self) -> bool {
        self.receiving
    }

    /// ICE writability changed.
    pub fn on_ice_writable(&mut self, ice_writable: bool) -> Vec<StateChange> {
        let mut out = vec![];

        if self.bypass {
            self.set_writable(ice_writable, &mut out);
            return out;
        }

        match self.dtls_state {
            DtlsTransportState::Connected => self.set_writable(ice_writable, &mut out),
            // Writability is only derived once the datagram transport is up.
            DtlsTransportState::New | DtlsTransportState::Connecting => {}
            DtlsTransportState::Closed | DtlsTransportState::Failed => {
                trace!("Ignore ICE writable in {}", self.dtls_state);
            }
        }

        out
    }

    /// ICE receiving changed.
    pub fn on_ice_receiving(&mut self, ice_receiving: bool) -> Vec<StateChange> {
        let mut out = vec![];

        if self.bypass || self.dtls_state == DtlsTransportState::Connected {
            self.set_receiving(ice_receiving, &mut out);
        }

        out
    }

    /// ICE can take more packets.
    pub fn on_ice_ready_to_send(&self) -> Vec<StateChange> {
        if self.writable {
            vec![StateChange::ReadyToSend]
        } else {
            vec![]
        }
    }

    /// Datagram transport state changed. `ice_writable` is the ICE
    /// writability at the time.
    ///
    /// Closed clears writable first, so a writable adaptor signals
    /// `Writable(false)` before `Dtls(Closed)`.
    pub fn on_datagram_state(
        &mut self,
        state: DatagramTransportState,
        ice_writable: bool,
    ) -> Vec<StateChange> {
        let mut out = vec![];

        if self.dtls_state.is_terminal() {
            debug!("Ignore datagram transport {:?} in {}", state, self.dtls_state);
            return out;
        }

        match state {
            DatagramTransportState::Pending => {
                // One way only. Going back from Connected would leave the
                // adaptor writable without being connected.
                if self.dtls_state == DtlsTransportState::New {
                    self.set_dtls_state(DtlsTransportState::Connecting, &mut out);
                } else {
                    debug!("Ignore datagram transport pending in {}", self.dtls_state);
                }
            }
            DatagramTransportState::Writable => {
                // Writable is held back until connected, so it goes first.
                self.set_writable(ice_writable, &mut out);
                self.set_dtls_state(DtlsTransportState::Connected, &mut out);
            }
            DatagramTransportState::Closed => {
                self.set_writable(false, &mut out);
                self.set_dtls_state(DtlsTransportState::Closed, &mut out);
            }
        }

        out
    }

    fn set_writable(&mut self, writable: bool, out: &mut Vec<StateChange>) {
        if self.writable == writable {
            return;
        }
        debug!("Set writable: {}", writable);
        self.writable = writable;
        if writable {
            out.push(StateChange::ReadyToSend);
        }
        out.push(StateChange::Writable(writable));
    }

    fn set_receiving(&mut self, receiving: bool, out: &mut Vec<StateChange>) {
        if self.receiving == receiving {
            return;
        }
        self.receiving = receiving;
        out.push(StateChange::Receiving(receiving));
    }

    fn set_dtls_state(&mut self, state: DtlsTransportState, out: &mut Vec<StateChange>) {
        if self.dtls_state == state {
            return;
        }
        debug!("Set dtls state from {} to {}", self.dtls_state, state);
        self.dtls_state = state;
        out.push(StateChange::Dtls(state));
    }
}
