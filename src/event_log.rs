use std::cell::RefCell;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::state::DtlsTransportState;

/// Event log shared with the adaptor.
pub type SharedEventLog = Rc<RefCell<dyn RtcEventLog>>;

/// Records the adaptor logs on state changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RtcEvent {
    /// Writable changed.
    DtlsWritableState {
        /// The new value.
        writable: bool,
    },
    /// DTLS state changed.
    DtlsTransportState {
        /// The new state.
        state: DtlsTransportState,
    },
}

/// Append only sink for [`RtcEvent`].
pub trait RtcEventLog {
    /// Append an event.
    fn log(&mut self, event: RtcEvent);
}

/// Event log that keeps everything in memory.
#[derive(Debug, Default)]
pub struct MemoryEventLog {
    events: Vec<RtcEvent>,
}

impl MemoryEventLog {
    /// Empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Logged events, oldest first.
    pub fn events(&self) -> &[RtcEvent] {
        &self.events
    }

    /// Remove and return the logged events.
    pub fn take(&mut self) -> Vec<RtcEvent> {
        std::mem::take(&mut self.events)
    }
}

impl RtcEventLog for MemoryEventLog {
    fn log(&mut self, event: RtcEvent) {
        self.events.push(event);
    }
}
