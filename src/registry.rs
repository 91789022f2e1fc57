use std::collections::HashMap;

use crate::id::{DatagramId, Ssrc};

/// What the adaptor remembers about a datagram until it's acked or lost.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SentPacketInfo {
    packet_id: i64,
    // Both set, or neither.
    transport_cc: Option<(Ssrc, u16)>,
}

impl SentPacketInfo {
    /// Info for a datagram that won't get feedback synthesized.
    pub fn new(packet_id: i64) -> Self {
        SentPacketInfo {
            packet_id,
            transport_cc: None,
        }
    }

    /// Info for an RTP packet that carried a transport sequence number.
    pub fn with_transport_sequence_number(packet_id: i64, ssrc: Ssrc, seq: u16) -> Self {
        SentPacketInfo {
            packet_id,
            transport_cc: Some((ssrc, seq)),
        }
    }

    /// The id the upper layer passed along with the packet.
    pub fn packet_id(&self) -> i64 {
        self.packet_id
    }

    /// Media SSRC, if the packet was RTP with a transport sequence number.
    pub fn ssrc(&self) -> Option<Ssrc> {
        self.transport_cc.map(|(s, _)| s)
    }

    /// The stripped transport sequence number.
    pub fn transport_sequence_number(&self) -> Option<u16> {
        self.transport_cc.map(|(_, t)| t)
    }
}

/// A removed registry entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistryEntry {
    /// The recorded info.
    pub info: SentPacketInfo,
    /// Whether a sent notification already went out for this datagram.
    pub sent_notified: bool,
}

/// Outstanding datagrams, keyed by the id the adaptor allocated.
#[derive(Debug, Default)]
pub struct SentPacketRegistry {
    next_id: u64,
    entries: HashMap<DatagramId, RegistryEntry>,
}

impl SentPacketRegistry {
    /// Empty registry. The first id handed out is 0.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `info` under a fresh id.
    pub fn insert(&mut self, info: SentPacketInfo) -> DatagramId {
        let id: DatagramId = self.next_id.into();
        self.next_id = *id.next();

        self.entries.insert(
            id,
            RegistryEntry {
                info,
                sent_notified: false,
            },
        );

        id
    }

    /// Remove and return the entry for `id`.
    ///
    /// `None` if it was never there or already taken.
    pub fn take_by_id(&mut self, id: DatagramId) -> Option<RegistryEntry> {
        self.entries.remove(&id)
    }

    /// Flag that a sent notification went out for `id`.
    ///
    /// Returns the info if this is the first time, `None` for unknown ids
    /// and repeated calls.
    pub fn mark_sent(&mut self, id: DatagramId) -> Option<SentPacketInfo> {
        let entry = self.entries.get_mut(&id)?;
        if entry.sent_notified {
            return None;
        }
        entry.sent_notified = true;
        Some(entry.info)
    }

    /// Look at the entry for `id` without removing it.
    pub fn get(&self, id: DatagramId) -> Option<&RegistryEntry> {
        self.entries.get(&id)
    }

    /// Whether `id` is outstanding.
    pub fn contains(&self, id: DatagramId) -> bool {
        self.entries.contains_key(&id)
    }

    /// Number of outstanding datagrams.
    pub fn len(&self) -> usize {
        self.entries.len()
    }
}
