//! The subset of RTCP the adaptor produces and inspects.

use thiserror::Error;

mod header;
pub use header::{RtcpHeader, RtcpType};

mod fmt;
pub use fmt::{FeedbackMessageType, TransportType};

mod twcc;
pub use twcc::{Delta, PacketChunk, PacketStatus, Twcc};

pub use super::Ssrc;

/// A serializable RTCP packet.
pub trait RtcpPacket {
    /// The header this packet is written with.
    fn header(&self) -> RtcpHeader;

    /// Length of entire RTCP packet (including header) in words (4 bytes).
    fn length_words(&self) -> usize;

    /// Write this packet to the buffer.
    ///
    /// Panics if the buffer doesn't have capacity to hold length_words * 4 bytes.
    fn write_to(&self, buf: &mut [u8]) -> usize;
}

/// Errors from building or parsing RTCP.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RtcpError {
    /// Less bytes than the smallest possible packet.
    #[error("RTCP packet too short: {0} bytes")]
    TooShort(usize),

    /// Version bits are not 2.
    #[error("RTCP version is not 2")]
    Version,

    /// Packet type is not one of 200-207.
    #[error("Unknown RTCP packet type: {0}")]
    UnknownType(u8),

    /// Feedback message type is not known for the packet type.
    #[error("Unknown RTCP feedback message type: {0}")]
    UnknownFmt(u8),

    /// Expected a transport wide congestion control packet.
    #[error("Not a transport wide feedback packet")]
    NotTransportWide,

    /// Contents do not add up.
    #[error("Malformed transport wide feedback: {0}")]
    Malformed(&'static str),

    /// The packet does not fit the buffer it is written to.
    #[error("RTCP packet needs {needed} bytes, buffer has {capacity}")]
    BufferTooSmall {
        /// Bytes needed.
        needed: usize,
        /// Bytes available.
        capacity: usize,
    },

    /// A receive delta can't be expressed in 16 bits of 250us.
    #[error("Receive delta out of range: {0} ticks")]
    DeltaOutOfRange(i64),
}
