use thiserror::Error;

pub use crate::id::{Pt, Ssrc};

mod ext;
pub use ext::{Extension, ExtensionMap, ExtensionValues, RtpExtension};

mod header;
pub use header::RtpHeader;

pub mod rtcp;

/// Errors that can arise in RTP.
#[derive(Debug, Error)]
pub enum RtpError {
    /// Failed to parse RTP header.
    #[error("Failed to parse RTP header")]
    ParseHeader,

    /// The header extension to remove is not in the packet.
    #[error("RTP header extension {0} not present")]
    MissingExtension(u8),
}

/// Tells whether a datagram is RTCP rather than RTP.
///
/// Uses the payload type range from RFC 5761 section 4 for multiplexed
/// RTP and RTCP. Packet types 192-223 land in 64-95 once the marker bit
/// is masked off.
pub fn is_rtcp(buf: &[u8]) -> bool {
    // Smallest RTCP packet is the 4 byte header.
    if buf.len() < 4 {
        return false;
    }

    let version = buf[0] >> 6;
    if version != 2 {
        return false;
    }

    let payload_type = buf[1] & 0x7f;
    (64..96).contains(&payload_type)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn rtcp_demux() {
        // Sender report
        assert!(is_rtcp(&[0x80, 200, 0, 6]));
        // Transport feedback
        assert!(is_rtcp(&[0x8F, 205, 0, 5]));
        // RTP with dynamic pt, with and without marker
        assert!(!is_rtcp(&[0x80, 96, 0, 1, 0, 0, 0, 0, 0, 0, 0, 1]));
        assert!(!is_rtcp(&[0x80, 0xE0, 0, 1, 0, 0, 0, 0, 0, 0, 0, 1]));
        // Too short
        assert!(!is_rtcp(&[0x80, 200]));
        // Not version 2
        assert!(!is_rtcp(&[0x40, 200, 0, 6]));
    }
}
