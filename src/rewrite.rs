use std::borrow::Cow;

use crate::registry::SentPacketInfo;
use crate::rtp_::{is_rtcp, Extension, ExtensionMap, RtpError, RtpExtension, RtpHeader};

/// An outgoing packet ready for the datagram transport.
#[derive(Debug)]
pub struct Prepared<'a> {
    /// What to remember until the datagram is acked or lost.
    pub info: SentPacketInfo,
    /// Bytes to send. Borrowed when unchanged.
    pub payload: Cow<'a, [u8]>,
}

/// Strips the transport sequence number from outgoing RTP.
///
/// The datagram transport acks every datagram, which makes the extension
/// redundant on the wire. The stripped value is kept in the returned
/// [`SentPacketInfo`] so feedback can be recreated once the ack arrives.
#[derive(Debug)]
pub struct RtpRewriter {
    exts: ExtensionMap,
    tsn_id: Option<u8>,
    translate: bool,
}

impl RtpRewriter {
    /// Creates a rewriter from the negotiated header extensions.
    ///
    /// With `translate` off every packet passes through untouched.
    pub fn new(rtp_header_extensions: &[RtpExtension], translate: bool) -> Self {
        let exts = ExtensionMap::transport_cc_only(rtp_header_extensions);
        let tsn_id = exts.id_of(&Extension::TransportSequenceNumber);

        RtpRewriter {
            exts,
            tsn_id,
            translate,
        }
    }

    /// Whether the transport sequence number extension was negotiated.
    pub fn has_transport_sequence_number(&self) -> bool {
        self.tsn_id.is_some()
    }

    /// Whether RTP packets get their extension stripped.
    pub fn translates(&self) -> bool {
        self.translate
    }

    /// Decide what to send and what to remember for `data`.
    ///
    /// Fails if `data` doesn't demux as RTCP and won't parse as RTP. Nothing
    /// should be recorded for the packet in that case.
    pub fn prepare<'a>(&self, data: &'a [u8], packet_id: i64) -> Result<Prepared<'a>, RtpError> {
        let unchanged = |info| Prepared {
            info,
            payload: Cow::Borrowed(data),
        };

        if !self.translate || is_rtcp(data) {
            return Ok(unchanged(SentPacketInfo::new(packet_id)));
        }

        let header = RtpHeader::parse(data, &self.exts).ok_or(RtpError::ParseHeader)?;

        let (Some(tsn_id), Some(tsn)) = (self.tsn_id, header.ext_vals.transport_cc) else {
            trace!(
                "Sending RTP without transport sequence number, ssrc: {} seq: {}",
                header.ssrc,
                header.sequence_number
            );
            return Ok(unchanged(SentPacketInfo::new(packet_id)));
        };

        let stripped = header.remove_extension(data, tsn_id)?;

        trace!(
            "Removed transport sequence number {} ssrc: {}, saved bytes: {}",
            tsn,
            header.ssrc,
            data.len() - stripped.len()
        );

        Ok(Prepared {
            info: SentPacketInfo::with_transport_sequence_number(packet_id, header.ssrc, tsn),
            payload: Cow::Owned(stripped),
        })
    }
}
