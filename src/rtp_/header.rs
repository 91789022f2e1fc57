#![allow(clippy::unusual_byte_groupings)]

use super::ext::{ExtensionMap, ExtensionValues, ExtensionsForm};
use super::{Pt, RtpError, Ssrc};

/// Length of the fixed part of the RTP header.
const FIXED_HEADER_LEN: usize = 12;

/// Parsed header from an RTP packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RtpHeader {
    /// Always 2
    pub version: u8,
    /// Whether the RTP packet has padding to be an equal of 4 bytes.
    pub has_padding: bool,
    /// RTP packet has "RTP header extensions".
    pub has_extension: bool,
    /// Number of contributing sources following the fixed header.
    pub csrc_count: usize,
    /// For video, this marker signifies the end of a series of packets that
    /// together form a single video frame.
    pub marker: bool,
    /// Type of payload being carried.
    pub payload_type: Pt,
    /// Sequence number increasing by 1 for each RTP packet.
    pub sequence_number: u16,
    /// Timestamp in media time for the RTP packet.
    pub timestamp: u32,
    /// Sender source identifier.
    pub ssrc: Ssrc,
    /// The extension values parsed using the extension map.
    pub ext_vals: ExtensionValues,
    /// Length of header, including the extension block.
    pub header_len: usize,
    pub(crate) ext_form: Option<ExtensionsForm>,
}

impl RtpHeader {
    /// Parse the header of an RTP packet.
    ///
    /// Returns `None` if the buffer is not a well formed RTP packet.
    pub fn parse(buf: &[u8], exts: &ExtensionMap) -> Option<RtpHeader> {
        let orig_len = buf.len();
        if buf.len() < FIXED_HEADER_LEN {
            trace!("RTP header too short < 12: {}", buf.len());
            return None;
        }

        let version = (buf[0] & 0b1100_0000) >> 6;
        if version != 2 {
            trace!("RTP version is not 2");
            return None;
        }
        let has_padding = buf[0] & 0b0010_0000 > 0;
        let has_extension = buf[0] & 0b0001_0000 > 0;
        let csrc_count = (buf[0] & 0b0000_1111) as usize;
        let marker = buf[1] & 0b1000_0000 > 0;
        let payload_type = (buf[1] & 0b0111_1111).into();
        let sequence_number = u16::from_be_bytes([buf[2], buf[3]]);

        let timestamp = u32::from_be_bytes([buf[4], buf[5], buf[6], buf[7]]);

        let ssrc = u32::from_be_bytes([buf[8], buf[9], buf[10], buf[11]]);

        let buf: &[u8] = &buf[FIXED_HEADER_LEN..];

        let csrc_len = 4 * csrc_count;
        if buf.len() < csrc_len {
            trace!("RTP header invalid, not enough csrc");
            return None;
        }

        let buf: &[u8] = &buf[csrc_len..];

        let mut ext_vals = ExtensionValues::default();
        let mut ext_form = None;

        let rest = if !has_extension {
            buf
        } else {
            if buf.len() < 4 {
                trace!("RTP bad header extension");
                return None;
            }

            let Some(form) = ExtensionsForm::parse([buf[0], buf[1]]) else {
                trace!(
                    "Ignoring unknown RTP header extensions form: {:?}",
                    u16::from_be_bytes([buf[0], buf[1]])
                );
                return None;
            };
            let ext_words = u16::from_be_bytes([buf[2], buf[3]]);
            let ext_len = ext_words as usize * 4;

            let buf: &[u8] = &buf[4..];

            if buf.len() < ext_len {
                trace!("RTP ext len larger than header {} > {}", buf.len(), ext_len);
                return None;
            }

            exts.parse(&buf[..ext_len], form, &mut ext_vals);
            ext_form = Some(form);
            &buf[ext_len..]
        };

        let header_len = orig_len - rest.len();

        Some(RtpHeader {
            version,
            has_padding,
            has_extension,
            csrc_count,
            marker,
            payload_type,
            sequence_number,
            timestamp,
            ssrc: ssrc.into(),
            ext_vals,
            header_len,
            ext_form,
        })
    }

    /// Offset of the extension block profile word (0xBEDE or 0x100X).
    fn ext_block_start(&self) -> usize {
        FIXED_HEADER_LEN + 4 * self.csrc_count
    }

    /// Copy `buf` leaving out the extension element with `id`.
    ///
    /// Remaining elements keep their raw bytes and order, and are re-padded to a
    /// word boundary. Bytes from an id 15 terminator, or a truncated element, to
    /// the end of the block are copied as they are. If nothing remains, the whole
    /// extension block is dropped and the X bit is cleared. Payload and RTP
    /// padding are untouched.
    ///
    /// `buf` must be the packet this header was parsed from.
    pub fn remove_extension(&self, buf: &[u8], id: u8) -> Result<Vec<u8>, RtpError> {
        let Some(form) = self.ext_form else {
            return Err(RtpError::MissingExtension(id));
        };

        let block_start = self.ext_block_start();
        let data_start = block_start + 4;
        let data_end = self.header_len;

        if buf.len() < data_end {
            return Err(RtpError::ParseHeader);
        }

        let data = &buf[data_start..data_end];
        let (elements, rest) = form.split(data);

        if !elements.iter().any(|e| e.id == id) {
            return Err(RtpError::MissingExtension(id));
        }

        let mut kept = Vec::with_capacity(data.len());
        for e in elements.iter().filter(|e| e.id != id) {
            kept.extend_from_slice(&data[e.start..e.end]);
        }
        if let Some(rest) = rest {
            // Not ours to interpret, it goes along unchanged.
            kept.extend_from_slice(&data[rest..]);
        }

        let mut out = Vec::with_capacity(buf.len());
        out.extend_from_slice(&buf[..block_start]);

        if kept.is_empty() {
            // Unset the X bit.
            out[0] &= !0b000_1_0000;
        } else {
            let pad = (4 - kept.len() % 4) % 4;
            kept.resize(kept.len() + pad, 0);

            // Keep the profile word as is, the two byte form might carry app bits.
            out.extend_from_slice(&buf[block_start..block_start + 2]);
            out.extend_from_slice(&((kept.len() / 4) as u16).to_be_bytes());
            out.extend_from_slice(&kept);
        }

        out.extend_from_slice(&buf[data_end..]);

        Ok(out)
    }
}
