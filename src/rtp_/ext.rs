use std::fmt;

use serde::{Deserialize, Serialize};

/// RTP header extensions.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum Extension {
    /// <http://www.webrtc.org/experiments/rtp-hdrext/abs-send-time>
    AbsoluteSendTime,
    /// <urn:ietf:params:rtp-hdrext:ssrc-audio-level>
    AudioLevel,
    /// <urn:ietf:params:rtp-hdrext:toffset>
    TransmissionTimeOffset,
    /// <urn:3gpp:video-orientation>
    VideoOrientation,
    /// <http://www.ietf.org/id/draft-holmer-rmcat-transport-wide-cc-extensions-01>
    ///
    /// The only extension the adaptor interprets. Carries the 16 bit transport
    /// wide sequence number used to correlate feedback.
    TransportSequenceNumber,
    /// <http://www.webrtc.org/experiments/rtp-hdrext/playout-delay>
    PlayoutDelay,
    /// <urn:ietf:params:rtp-hdrext:sdes:rtp-stream-id>
    RtpStreamId,
    /// <urn:ietf:params:rtp-hdrext:sdes:repaired-rtp-stream-id>
    RepairedRtpStreamId,
    /// <urn:ietf:params:rtp-hdrext:sdes:mid>
    RtpMid,

    /// Not recognized URI. Kept so the extension can be carried through untouched.
    UnknownUri(String),
}

/// Mapping of extension URI to our enum
const EXT_URI: &[(Extension, &str)] = &[
    (
        Extension::AbsoluteSendTime,
        "http://www.webrtc.org/experiments/rtp-hdrext/abs-send-time",
    ),
    (
        Extension::AudioLevel,
        "urn:ietf:params:rtp-hdrext:ssrc-audio-level",
    ),
    (
        Extension::TransmissionTimeOffset,
        "urn:ietf:params:rtp-hdrext:toffset",
    ),
    (
        Extension::VideoOrientation, //
        "urn:3gpp:video-orientation",
    ),
    (
        Extension::TransportSequenceNumber,
        "http://www.ietf.org/id/draft-holmer-rmcat-transport-wide-cc-extensions-01",
    ),
    (
        Extension::PlayoutDelay,
        "http://www.webrtc.org/experiments/rtp-hdrext/playout-delay",
    ),
    (
        Extension::RtpStreamId,
        "urn:ietf:params:rtp-hdrext:sdes:rtp-stream-id",
    ),
    (
        Extension::RepairedRtpStreamId,
        "urn:ietf:params:rtp-hdrext:sdes:repaired-rtp-stream-id",
    ),
    (
        Extension::RtpMid, //
        "urn:ietf:params:rtp-hdrext:sdes:mid",
    ),
];

impl Extension {
    /// Parses an extension from a URI.
    pub fn from_uri(uri: &str) -> Self {
        for (t, spec) in EXT_URI.iter() {
            if *spec == uri {
                return t.clone();
            }
        }

        Extension::UnknownUri(uri.to_string())
    }

    /// Represents the extension as an URI.
    pub fn as_uri(&self) -> &str {
        for (t, spec) in EXT_URI.iter() {
            if t == self {
                return spec;
            }
        }

        if let Extension::UnknownUri(uri) = self {
            return uri;
        }

        "unknown"
    }
}

impl fmt::Display for Extension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_uri())
    }
}

/// A negotiated header extension, as it appears in `a=extmap` lines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RtpExtension {
    /// The extension URI.
    pub uri: String,
    /// The numeric id used on the wire.
    pub id: u8,
}

impl RtpExtension {
    /// Create a negotiated extension for a known extension.
    pub fn new(ext: Extension, id: u8) -> Self {
        RtpExtension {
            uri: ext.as_uri().to_string(),
            id,
        }
    }

    /// Find the first negotiated extension with the given URI.
    pub fn find_by_uri<'a>(exts: &'a [RtpExtension], uri: &str) -> Option<&'a RtpExtension> {
        exts.iter().find(|e| e.uri == uri)
    }
}

// All header extensions must have a common "form", either using
// 1 byte for the (ID, len) or 2 bytes for the (ID, len).
#[repr(u16)]
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub(crate) enum ExtensionsForm {
    // See RFC 8285 Section 4.2
    // ID Range: 1..=14
    // Length Range: 1..=16
    OneByte = 0xBEDE,
    // See RFC 8285 Section 4.3
    // ID Range: 1..=255
    // Length Range: 0..=255
    TwoByte = 0x1000,
}

pub const MAX_ID: u8 = 255;

impl ExtensionsForm {
    pub(crate) fn as_u16(self) -> u16 {
        self as u16
    }

    pub(crate) fn parse(bytes: [u8; 2]) -> Option<Self> {
        let serialized = u16::from_be_bytes(bytes);
        if serialized == ExtensionsForm::OneByte.as_u16() {
            Some(ExtensionsForm::OneByte)
        // Ignore the app bits
        } else if (serialized & 0xFFF0) == ExtensionsForm::TwoByte.as_u16() {
            Some(ExtensionsForm::TwoByte)
        } else {
            None
        }
    }

    /// Split the extension block into elements.
    ///
    /// Padding bytes are skipped. Parsing stops at the first malformed element,
    /// or for the one byte form, at the reserved id 15.
    // https://tools.ietf.org/html/rfc8285
    pub(crate) fn elements(self, buf: &[u8]) -> Vec<ExtensionElement> {
        self.split(buf).0
    }

    /// Like [`ExtensionsForm::elements()`], also returning where parsing
    /// stopped early on an id 15 terminator or a truncated element.
    pub(crate) fn split(self, buf: &[u8]) -> (Vec<ExtensionElement>, Option<usize>) {
        let mut elements = Vec::new();
        let mut pos = 0;
        let mut rest = None;

        while pos < buf.len() {
            if buf[pos] == 0 {
                // padding
                pos += 1;
                continue;
            }

            let start = pos;

            let (id, len) = match self {
                ExtensionsForm::OneByte => {
                    let id = buf[pos] >> 4;
                    let len = (buf[pos] & 0xf) as usize + 1;
                    pos += 1;

                    if id == 15 {
                        // Processing of the entire extension terminates here, only
                        // the elements prior to the one with ID 15 are considered.
                        rest = Some(start);
                        break;
                    }
                    (id, len)
                }
                ExtensionsForm::TwoByte => {
                    if buf.len() - pos < 2 {
                        trace!("Not enough ext header len: {} < {}", buf.len() - pos, 2);
                        rest = Some(start);
                        break;
                    }
                    let id = buf[pos];
                    let len = buf[pos + 1] as usize;
                    pos += 2;
                    (id, len)
                }
            };

            if buf.len() - pos < len {
                trace!("Not enough type ext len: {} < {}", buf.len() - pos, len);
                rest = Some(start);
                break;
            }

            elements.push(ExtensionElement {
                id,
                start,
                value_start: pos,
                end: pos + len,
            });

            pos += len;
        }

        (elements, rest)
    }
}

/// Location of one extension element inside an extension block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ExtensionElement {
    pub id: u8,
    /// Offset of the element's (ID, len) bytes.
    pub start: usize,
    /// Offset of the element value.
    pub value_start: usize,
    /// Offset one past the element value.
    pub end: usize,
}

/// Values parsed from the extensions we have a mapping for.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtensionValues {
    /// Transport wide sequence number.
    pub transport_cc: Option<u16>,
}

/// Mapping between RTP extension id to what extension that is.
#[derive(Clone, PartialEq, Eq)]
pub struct ExtensionMap(Vec<Option<Extension>>); // index 0 is extmap:1.

impl ExtensionMap {
    /// Create an empty map.
    pub fn empty() -> Self {
        ExtensionMap(vec![None; MAX_ID as usize])
    }

    /// Map holding the transport sequence number extension, if negotiated.
    ///
    /// Other negotiated extensions are skipped since only the transport
    /// sequence number is ever read.
    pub fn transport_cc_only(exts: &[RtpExtension]) -> Self {
        let mut map = Self::empty();

        let uri = Extension::TransportSequenceNumber.as_uri();
        if let Some(ext) = RtpExtension::find_by_uri(exts, uri) {
            map.set(ext.id, Extension::TransportSequenceNumber);
        }

        map
    }

    /// Set a mapping for an extension.
    ///
    /// The id must be in 1..=MAX_ID (1-indexed).
    pub fn set(&mut self, id: u8, ext: Extension) {
        if id < 1 {
            debug!("Set RTP extension out of range 1-{}: {}", MAX_ID, id);
            return;
        }
        let idx = id as usize - 1;

        self.0[idx] = Some(ext);
    }

    /// Look up the extension for the id.
    pub fn lookup(&self, id: u8) -> Option<&Extension> {
        if id < 1 {
            return None;
        }
        self.0[id as usize - 1].as_ref()
    }

    /// Finds the id for an extension.
    pub fn id_of(&self, e: &Extension) -> Option<u8> {
        self.0
            .iter()
            .position(|x| x.as_ref() == Some(e))
            .map(|p| p as u8 + 1)
    }

    /// Iterate over the mapped extensions.
    pub fn iter(&self) -> impl Iterator<Item = (u8, &Extension)> + '_ {
        self.0
            .iter()
            .enumerate()
            .filter_map(|(i, e)| e.as_ref().map(|e| (i as u8 + 1, e)))
    }

    pub(crate) fn parse(&self, buf: &[u8], form: ExtensionsForm, ext_vals: &mut ExtensionValues) {
        for el in form.elements(buf) {
            if let Some(ext) = self.lookup(el.id) {
                ext.parse_value(&buf[el.value_start..el.end], ext_vals);
            }
        }
    }
}

impl Extension {
    pub(crate) fn parse_value(&self, buf: &[u8], ev: &mut ExtensionValues) -> Option<()> {
        use Extension::*;
        match self {
            TransportSequenceNumber => {
                if buf.len() < 2 {
                    return None;
                }
                ev.transport_cc = Some(u16::from_be_bytes([buf[0], buf[1]]));
            }
            // Everything else passes through unparsed.
            _ => {}
        }

        Some(())
    }
}

impl fmt::Debug for ExtensionMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Extensions(")?;
        let joined = self
            .iter()
            .map(|(id, e)| format!("{id}={e}"))
            .collect::<Vec<_>>()
            .join(", ");
        write!(f, "{joined}")?;
        write!(f, ")")?;
        Ok(())
    }
}
