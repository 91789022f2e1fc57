use super::{FeedbackMessageType, RtcpError};

pub(crate) const LEN_HEADER: usize = 4;

/// The common 4 byte header of every RTCP packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RtcpHeader {
    pub(crate) rtcp_type: RtcpType,
    pub(crate) feedback_message_type: FeedbackMessageType,
    pub(crate) words_less_one: u16,
}

impl RtcpHeader {
    /// Type of RTCP packet. This is further divided into subtypes by
    /// `feedback_message_type`.
    pub fn rtcp_type(&self) -> RtcpType {
        self.rtcp_type
    }

    /// Subtype of RTCP message.
    pub fn feedback_message_type(&self) -> FeedbackMessageType {
        self.feedback_message_type
    }

    /// Length of entire RTCP packet (including header) in words (4 bytes).
    pub fn length_words(&self) -> usize {
        self.words_less_one as usize + 1
    }

    /// Length of entire RTCP packet (including header) in bytes.
    pub fn length_bytes(&self) -> usize {
        self.length_words() * 4
    }

    pub(crate) fn write_to(&self, buf: &mut [u8]) -> usize {
        let fmt: u8 = self.feedback_message_type.into();

        buf[0] = 0b10_0_00000 | fmt;
        buf[1] = self.rtcp_type as u8;
        buf[2..4].copy_from_slice(&self.words_less_one.to_be_bytes());

        LEN_HEADER
    }
}

/// Kind of RTCP packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RtcpType {
    /// RTCP_PT_SR
    SenderReport = 200,

    /// RTCP_PT_RR
    ReceiverReport = 201,

    /// RTCP_PT_SDES
    SourceDescription = 202,

    /// RTCP_PT_BYE
    Goodbye = 203,

    /// RTCP_PT_APP
    ApplicationDefined = 204,

    /// RTCP_PT_RTPFB
    // https://tools.ietf.org/html/rfc4585
    TransportLayerFeedback = 205,

    /// RTCP_PT_PSFB
    // https://tools.ietf.org/html/rfc4585
    PayloadSpecificFeedback = 206,

    /// RTCP_PT_XR
    ExtendedReport = 207,
}

impl TryFrom<u8> for RtcpType {
    type Error = RtcpError;

    fn try_from(v: u8) -> Result<Self, Self::Error> {
        use RtcpType::*;
        match v {
            200 => Ok(SenderReport),   // sr
            201 => Ok(ReceiverReport), // rr
            202 => Ok(SourceDescription),
            203 => Ok(Goodbye),
            204 => Ok(ApplicationDefined),
            205 => Ok(TransportLayerFeedback),
            206 => Ok(PayloadSpecificFeedback),
            207 => Ok(ExtendedReport),
            _ => {
                trace!("Unrecognized RTCP type: {}", v);
                Err(RtcpError::UnknownType(v))
            }
        }
    }
}

impl<'a> TryFrom<&'a [u8]> for RtcpHeader {
    type Error = RtcpError;

    fn try_from(buf: &'a [u8]) -> Result<Self, Self::Error> {
        if buf.len() < LEN_HEADER {
            return Err(RtcpError::TooShort(buf.len()));
        }

        let version = (buf[0] & 0b1100_0000) >> 6;
        if version != 2 {
            return Err(RtcpError::Version);
        }

        let fmt = buf[0] & 0b0001_1111;
        let rtcp_type: RtcpType = buf[1].try_into()?;

        use FeedbackMessageType::*;
        let feedback_message_type = match rtcp_type {
            RtcpType::SenderReport | RtcpType::ReceiverReport => ReceptionReport(fmt),
            RtcpType::SourceDescription | RtcpType::Goodbye => SourceCount(fmt),
            RtcpType::ApplicationDefined => Subtype(fmt),
            RtcpType::TransportLayerFeedback => TransportFeedback(fmt.try_into()?),
            RtcpType::PayloadSpecificFeedback => PayloadFeedback(fmt),
            RtcpType::ExtendedReport => NotUsed,
        };

        let words_less_one = u16::from_be_bytes([buf[2], buf[3]]);

        Ok(RtcpHeader {
            rtcp_type,
            feedback_message_type,
            words_less_one,
        })
    }
}
