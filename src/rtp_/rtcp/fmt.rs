use super::RtcpError;

/// Number of _something_ in the RTCP packet.
///
/// PacketType determines how to interpret the count field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedbackMessageType {
    /// When packet type SenderReport or ReceiverReport.
    ///
    /// The contained u8 is number of receiver reports.
    ReceptionReport(u8),

    /// When packet type SourceDescription (SDES) or Goodbye
    ///
    /// The contained u8 is number of contained SDES or Goodbyes.
    SourceCount(u8),

    /// When packet type ApplicationDefined
    ///
    /// The contained u8 is a subtype which is up to the application.
    Subtype(u8),

    /// When packet type is TransportLayerFeedback.
    TransportFeedback(TransportType),

    /// When packet type is PayloadSpecificFeedback.
    ///
    /// The contained u8 is the raw FMT value, the adaptor never looks inside these.
    PayloadFeedback(u8),

    /// When the packet type is ExtendedReport
    NotUsed,
}

impl From<FeedbackMessageType> for u8 {
    fn from(val: FeedbackMessageType) -> Self {
        use FeedbackMessageType::*;
        match val {
            ReceptionReport(v) | SourceCount(v) | Subtype(v) | PayloadFeedback(v) => {
                assert!(v <= 31, "rtcp fmt when count must be <= 31");
                v
            }
            TransportFeedback(v) => v as u8,
            NotUsed => 0,
        }
    }
}

/// Subtypes of [`FeedbackMessageType::TransportFeedback`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportType {
    /// Nack RTCP packet.
    ///
    /// Definition: <https://www.rfc-editor.org/rfc/rfc4585#section-6.2.1>
    Nack = 1,

    /// Transportwide congestion control packet.
    ///
    /// Definition: <https://tools.ietf.org/html/draft-holmer-rmcat-transport-wide-cc-extensions-01>
    TransportWide = 15,
}

impl TryFrom<u8> for TransportType {
    type Error = RtcpError;

    fn try_from(v: u8) -> Result<Self, Self::Error> {
        use TransportType::*;
        match v {
            1 => Ok(Nack),
            15 => Ok(TransportWide),
            _ => {
                trace!("Unknown TransportType: {}", v);
                Err(RtcpError::UnknownFmt(v))
            }
        }
    }
}
