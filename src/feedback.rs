use crate::registry::SentPacketInfo;
use crate::rtp_::rtcp::{RtcpError, RtcpPacket, Twcc};

/// Size of the scratch buffer feedback is written into.
///
/// Each feedback packet carries a single ack, which is much smaller.
pub const MAX_RTCP_FEEDBACK_PACKET_SIZE: usize = 1250;

/// Turns datagram acks into transport wide RTCP feedback.
#[derive(Debug)]
pub struct FeedbackSynthesizer {
    buf: Vec<u8>,
    last_nonzero_timestamp_us: i64,
    feedback_count: u8,
}

impl FeedbackSynthesizer {
    /// A synthesizer with nothing seen yet.
    pub fn new() -> Self {
        FeedbackSynthesizer {
            buf: vec![0; MAX_RTCP_FEEDBACK_PACKET_SIZE],
            last_nonzero_timestamp_us: 0,
            feedback_count: 0,
        }
    }

    /// Replace a zero receive timestamp with the last non-zero one.
    ///
    /// Some datagram transports report zero mid-call. Where those come from
    /// is not known.
    pub fn repair_timestamp(&mut self, receive_timestamp_us: i64) -> i64 {
        if receive_timestamp_us == 0 {
            self.last_nonzero_timestamp_us
        } else {
            self.last_nonzero_timestamp_us = receive_timestamp_us;
            receive_timestamp_us
        }
    }

    /// Feedback for an acked datagram.
    ///
    /// `None` when the datagram carried no transport sequence number. The
    /// returned bytes live in the scratch buffer until the next call.
    pub fn synthesize(
        &mut self,
        info: &SentPacketInfo,
        receive_timestamp_us: i64,
    ) -> Result<Option<&[u8]>, RtcpError> {
        let (Some(ssrc), Some(seq)) = (info.ssrc(), info.transport_sequence_number()) else {
            return Ok(None);
        };

        let time_us = self.repair_timestamp(receive_timestamp_us);

        let twcc = Twcc::single_received(0.into(), ssrc, seq, time_us, self.feedback_count)?;

        let needed = twcc.length_words() * 4;
        if needed > self.buf.len() {
            return Err(RtcpError::BufferTooSmall {
                needed,
                capacity: self.buf.len(),
            });
        }

        let n = twcc.write_to(&mut self.buf);
        self.feedback_count = self.feedback_count.wrapping_add(1);

        trace!(
            "Feedback for seq {} ssrc {} at {}us: {} bytes",
            seq,
            ssrc,
            time_us,
            n
        );

        Ok(Some(&self.buf[..n]))
    }
}

impl Default for FeedbackSynthesizer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn parse(buf: &[u8]) -> Twcc {
        Twcc::parse_packet(buf).unwrap()
    }

    #[test]
    fn no_feedback_without_sequence_number() {
        let mut f = FeedbackSynthesizer::new();
        let r = f.synthesize(&SentPacketInfo::new(1), 1_000).unwrap();
        assert!(r.is_none());
    }

    #[test]
    fn feedback_for_acked_rtp() {
        let mut f = FeedbackSynthesizer::new();
        let info = SentPacketInfo::with_transport_sequence_number(1, 0xDEADBEEF.into(), 0x1234);

        let buf = f.synthesize(&info, 12_345_000).unwrap().unwrap().to_vec();
        assert!(buf.len() <= MAX_RTCP_FEEDBACK_PACKET_SIZE);

        let twcc = parse(&buf);
        assert_eq!(*twcc.sender_ssrc, 0);
        assert_eq!(*twcc.ssrc, 0xDEADBEEF);
        assert_eq!(twcc.base_seq, 0x1234);
        assert_eq!(twcc.status_count, 1);
        assert_eq!(twcc.received(), vec![(0x1234, 12_345_000)]);
    }

    #[test]
    fn feedback_count_increments() {
        let mut f = FeedbackSynthesizer::new();
        let info = SentPacketInfo::with_transport_sequence_number(1, 1.into(), 1);

        let counts: Vec<_> = (0..3)
            .map(|_| {
                let buf = f.synthesize(&info, 64_000).unwrap().unwrap();
                parse(buf).feedback_count
            })
            .collect();

        assert_eq!(counts, vec![0, 1, 2]);
    }

    #[test]
    fn zero_timestamp_repaired() {
        let mut f = FeedbackSynthesizer::new();
        let repaired: Vec<_> = [100, 0, 0, 250]
            .into_iter()
            .map(|t| f.repair_timestamp(t))
            .collect();

        assert_eq!(repaired, vec![100, 100, 100, 250]);
    }

    #[test]
    fn zero_before_any_timestamp_stays_zero() {
        let mut f = FeedbackSynthesizer::new();
        assert_eq!(f.repair_timestamp(0), 0);
    }
}
