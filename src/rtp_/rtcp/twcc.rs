use std::collections::VecDeque;
use std::fmt;

use super::header::LEN_HEADER;
use super::{FeedbackMessageType, RtcpError, RtcpHeader, RtcpPacket};
use super::{RtcpType, Ssrc, TransportType};

/// Resolution of the receive deltas.
pub(crate) const DELTA_SCALE_US: i64 = 250;

/// Resolution of the reference time, 64ms.
pub(crate) const BASE_SCALE_US: i64 = 256 * DELTA_SCALE_US;

/// The 24 bit reference time wraps after this many microseconds.
pub(crate) const TIME_WRAP_PERIOD_US: i64 = (1 << 24) * BASE_SCALE_US;

/// Fixed part of the feedback following the RTCP header.
const LEN_FIXED: usize = 16;

/// Transport Wide Congestion Control.
///
/// Reports the arrival of RTP packets by their transport wide sequence number.
#[derive(Clone, PartialEq, Eq)]
pub struct Twcc {
    /// Sender of this feedback. Mostly irrelevant, but part of RTCP packets.
    pub sender_ssrc: Ssrc,
    /// The SSRC this report is for.
    pub ssrc: Ssrc,
    /// Start sequence number.
    pub base_seq: u16,
    /// Number of reported statuses.
    pub status_count: u16,
    /// Reference time in multiples of 64ms.
    pub reference_time: u32, // 24 bit
    /// Increasing counter for each TWCC. For deduping.
    pub feedback_count: u8,
    /// Ranges received.
    pub chunks: VecDeque<PacketChunk>,
    /// Delta times for the ranges received.
    pub delta: VecDeque<Delta>,
}

impl Twcc {
    /// Feedback reporting exactly one received packet.
    ///
    /// The reference time is the receive time truncated to 64ms and wrapped to
    /// 24 bits. The remainder becomes the delta, rounded to the nearest 250us.
    pub fn single_received(
        sender_ssrc: Ssrc,
        ssrc: Ssrc,
        seq: u16,
        receive_time_us: i64,
        feedback_count: u8,
    ) -> Result<Twcc, RtcpError> {
        let wrapped = receive_time_us.rem_euclid(TIME_WRAP_PERIOD_US);
        let reference_time = (wrapped / BASE_SCALE_US) as u32;

        let delta_us = wrapped - reference_time as i64 * BASE_SCALE_US;
        let ticks = round_to_ticks(delta_us);

        let (status, delta) = if (0..=255).contains(&ticks) {
            (PacketStatus::ReceivedSmallDelta, Delta::Small(ticks as u8))
        } else if ticks >= i16::MIN as i64 && ticks <= i16::MAX as i64 {
            (
                PacketStatus::ReceivedLargeOrNegativeDelta,
                Delta::Large(ticks as i16),
            )
        } else {
            return Err(RtcpError::DeltaOutOfRange(ticks));
        };

        Ok(Twcc {
            sender_ssrc,
            ssrc,
            base_seq: seq,
            status_count: 1,
            reference_time,
            feedback_count,
            chunks: [PacketChunk::Run(status, 1)].into(),
            delta: [delta].into(),
        })
    }

    /// Parse an entire RTCP packet, header included, as transport wide feedback.
    ///
    /// Padding signalled by the header is stripped before the body is read.
    pub fn parse_packet(buf: &[u8]) -> Result<Twcc, RtcpError> {
        let header: RtcpHeader = buf.try_into()?;

        let is_twcc = header.rtcp_type() == RtcpType::TransportLayerFeedback
            && header.feedback_message_type()
                == FeedbackMessageType::TransportFeedback(TransportType::TransportWide);
        if !is_twcc {
            return Err(RtcpError::NotTransportWide);
        }

        let len = header.length_bytes();
        if buf.len() < len {
            return Err(RtcpError::TooShort(buf.len()));
        }

        let mut body = &buf[LEN_HEADER..len];

        let has_padding = buf[0] & 0b00_1_00000 > 0;
        if has_padding {
            let pad = body.last().copied().unwrap_or(0) as usize;
            if pad == 0 || pad > body.len() {
                return Err(RtcpError::Malformed("Bad padding length"));
            }
            body = &body[..body.len() - pad];
        }

        body.try_into()
    }

    /// The received packets as `(seq, receive time in us)`.
    ///
    /// Times are relative the zero point of the reference time.
    pub fn received(&self) -> Vec<(u16, i64)> {
        let mut time_us = self.reference_time as i64 * BASE_SCALE_US;
        let mut deltas = self.delta.iter();
        let mut ret = vec![];

        for (i, status) in self.statuses().enumerate() {
            let seq = self.base_seq.wrapping_add(i as u16);
            match status {
                PacketStatus::ReceivedSmallDelta | PacketStatus::ReceivedLargeOrNegativeDelta => {
                    let Some(delta) = deltas.next() else {
                        break;
                    };
                    time_us += delta.ticks() * DELTA_SCALE_US;
                    ret.push((seq, time_us));
                }
                _ => {}
            }
        }

        ret
    }

    fn statuses(&self) -> impl Iterator<Item = PacketStatus> + '_ {
        self.chunks
            .iter()
            .flat_map(|c| c.statuses())
            .take(self.status_count as usize)
    }

    fn chunks_byte_len(&self) -> usize {
        self.chunks.len() * 2
    }

    fn delta_byte_len(&self) -> usize {
        self.delta.iter().map(|d| d.byte_len()).sum()
    }
}

fn round_to_ticks(delta_us: i64) -> i64 {
    if delta_us >= 0 {
        (delta_us + DELTA_SCALE_US / 2) / DELTA_SCALE_US
    } else {
        (delta_us - DELTA_SCALE_US / 2) / DELTA_SCALE_US
    }
}

impl RtcpPacket for Twcc {
    fn header(&self) -> RtcpHeader {
        RtcpHeader {
            rtcp_type: RtcpType::TransportLayerFeedback,
            feedback_message_type: FeedbackMessageType::TransportFeedback(
                TransportType::TransportWide,
            ),
            words_less_one: (self.length_words() - 1) as u16,
        }
    }

    fn length_words(&self) -> usize {
        // header: 1
        // sender ssrc: 1
        // ssrc: 1
        // base seq + packet status: 1
        // ref time + feedback count: 1
        // chunks byte len + delta byte len + padding

        let total = self.chunks_byte_len() + self.delta_byte_len();

        5 + (total + 3) / 4
    }

    fn write_to(&self, buf: &mut [u8]) -> usize {
        self.header().write_to(buf);
        buf[4..8].copy_from_slice(&self.sender_ssrc.to_be_bytes());
        buf[8..12].copy_from_slice(&self.ssrc.to_be_bytes());

        buf[12..14].copy_from_slice(&self.base_seq.to_be_bytes());
        buf[14..16].copy_from_slice(&self.status_count.to_be_bytes());

        let ref_time = self.reference_time.to_be_bytes();
        buf[16..19].copy_from_slice(&ref_time[1..4]);
        buf[19] = self.feedback_count;

        let mut total = LEN_HEADER + LEN_FIXED;

        for p in &self.chunks {
            p.write_to(&mut buf[total..]);
            total += 2;
        }

        for d in &self.delta {
            total += d.write_to(&mut buf[total..]);
        }

        let pad = 4 - total % 4;
        if pad < 4 {
            for i in 0..pad {
                buf[total + i] = 0;
            }
            buf[total + pad - 1] = pad as u8;

            total += pad;
            // Toggle padding bit
            buf[0] |= 0b00_1_00000;
        }

        total
    }
}

/// A 16 bit packet status chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketChunk {
    /// Status repeated for a 13 bit run length.
    Run(PacketStatus, u16),
    /// 14 one bit symbols, received or not.
    VectorSingle(u16, u16),
    /// 7 two bit status symbols.
    VectorDouble(u16, u16),
}

impl PacketChunk {
    fn write_to(&self, buf: &mut [u8]) {
        let x = match self {
            //     0                   1
            //     0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5
            //    +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
            //    |T| S |       Run Length        |
            //    +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
            PacketChunk::Run(s, n) => ((*s as u16) << 13) | (n & 0b0001_1111_1111_1111),

            //    +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
            //    |T|S|       symbol list         |
            //    +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
            PacketChunk::VectorSingle(n, _) => (1 << 15) | (n & 0b0011_1111_1111_1111),
            PacketChunk::VectorDouble(n, _) => (1 << 15) | (1 << 14) | (n & 0b0011_1111_1111_1111),
        };
        buf[..2].copy_from_slice(&x.to_be_bytes());
    }

    fn statuses(&self) -> Box<dyn Iterator<Item = PacketStatus> + '_> {
        match *self {
            PacketChunk::Run(s, n) => Box::new((0..n).map(move |_| s)),
            PacketChunk::VectorSingle(v, _) => Box::new((0..14).map(move |i| {
                if (v >> (13 - i)) & 1 == 1 {
                    PacketStatus::ReceivedSmallDelta
                } else {
                    PacketStatus::NotReceived
                }
            })),
            PacketChunk::VectorDouble(v, _) => {
                Box::new((0..7).map(move |i| PacketStatus::from(((v >> (12 - i * 2)) & 0b11) as u8)))
            }
        }
    }
}

impl<'a> TryFrom<&'a [u8]> for PacketChunk {
    type Error = RtcpError;

    fn try_from(buf: &'a [u8]) -> Result<Self, Self::Error> {
        if buf.len() < 2 {
            return Err(RtcpError::Malformed("Less than 2 bytes for PacketChunk"));
        }

        let x = u16::from_be_bytes([buf[0], buf[1]]);

        let is_vec = (x & 0b1000_0000_0000_0000) > 0;

        let p = if is_vec {
            let is_double = (x & 0b0100_0000_0000_0000) > 0;
            let n = x & 0b0011_1111_1111_1111;
            if is_double {
                PacketChunk::VectorDouble(n, 7)
            } else {
                PacketChunk::VectorSingle(n, 14)
            }
        } else {
            let s: PacketStatus = ((x >> 13) as u8).into();
            let n = x & 0b0001_1111_1111_1111;
            PacketChunk::Run(s, n)
        };

        Ok(p)
    }
}

/// Two bit packet status symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketStatus {
    /// Packet not received.
    NotReceived = 0b00,
    /// Received, delta fits one byte.
    ReceivedSmallDelta = 0b01,
    /// Received, delta needs two signed bytes.
    ReceivedLargeOrNegativeDelta = 0b10,
    /// Reserved.
    Unknown = 0b11,
}

impl From<u8> for PacketStatus {
    fn from(v: u8) -> Self {
        match v {
            0b00 => Self::NotReceived,
            0b01 => Self::ReceivedSmallDelta,
            0b10 => Self::ReceivedLargeOrNegativeDelta,
            _ => Self::Unknown,
        }
    }
}

/// Receive delta in multiples of 250us.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delta {
    /// Unsigned, 0-63.75ms.
    Small(u8),
    /// Signed, +-8.19s.
    Large(i16),
}

impl Delta {
    fn write_to(&self, buf: &mut [u8]) -> usize {
        match self {
            Delta::Small(v) => {
                buf[0] = *v;
                1
            }
            Delta::Large(v) => {
                buf[..2].copy_from_slice(&v.to_be_bytes());
                2
            }
        }
    }

    fn byte_len(&self) -> usize {
        match self {
            Delta::Small(_) => 1,
            Delta::Large(_) => 2,
        }
    }

    fn ticks(&self) -> i64 {
        match self {
            Delta::Small(v) => *v as i64,
            Delta::Large(v) => *v as i64,
        }
    }
}

impl<'a> TryFrom<&'a [u8]> for Twcc {
    type Error = RtcpError;

    /// Parses the body following the RTCP header, padding already removed.
    fn try_from(buf: &'a [u8]) -> Result<Self, Self::Error> {
        if buf.len() < LEN_FIXED {
            return Err(RtcpError::Malformed("Less than 16 bytes for start of Twcc"));
        }

        let sender_ssrc = u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]).into();
        let ssrc = u32::from_be_bytes([buf[4], buf[5], buf[6], buf[7]]).into();
        let base_seq = u16::from_be_bytes([buf[8], buf[9]]);
        let status_count = u16::from_be_bytes([buf[10], buf[11]]);
        let reference_time = u32::from_be_bytes([0, buf[12], buf[13], buf[14]]);
        let feedback_count = buf[15];

        let mut twcc = Twcc {
            sender_ssrc,
            ssrc,
            base_seq,
            status_count,
            reference_time,
            feedback_count,
            chunks: VecDeque::new(),
            delta: VecDeque::new(),
        };

        let mut todo = status_count as usize;
        let mut buf = &buf[LEN_FIXED..];
        while todo > 0 {
            let chunk: PacketChunk = buf.try_into()?;
            let count = chunk.statuses().count();
            if count == 0 {
                return Err(RtcpError::Malformed("Empty run length chunk"));
            }

            todo = todo.saturating_sub(count);

            twcc.chunks.push_back(chunk);
            buf = &buf[2..];
        }

        // Collect first, the borrow of chunks can't overlap pushing deltas.
        let statuses: Vec<_> = twcc.statuses().collect();

        for status in statuses {
            match status {
                PacketStatus::ReceivedSmallDelta => {
                    let Some(v) = buf.first() else {
                        return Err(RtcpError::Malformed("Not enough buf for small deltas"));
                    };
                    twcc.delta.push_back(Delta::Small(*v));
                    buf = &buf[1..];
                }
                PacketStatus::ReceivedLargeOrNegativeDelta => {
                    if buf.len() < 2 {
                        return Err(RtcpError::Malformed("Not enough buf for large deltas"));
                    }
                    twcc.delta
                        .push_back(Delta::Large(i16::from_be_bytes([buf[0], buf[1]])));
                    buf = &buf[2..];
                }
                _ => {}
            }
        }

        Ok(twcc)
    }
}

impl fmt::Debug for Twcc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Twcc")
            .field("sender_ssrc", &self.sender_ssrc)
            .field("ssrc", &self.ssrc)
            .field("base_seq", &self.base_seq)
            .field("status_count", &self.status_count)
            .field("reference_time", &self.reference_time)
            .field("feedback_count", &self.feedback_count)
            .field("chunks", &self.chunks)
            .field("delta", &self.delta.len())
            .finish()
    }
}
