//! A DTLS transport facade over an acknowledging datagram transport.
//!
//! Media stacks expect to send RTP over a DTLS transport and to get transport
//! wide congestion control feedback back from the remote peer as RTCP. When the
//! packets instead travel over a datagram transport that is already secure, and
//! that acks or reports loss for every datagram (think QUIC datagrams), both
//! of those are redundant on the wire.
//!
//! [`DatagramDtlsAdaptor`] sits between the media stack and such a transport:
//!
//! * It looks like a DTLS transport, with a DTLS state driven by the datagram
//!   transport state and writable/receiving driven by ICE.
//! * Outgoing RTP has its transport sequence number header extension removed.
//! * Datagram acks are turned back into transport wide RTCP feedback packets,
//!   handed upwards as if they came from the remote peer.
//!
//! The adaptor does no I/O of its own, and has no threads or timers. Everything
//! happens in calls to the public API or the callbacks from the transports below.
//! Those callbacks may come at any time, also from inside a send the adaptor is
//! making. They are then queued and handled before the send returns.
//!
//! # Usage
//!
//! ```no_run
//! use std::cell::RefCell;
//! use std::rc::Rc;
//!
//! use datagram_dtls::AdaptorConfig;
//! use datagram_dtls::rtp::Extension;
//! use datagram_dtls::transport::{DatagramHandle, DatagramTransport, LowerTransport};
//! use datagram_dtls::transport::{PacketOptions, SharedIce, TransportEvent};
//!
//! fn run(ice: SharedIce, datagram: Rc<RefCell<dyn DatagramTransport>>, rtp: &[u8]) {
//!     let adaptor = AdaptorConfig::new()
//!         .add_rtp_header_extension(Extension::TransportSequenceNumber, 5)
//!         .build(ice, LowerTransport::Datagram(DatagramHandle::new(datagram)))
//!         .expect("a valid config");
//!
//!     adaptor
//!         .borrow_mut()
//!         .subscribe(|event: &TransportEvent<'_>| match event {
//!             // Incoming RTP, RTCP and the synthesized feedback.
//!             TransportEvent::ReadPacket { data, .. } => println!("{} bytes", data.len()),
//!             TransportEvent::WritableState(w) => println!("writable: {}", w),
//!             _ => {}
//!         });
//!
//!     // Returns the number of bytes sent, or -1.
//!     let _ = adaptor.borrow_mut().send_packet(rtp, &PacketOptions::new(1), 0);
//! }
//! ```
//!
//! # Bypass
//!
//! Passing [`LowerTransport::RawIce`][transport::LowerTransport::RawIce]
//! instead of a datagram transport sends everything raw over ICE, and makes
//! writable/receiving follow ICE directly. This is meant for tests.

#![forbid(unsafe_code)]
#![allow(clippy::new_without_default)]
#![allow(clippy::manual_range_contains)]
#![deny(missing_docs)]

#[macro_use]
extern crate tracing;

use thiserror::Error;

mod id;
pub use id::{DatagramId, SinkId};

mod rtp_;

/// Low level RTP access.
pub mod rtp {
    /// Feedback for RTP.
    pub mod rtcp {
        pub use crate::rtp_::rtcp::{Delta, PacketChunk, PacketStatus, Twcc};
        pub use crate::rtp_::rtcp::{FeedbackMessageType, TransportType};
        pub use crate::rtp_::rtcp::{RtcpHeader, RtcpPacket, RtcpType};
    }

    pub use crate::rtp_::{is_rtcp, Extension, ExtensionMap, ExtensionValues};
    pub use crate::rtp_::{Pt, RtpExtension, RtpHeader, Ssrc};
}

mod adaptor;
pub use adaptor::{DatagramDtlsAdaptor, DATAGRAM_DTLS_ADAPTOR_COMPONENT};

/// Clock abstraction for sent notifications.
pub mod clock;

/// Adaptor configuration.
pub mod config;
pub use config::AdaptorConfig;

pub mod dtls;

/// Event logging.
pub mod event_log;

mod inbox;

mod feedback;
pub use feedback::MAX_RTCP_FEEDBACK_PACKET_SIZE;

mod registry;
pub use registry::SentPacketInfo;

mod rewrite;

mod state;
pub use state::DtlsTransportState;

mod thread;

pub mod transport;

/// Various error types.
pub mod error {
    pub use crate::config::ConfigError;
    pub use crate::dtls::DtlsError;
    pub use crate::rtp_::rtcp::RtcpError;
    pub use crate::rtp_::RtpError;
    pub use crate::transport::DatagramError;
}

/// Errors for the whole adaptor.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AdaptorError {
    /// RTP errors.
    #[error("{0}")]
    Rtp(#[from] error::RtpError),

    /// RTCP errors.
    #[error("{0}")]
    Rtcp(#[from] error::RtcpError),

    /// The datagram transport refused the datagram.
    #[error("{0}")]
    Datagram(#[from] error::DatagramError),

    /// DTLS errors.
    #[error("{0}")]
    Dtls(#[from] error::DtlsError),

    /// Config errors.
    #[error("{0}")]
    Config(#[from] error::ConfigError),

    /// Sending over ICE in bypass failed. Contains the ICE socket error.
    #[error("ICE send failed, error: {0}")]
    IceSend(i32),
}
