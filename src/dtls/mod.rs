//! The DTLS transport surface, for a transport without DTLS.
//!
//! The datagram transport is already secure, so everything that configures or
//! inspects a DTLS session is a stub here. Getters report nothing, setters the
//! media stack insists on calling are accepted and ignored, and operations that
//! only make sense with a real DTLS session fail with
//! [`DtlsError::Unsupported`].

use std::fmt;

use thiserror::Error;

use crate::state::DtlsTransportState;

mod finger;
pub use finger::Fingerprint;

/// What the transport can do in place of DTLS.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    /// Security comes from the datagram transport, there is no DTLS session.
    DatagramModeNoDtls,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Capability::DatagramModeNoDtls => write!(f, "datagram-mode-no-dtls"),
        }
    }
}

/// Errors that can arise in DTLS.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DtlsError {
    /// The operation needs a DTLS session, which the transport doesn't have.
    #[error("{operation} is unsupported in {capability}")]
    Unsupported {
        /// What the transport does instead.
        capability: Capability,
        /// The attempted operation.
        operation: &'static str,
    },

    /// A fingerprint that doesn't parse.
    #[error("Bad fingerprint: {0}")]
    BadFingerprint(String),
}

/// DTLS role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DtlsRole {
    /// Initiates the handshake.
    Client,
    /// Answers the handshake.
    Server,
}

/// Max DTLS protocol version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SslProtocolVersion {
    /// DTLS 1.0
    Dtls10,
    /// DTLS 1.2
    Dtls12,
}

/// A DER encoded certificate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DtlsCert {
    /// Certificate bytes.
    pub der: Vec<u8>,
}

/// Certificates presented by the remote peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SslCertChain(pub Vec<DtlsCert>);

/// A packet transport that looks like a DTLS transport to the media stack.
pub trait DtlsTransportInternal {
    /// Current state of the (emulated) DTLS session.
    fn dtls_state(&self) -> DtlsTransportState;

    /// The transport component.
    fn component(&self) -> i32;

    /// Whether a DTLS session is in use.
    fn is_dtls_active(&self) -> bool;

    /// The negotiated DTLS role.
    fn dtls_role(&self) -> Option<DtlsRole>;

    /// Set the DTLS role.
    fn set_dtls_role(&mut self, role: DtlsRole) -> Result<(), DtlsError>;

    /// Negotiated SRTP protection profile.
    fn srtp_crypto_suite(&self) -> Option<u16>;

    /// Negotiated TLS cipher suite.
    fn ssl_cipher_suite(&self) -> Option<u16>;

    /// Local certificate used in the handshake.
    fn local_certificate(&self) -> Option<DtlsCert>;

    /// Set the local certificate.
    fn set_local_certificate(&mut self, cert: DtlsCert) -> Result<(), DtlsError>;

    /// Certificates from the remote peer.
    fn remote_ssl_cert_chain(&self) -> Option<SslCertChain>;

    /// Export keying material (RFC 5705).
    fn export_keying_material(
        &mut self,
        label: &str,
        context: Option<&[u8]>,
        len: usize,
    ) -> Result<Vec<u8>, DtlsError>;

    /// Remote fingerprint to verify the peer with.
    fn set_remote_fingerprint(&mut self, fingerprint: &Fingerprint) -> Result<(), DtlsError>;

    /// Cap the protocol version.
    fn set_ssl_max_protocol_version(
        &mut self,
        version: SslProtocolVersion,
    ) -> Result<(), DtlsError>;

    /// What the transport offers in place of DTLS.
    fn capability(&self) -> Capability;

    /// Fails unless there's a real DTLS session behind this transport.
    ///
    /// For callers that truly depend on DTLS, as opposed to those that only go
    /// through the motions of configuring it.
    fn require_dtls(&self, operation: &'static str) -> Result<(), DtlsError>;
}
