use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::adaptor::DatagramDtlsAdaptor;
use crate::rtp_::{Extension, RtpExtension};
use crate::transport::{LowerTransport, SharedIce};
use crate::AdaptorError;

/// Field trial turning off stripping of transport sequence numbers and the
/// feedback synthesized from datagram acks.
// The misspelling is part of the trial name.
pub const DISABLE_FEEDBACK_TRANSLATION_TRIAL: &str =
    "WebRTC-kDisableDatagramToRtcpFeebackTranslation";

/// Errors in [`AdaptorConfig`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// Field trial string does not end with `/`.
    #[error("Field trials must end with '/': {0}")]
    TrialNotTerminated(String),

    /// Field trial string has a name without a group.
    #[error("Field trial without group: {0}")]
    TrialWithoutGroup(String),

    /// Field trial with an empty name or group.
    #[error("Field trial with empty name or group: {0}")]
    EmptyTrial(String),

    /// RTP header extension ids start at 1.
    #[error("RTP header extension id 0 for {0}")]
    ExtensionIdZero(String),

    /// Two RTP header extensions use the same id.
    #[error("RTP header extension id {0} used twice")]
    DuplicateExtensionId(u8),
}

/// Field trials in the `Name1/Group1/Name2/Group2/` format.
///
/// A trial is enabled when its group starts with `Enabled`.
///
/// ```
/// # use datagram_dtls::config::FieldTrials;
/// let trials: FieldTrials = "WebRTC-Foo/Enabled-100/WebRTC-Bar/Disabled/".parse().unwrap();
///
/// assert!(trials.is_enabled("WebRTC-Foo"));
/// assert!(!trials.is_enabled("WebRTC-Bar"));
/// assert!(!trials.is_enabled("WebRTC-Baz"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldTrials(BTreeMap<String, String>);

impl FieldTrials {
    /// No trials.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the group for a trial.
    pub fn set(mut self, name: impl Into<String>, group: impl Into<String>) -> Self {
        self.0.insert(name.into(), group.into());
        self
    }

    /// Group of a trial, if present.
    pub fn find_full_name(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(|g| g.as_str())
    }

    /// Whether the trial's group starts with `Enabled`.
    pub fn is_enabled(&self, name: &str) -> bool {
        self.find_full_name(name)
            .map(|g| g.starts_with("Enabled"))
            .unwrap_or(false)
    }
}

impl FromStr for FieldTrials {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut trials = BTreeMap::new();

        if s.is_empty() {
            return Ok(FieldTrials(trials));
        }

        let Some(body) = s.strip_suffix('/') else {
            return Err(ConfigError::TrialNotTerminated(s.to_string()));
        };

        let mut parts = body.split('/');
        while let Some(name) = parts.next() {
            let Some(group) = parts.next() else {
                return Err(ConfigError::TrialWithoutGroup(name.to_string()));
            };
            if name.is_empty() || group.is_empty() {
                return Err(ConfigError::EmptyTrial(format!("{}/{}", name, group)));
            }
            trials.insert(name.to_string(), group.to_string());
        }

        Ok(FieldTrials(trials))
    }
}

impl fmt::Display for FieldTrials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (name, group) in &self.0 {
            write!(f, "{}/{}/", name, group)?;
        }
        Ok(())
    }
}

/// SRTP and frame encryption preferences.
///
/// Held for the layers above. The adaptor itself doesn't interpret them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CryptoOptions {
    /// Allow AES-GCM SRTP suites.
    pub enable_gcm_crypto_suites: bool,
    /// Allow the AES_CM_128_HMAC_SHA1_32 suite.
    pub enable_aes128_sha1_32_crypto_cipher: bool,
    /// Encrypt RTP header extensions (RFC 6904).
    pub enable_encrypted_rtp_header_extensions: bool,
    /// Require end to end frame encryption.
    pub require_frame_encryption: bool,
}

/// Config for creating a [`DatagramDtlsAdaptor`].
///
/// ```
/// use datagram_dtls::config::{AdaptorConfig, FieldTrials};
/// use datagram_dtls::rtp::Extension;
///
/// let config = AdaptorConfig::new()
///     .add_rtp_header_extension(Extension::TransportSequenceNumber, 5)
///     .set_field_trials("WebRTC-Foo/Enabled/".parse::<FieldTrials>().unwrap());
///
/// assert!(config.translate_feedback());
/// ```
///
/// Configs implement [`Clone`] to help create multiple adaptors.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdaptorConfig {
    rtp_header_extensions: Vec<RtpExtension>,
    field_trials: FieldTrials,
    crypto_options: CryptoOptions,
}

impl AdaptorConfig {
    /// Creates a new default config.
    pub fn new() -> Self {
        AdaptorConfig::default()
    }

    /// The negotiated RTP header extensions.
    pub fn rtp_header_extensions(&self) -> &[RtpExtension] {
        &self.rtp_header_extensions
    }

    /// Replace the negotiated RTP header extensions.
    ///
    /// Only the transport sequence number is looked at, but all can be passed.
    pub fn set_rtp_header_extensions(mut self, exts: Vec<RtpExtension>) -> Self {
        self.rtp_header_extensions = exts;
        self
    }

    /// Add one negotiated RTP header extension.
    pub fn add_rtp_header_extension(mut self, ext: Extension, id: u8) -> Self {
        self.rtp_header_extensions.push(RtpExtension::new(ext, id));
        self
    }

    /// The field trials.
    pub fn field_trials(&self) -> &FieldTrials {
        &self.field_trials
    }

    /// Set the field trials.
    pub fn set_field_trials(mut self, trials: FieldTrials) -> Self {
        self.field_trials = trials;
        self
    }

    /// The crypto options.
    pub fn crypto_options(&self) -> &CryptoOptions {
        &self.crypto_options
    }

    /// Set the crypto options.
    pub fn set_crypto_options(mut self, options: CryptoOptions) -> Self {
        self.crypto_options = options;
        self
    }

    /// Whether RTP is rewritten and acks turned into feedback.
    ///
    /// On unless [`DISABLE_FEEDBACK_TRANSLATION_TRIAL`] is enabled.
    pub fn translate_feedback(&self) -> bool {
        !self.field_trials.is_enabled(DISABLE_FEEDBACK_TRANSLATION_TRIAL)
    }

    /// Check the header extensions.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut seen = [false; 256];

        for ext in &self.rtp_header_extensions {
            if ext.id == 0 {
                return Err(ConfigError::ExtensionIdZero(ext.uri.clone()));
            }
            let idx = ext.id as usize;
            if seen[idx] {
                return Err(ConfigError::DuplicateExtensionId(ext.id));
            }
            seen[idx] = true;
        }

        Ok(())
    }

    /// Validate and create the adaptor.
    pub fn build(
        self,
        ice: SharedIce,
        lower: LowerTransport,
    ) -> Result<Rc<RefCell<DatagramDtlsAdaptor>>, AdaptorError> {
        self.validate()?;
        Ok(DatagramDtlsAdaptor::new(self, ice, lower))
    }
}
