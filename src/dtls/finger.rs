use std::fmt;
use std::str::FromStr;

use super::DtlsError;

/// Certificate fingerprint, as found in `a=fingerprint` SDP lines.
///
/// The adaptor accepts these but never checks them.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint {
    /// Hash function used to produce the `bytes`, normally `sha-256`.
    pub hash_func: String,

    /// Digest of the certificate by the algorithm in `hash_func`.
    pub bytes: Vec<u8>,
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ", self.hash_func)?;
        for (i, b) in self.bytes.iter().enumerate() {
            if i > 0 {
                write!(f, ":")?;
            }
            write!(f, "{:02X}", b)?;
        }
        Ok(())
    }
}

impl FromStr for Fingerprint {
    type Err = DtlsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (hash_func, hex_with_colons) = s
            .split_once(' ')
            .ok_or_else(|| DtlsError::BadFingerprint(s.to_string()))?;

        let bytes = hex_with_colons
            .split(':')
            .map(|hex| u8::from_str_radix(hex, 16))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| DtlsError::BadFingerprint(format!("{}: {}", s, e)))?;

        Ok(Fingerprint {
            hash_func: hash_func.to_owned(),
            bytes,
        })
    }
}
