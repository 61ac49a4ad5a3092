//! `Digest`: a content hash used to pin and verify a resolved plugin
//! artifact.

use serde::{Deserialize, Serialize};
use sha2::{Digest as _, Sha256};
use std::fmt;

/// Digest algorithms this crate can compute and verify. `sha256` is
/// the minimum supported algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Algorithm {
    /// SHA-256.
    Sha256,
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sha256 => f.write_str("sha256"),
        }
    }
}

/// A content digest. The empty digest (`value` empty) is the sentinel
/// for "unknown" and never compares equal to a computed digest.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Digest {
    /// The digest algorithm.
    pub algorithm: Algorithm,
    /// Lowercase hex-encoded digest value; empty means "unknown".
    pub value: String,
}

impl Digest {
    /// The "unknown" sentinel digest.
    #[must_use]
    pub fn unknown() -> Self {
        Self {
            algorithm: Algorithm::Sha256,
            value: String::new(),
        }
    }

    /// Whether this is the unknown sentinel.
    #[must_use]
    pub fn is_unknown(&self) -> bool {
        self.value.is_empty()
    }

    /// Compute the SHA-256 digest of `bytes`.
    #[must_use]
    pub fn sha256_of(bytes: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        Self {
            algorithm: Algorithm::Sha256,
            value: encode_hex(&hasher.finalize()),
        }
    }

    /// Verify that `bytes` hashes to this digest. The unknown sentinel
    /// never verifies.
    #[must_use]
    pub fn verify(&self, bytes: &[u8]) -> bool {
        if self.is_unknown() {
            return false;
        }
        match self.algorithm {
            Algorithm::Sha256 => Self::sha256_of(bytes).value == self.value,
        }
    }
}

fn encode_hex(bytes: &[u8]) -> String {
    use std::fmt::Write;
    let mut s = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        let _ = write!(s, "{b:02x}");
    }
    s
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_unknown() {
            f.write_str("unknown")
        } else {
            write!(f, "{}:{}", self.algorithm, self.value)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_sentinel_never_verifies() {
        let d = Digest::unknown();
        assert!(d.is_unknown());
        assert!(!d.verify(b"anything"));
    }

    #[test]
    fn sha256_round_trips() {
        let d = Digest::sha256_of(b"hello");
        assert!(!d.is_unknown());
        assert!(d.verify(b"hello"));
        assert!(!d.verify(b"goodbye"));
    }

    #[test]
    fn display_format() {
        let d = Digest::sha256_of(b"x");
        assert!(d.to_string().starts_with("sha256:"));
        assert_eq!(Digest::unknown().to_string(), "unknown");
    }
}
