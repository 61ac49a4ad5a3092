//! Error type for the plugin crate.

use thiserror::Error;

/// Result type alias using the plugin crate's error type.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors raised while referencing, resolving, caching, or verifying
/// a plugin.
#[derive(Debug, Error)]
pub enum Error {
    /// A plugin reference string could not be parsed.
    #[error("invalid plugin reference '{0}'")]
    InvalidReference(String),

    /// No resolver in the chain could resolve the reference.
    #[error("plugin '{0}' could not be resolved by any resolver")]
    NotResolvable(String),

    /// The resolved artifact's digest did not match the expected one.
    #[error("digest mismatch for plugin '{name}': expected {expected}, got {actual}")]
    DigestMismatch {
        /// Plugin name.
        name: String,
        /// Digest recorded in the lockfile.
        expected: String,
        /// Digest computed from the fetched artifact.
        actual: String,
    },

    /// Signature verification failed or was required but unavailable.
    #[error("signature verification failed for plugin '{0}': {1}")]
    SignatureInvalid(String, String),

    /// The local cache could not be read or written.
    #[error("cache error: {0}")]
    Cache(String),

    /// A registry request failed.
    #[error("registry error: {0}")]
    Registry(String),

    /// The lockfile is missing an entry invariant requires.
    #[error("lockfile inconsistency: {0}")]
    Lockfile(String),
}

impl Error {
    /// Create an invalid-reference error.
    #[must_use]
    pub fn invalid_reference(s: impl Into<String>) -> Self {
        Self::InvalidReference(s.into())
    }

    /// Create a not-resolvable error.
    #[must_use]
    pub fn not_resolvable(name: impl Into<String>) -> Self {
        Self::NotResolvable(name.into())
    }

    /// Create a cache error.
    #[must_use]
    pub fn cache(msg: impl Into<String>) -> Self {
        Self::Cache(msg.into())
    }

    /// Create a registry error.
    #[must_use]
    pub fn registry(msg: impl Into<String>) -> Self {
        Self::Registry(msg.into())
    }

    /// Create a lockfile-inconsistency error.
    #[must_use]
    pub fn lockfile(msg: impl Into<String>) -> Self {
        Self::Lockfile(msg.into())
    }
}
