//! Error type for the capability crate.

use thiserror::Error;

/// Result type alias using the capability crate's error type.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors raised while collecting, granting, or persisting capabilities.
#[derive(Debug, Error)]
pub enum Error {
    /// A capability was denied by policy or by the user.
    #[error("capability denied: {0}")]
    Denied(String),

    /// The process is non-interactive and capabilities are missing.
    #[error("missing capabilities and no interactive session available: {0}")]
    NonInteractiveMissing(String),

    /// Reading or writing the persisted grant store failed.
    #[error("capability store error: {0}")]
    Store(String),

    /// Extracting declared capabilities from a plugin failed.
    #[error("capability extraction error: {0}")]
    Extraction(String),
}

impl Error {
    /// Create a denied-capability error.
    #[must_use]
    pub fn denied(msg: impl Into<String>) -> Self {
        Self::Denied(msg.into())
    }

    /// Create a non-interactive-missing error.
    #[must_use]
    pub fn non_interactive_missing(msg: impl Into<String>) -> Self {
        Self::NonInteractiveMissing(msg.into())
    }

    /// Create a store error.
    #[must_use]
    pub fn store(msg: impl Into<String>) -> Self {
        Self::Store(msg.into())
    }

    /// Create an extraction error.
    #[must_use]
    pub fn extraction(msg: impl Into<String>) -> Self {
        Self::Extraction(msg.into())
    }
}
