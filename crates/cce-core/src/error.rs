//! Error type shared by the profile-reading contract.

use thiserror::Error;

/// Result type alias using the core error type.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors that can occur while reading or validating a profile.
#[derive(Debug, Error)]
pub enum Error {
    /// The profile could not be parsed or is structurally invalid.
    #[error("invalid profile: {0}")]
    InvalidProfile(String),

    /// A filter referenced a control id that does not exist.
    #[error("unknown control id in filter: {0}")]
    UnknownControl(String),

    /// Serialization/deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl Error {
    /// Create a new invalid-profile error.
    #[must_use]
    pub fn invalid_profile(msg: impl Into<String>) -> Self {
        Self::InvalidProfile(msg.into())
    }

    /// Create a new unknown-control error.
    #[must_use]
    pub fn unknown_control(id: impl Into<String>) -> Self {
        Self::UnknownControl(id.into())
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}
