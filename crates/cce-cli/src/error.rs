//! The CLI's own error type: wraps whatever the engine and its
//! collaborators report, plus the failures specific to this binary
//! (argument parsing, profile loading, output rendering).

use thiserror::Error;

/// Result type alias using the CLI crate's error type.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors a CLI invocation can surface before an exit code is chosen.
#[derive(Debug, Error)]
pub enum Error {
    /// A configuration, environment, or I/O problem specific to this
    /// binary (parsing the profile file, resolving a path, opening a
    /// log file).
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Propagated from the orchestrating use case.
    #[error(transparent)]
    Engine(#[from] cce_engine::Error),

    /// Propagated while reading or writing the capability store
    /// directly (the `grants` subcommand).
    #[error(transparent)]
    Capability(#[from] cce_capability::Error),
}

impl Error {
    /// Create a configuration error.
    #[must_use]
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Self::Configuration(e.to_string())
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(e: serde_yaml::Error) -> Self {
        Self::Configuration(e.to_string())
    }
}
