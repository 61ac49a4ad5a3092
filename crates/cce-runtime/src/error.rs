//! Error type for the runtime crate.

use thiserror::Error;

/// Result type alias using the runtime crate's error type.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors raised while instantiating or executing a sandboxed plugin.
#[derive(Debug, Error)]
pub enum Error {
    /// Compiling or instantiating the wasm module failed.
    #[error("plugin '{0}' failed to load: {1}")]
    Load(String, String),

    /// A memory-limit configuration value was rejected.
    #[error("invalid memory limit: {0}")]
    InvalidMemoryLimit(String),

    /// Execution exceeded its deadline.
    #[error("plugin '{0}' exceeded its execution deadline")]
    Timeout(String),

    /// A host function call was denied by capability policy.
    #[error("capability denied for plugin '{plugin}': {capability}")]
    CapabilityDenied {
        /// Plugin that was denied.
        plugin: String,
        /// The capability that would have been required.
        capability: String,
    },

    /// Guest memory access (read, write, allocate) failed.
    #[error("guest memory error: {0}")]
    Memory(String),

    /// A host function's request or response could not be decoded.
    #[error("malformed host call payload: {0}")]
    MalformedPayload(String),

    /// A network or subprocess operation failed.
    #[error("execution error: {0}")]
    Execution(String),
}

impl Error {
    /// Create a load error.
    #[must_use]
    pub fn load(plugin: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Load(plugin.into(), msg.into())
    }

    /// Create an invalid-memory-limit error.
    #[must_use]
    pub fn invalid_memory_limit(msg: impl Into<String>) -> Self {
        Self::InvalidMemoryLimit(msg.into())
    }

    /// Create a capability-denied error.
    #[must_use]
    pub fn capability_denied(plugin: impl Into<String>, capability: impl Into<String>) -> Self {
        Self::CapabilityDenied {
            plugin: plugin.into(),
            capability: capability.into(),
        }
    }

    /// Create a memory error.
    #[must_use]
    pub fn memory(msg: impl Into<String>) -> Self {
        Self::Memory(msg.into())
    }

    /// Create a malformed-payload error.
    #[must_use]
    pub fn malformed_payload(msg: impl Into<String>) -> Self {
        Self::MalformedPayload(msg.into())
    }

    /// Create an execution error.
    #[must_use]
    pub fn execution(msg: impl Into<String>) -> Self {
        Self::Execution(msg.into())
    }
}
