//! The engine's top-level error taxonomy: a closed, five-member set
//! that every lower-crate error folds into. Extractor and policy code
//! in `cce-capability` never raises; host functions in `cce-runtime`
//! translate failures into wire responses rather than panicking. This
//! enum is where those domain errors finally become user-facing.

use thiserror::Error;

/// Result type alias using the engine crate's error type.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors raised while orchestrating a check run.
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed profile, unknown control id in a filter, undeclared
    /// plugin, or a filter expression that doesn't compile.
    #[error("validation error: {0}")]
    Validation(String),

    /// Missing plugin directory, runtime creation failure, or
    /// lockfile I/O failure.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Denial by strict policy, denial by the user, a non-interactive
    /// session missing capabilities, or a host-side capability check
    /// failure propagated from an observation's `error.type="capability"`.
    #[error("capability error: {0}")]
    Capability(String),

    /// A plugin could not be resolved by any resolver, its digest
    /// didn't match, or its signature didn't verify.
    #[error("resolution error: {0}")]
    Resolution(String),

    /// A plugin panicked, failed to instantiate, produced a host I/O
    /// error, or exceeded its deadline.
    #[error("execution error: {0}")]
    Execution(String),
}

impl Error {
    /// Create a validation error.
    #[must_use]
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a configuration error.
    #[must_use]
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Create a capability error.
    #[must_use]
    pub fn capability(msg: impl Into<String>) -> Self {
        Self::Capability(msg.into())
    }

    /// Create a resolution error.
    #[must_use]
    pub fn resolution(msg: impl Into<String>) -> Self {
        Self::Resolution(msg.into())
    }

    /// Create an execution error.
    #[must_use]
    pub fn execution(msg: impl Into<String>) -> Self {
        Self::Execution(msg.into())
    }
}

impl From<cce_core::Error> for Error {
    fn from(e: cce_core::Error) -> Self {
        Self::Validation(e.to_string())
    }
}

impl From<cce_capability::Error> for Error {
    fn from(e: cce_capability::Error) -> Self {
        match e {
            cce_capability::Error::Denied(_) | cce_capability::Error::NonInteractiveMissing(_) => {
                Self::Capability(e.to_string())
            }
            cce_capability::Error::Store(_) => Self::Configuration(e.to_string()),
            cce_capability::Error::Extraction(_) => Self::Execution(e.to_string()),
        }
    }
}

impl From<cce_plugin::Error> for Error {
    fn from(e: cce_plugin::Error) -> Self {
        match e {
            cce_plugin::Error::InvalidReference(_)
            | cce_plugin::Error::NotResolvable(_)
            | cce_plugin::Error::DigestMismatch { .. }
            | cce_plugin::Error::SignatureInvalid(_, _)
            | cce_plugin::Error::Registry(_) => Self::Resolution(e.to_string()),
            cce_plugin::Error::Cache(_) | cce_plugin::Error::Lockfile(_) => {
                Self::Configuration(e.to_string())
            }
        }
    }
}

impl From<cce_runtime::Error> for Error {
    fn from(e: cce_runtime::Error) -> Self {
        match e {
            cce_runtime::Error::InvalidMemoryLimit(_) => Self::Configuration(e.to_string()),
            cce_runtime::Error::CapabilityDenied { .. } => Self::Capability(e.to_string()),
            cce_runtime::Error::Load(_, _)
            | cce_runtime::Error::Timeout(_)
            | cce_runtime::Error::Memory(_)
            | cce_runtime::Error::MalformedPayload(_)
            | cce_runtime::Error::Execution(_) => Self::Execution(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capability_denied_maps_to_capability_error() {
        let e: Error = cce_capability::Error::denied("fs:read:/etc/shadow").into();
        assert!(matches!(e, Error::Capability(_)));
    }

    #[test]
    fn store_error_maps_to_configuration_error() {
        let e: Error = cce_capability::Error::store("disk full").into();
        assert!(matches!(e, Error::Configuration(_)));
    }

    #[test]
    fn digest_mismatch_maps_to_resolution_error() {
        let e: Error = cce_plugin::Error::DigestMismatch {
            name: "file".to_string(),
            expected: "sha256:aa".to_string(),
            actual: "sha256:bb".to_string(),
        }
        .into();
        assert!(matches!(e, Error::Resolution(_)));
    }

    #[test]
    fn runtime_timeout_maps_to_execution_error() {
        let e: Error = cce_runtime::Error::Timeout("file".to_string()).into();
        assert!(matches!(e, Error::Execution(_)));
    }

    #[test]
    fn runtime_capability_denied_maps_to_capability_error() {
        let e: Error = cce_runtime::Error::capability_denied("file", "exec:rm").into();
        assert!(matches!(e, Error::Capability(_)));
    }
}
