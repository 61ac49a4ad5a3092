//! Wire-level error shape shared by the sandbox host functions and the
//! engine's evidence records.

use serde::{Deserialize, Serialize};

/// Discriminant for `ErrorDetail::error_type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorType {
    /// A capability check failed.
    Capability,
    /// The request was malformed.
    Config,
    /// A network operation failed.
    Network,
    /// An unexpected internal failure.
    Internal,
    /// The operation exceeded its deadline.
    Timeout,
    /// A subprocess could not be executed or exited abnormally.
    Execution,
}

/// Structured error attached to a host-function response or an
/// observation's evidence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorDetail {
    /// Discriminant used by callers to branch without string matching.
    #[serde(rename = "type")]
    pub error_type: ErrorType,

    /// Machine-readable code, e.g. `"ETIMEDOUT"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,

    /// Human-readable, redaction-scrubbed message.
    pub message: String,

    /// Set when `error_type == Timeout`, so callers don't need to match
    /// on the code string to detect a deadline exceedance.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_timeout: bool,
}

impl ErrorDetail {
    /// Build a capability-denial error detail.
    #[must_use]
    pub fn capability(message: impl Into<String>) -> Self {
        Self {
            error_type: ErrorType::Capability,
            code: None,
            message: message.into(),
            is_timeout: false,
        }
    }

    /// Build a malformed-request error detail.
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self {
            error_type: ErrorType::Config,
            code: None,
            message: message.into(),
            is_timeout: false,
        }
    }

    /// Build a network-failure error detail.
    #[must_use]
    pub fn network(message: impl Into<String>) -> Self {
        Self {
            error_type: ErrorType::Network,
            code: None,
            message: message.into(),
            is_timeout: false,
        }
    }

    /// Build an internal-failure error detail.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            error_type: ErrorType::Internal,
            code: None,
            message: message.into(),
            is_timeout: false,
        }
    }

    /// Build a timeout error detail.
    #[must_use]
    pub fn timeout(message: impl Into<String>) -> Self {
        Self {
            error_type: ErrorType::Timeout,
            code: Some("ETIMEDOUT".to_string()),
            message: message.into(),
            is_timeout: true,
        }
    }

    /// Build an execution-failure error detail.
    #[must_use]
    pub fn execution(message: impl Into<String>) -> Self {
        Self {
            error_type: ErrorType::Execution,
            code: None,
            message: message.into(),
            is_timeout: false,
        }
    }
}
