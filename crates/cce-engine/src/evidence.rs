//! `Evidence`: the structured result of one observation, and the
//! pending/running/terminal state machine an observation moves
//! through on its way to a final outcome.

use cce_core::ErrorDetail;
use serde::{Deserialize, Serialize};

/// The JSON document a plugin's `observe()` call returns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Evidence {
    /// Whether the observation's assertion held.
    pub status: bool,
    /// Arbitrary structured data the plugin collected.
    #[serde(default)]
    pub data: serde_json::Value,
    /// Present when the plugin itself reported a structured failure
    /// rather than a simple status=false assertion result.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorDetail>,
    /// Set when `data` was cut short by a size bound.
    #[serde(default)]
    pub truncated: bool,
    /// Wall-clock time the observation took.
    pub duration_ms: u64,
}

impl Evidence {
    /// The terminal outcome this evidence implies, per the
    /// capability-denial/plugin-load-failure/plugin-panic → errored,
    /// assertion-failure → failed mapping.
    #[must_use]
    pub fn outcome(&self) -> Outcome {
        if self.error.is_some() {
            Outcome::Errored
        } else if self.status {
            Outcome::Passed
        } else {
            Outcome::Failed
        }
    }

    /// Replace `data` with a truncation marker if its serialized size
    /// exceeds `max_bytes`, per the `max_evidence_size_bytes` config
    /// limit.
    pub fn enforce_max_size(&mut self, max_bytes: u64) {
        let Ok(serialized) = serde_json::to_vec(&self.data) else {
            return;
        };
        if serialized.len() as u64 > max_bytes {
            self.data = serde_json::json!({ "truncated": true });
            self.truncated = true;
        }
    }
}

/// The terminal classification of one observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    /// The plugin's assertion held.
    Passed,
    /// The plugin ran to completion and reported `status: false`.
    Failed,
    /// Capability denial, plugin load failure, or plugin panic.
    Errored,
    /// Excluded by a filter before it ever ran.
    Skipped,
}

/// The state an observation moves through: `pending -> running ->
/// terminal`. Terminal states are immutable; attempting to leave one
/// is a programming error in the orchestrating use case, not a user
/// error, so it's reported rather than silently tolerated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObservationState {
    /// Not yet started.
    Pending,
    /// Currently instantiated and executing.
    Running,
    /// Reached a final outcome.
    Terminal(Outcome),
}

impl ObservationState {
    /// A fresh, not-yet-started observation.
    #[must_use]
    pub fn pending() -> Self {
        Self::Pending
    }

    /// Whether this state is terminal.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Terminal(_))
    }

    /// Move from `Pending` to `Running`. Returns `false` if the
    /// observation wasn't pending.
    #[must_use]
    pub fn start(&mut self) -> bool {
        if *self != Self::Pending {
            return false;
        }
        *self = Self::Running;
        true
    }

    /// Move from `Running` to a terminal outcome. Returns `false` if
    /// the observation wasn't running.
    #[must_use]
    pub fn finish(&mut self, outcome: Outcome) -> bool {
        if *self != Self::Running {
            return false;
        }
        *self = Self::Terminal(outcome);
        true
    }

    /// Move directly from `Pending` to `Terminal(Skipped)`: a filter
    /// excluded this observation before it ever ran.
    #[must_use]
    pub fn skip(&mut self) -> bool {
        if *self != Self::Pending {
            return false;
        }
        *self = Self::Terminal(Outcome::Skipped);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn passed_evidence_has_passed_outcome() {
        let evidence = Evidence {
            status: true,
            data: serde_json::Value::Null,
            error: None,
            truncated: false,
            duration_ms: 10,
        };
        assert_eq!(evidence.outcome(), Outcome::Passed);
    }

    #[test]
    fn failed_assertion_has_failed_outcome() {
        let evidence = Evidence {
            status: false,
            data: serde_json::Value::Null,
            error: None,
            truncated: false,
            duration_ms: 10,
        };
        assert_eq!(evidence.outcome(), Outcome::Failed);
    }

    #[test]
    fn structured_error_overrides_status_as_errored() {
        let evidence = Evidence {
            status: false,
            data: serde_json::Value::Null,
            error: Some(ErrorDetail::capability("denied")),
            truncated: false,
            duration_ms: 10,
        };
        assert_eq!(evidence.outcome(), Outcome::Errored);
    }

    #[test]
    fn oversized_data_is_replaced_with_truncation_marker() {
        let mut evidence = Evidence {
            status: true,
            data: serde_json::json!({"payload": "x".repeat(100)}),
            error: None,
            truncated: false,
            duration_ms: 10,
        };
        evidence.enforce_max_size(16);
        assert!(evidence.truncated);
        assert_eq!(evidence.data, serde_json::json!({"truncated": true}));
    }

    #[test]
    fn data_within_limit_is_left_untouched() {
        let mut evidence = Evidence {
            status: true,
            data: serde_json::json!({"ok": true}),
            error: None,
            truncated: false,
            duration_ms: 10,
        };
        evidence.enforce_max_size(1024);
        assert!(!evidence.truncated);
        assert_eq!(evidence.data, serde_json::json!({"ok": true}));
    }

    #[test]
    fn state_machine_follows_pending_running_terminal() {
        let mut state = ObservationState::pending();
        assert!(state.start());
        assert!(!state.is_terminal());
        assert!(state.finish(Outcome::Passed));
        assert!(state.is_terminal());
        assert_eq!(state, ObservationState::Terminal(Outcome::Passed));
    }

    #[test]
    fn cannot_finish_a_state_that_never_started() {
        let mut state = ObservationState::pending();
        assert!(!state.finish(Outcome::Passed));
    }

    #[test]
    fn cannot_leave_a_terminal_state() {
        let mut state = ObservationState::pending();
        assert!(state.start());
        assert!(state.finish(Outcome::Errored));
        assert!(!state.start());
        assert!(!state.finish(Outcome::Passed));
    }

    #[test]
    fn skip_only_applies_from_pending() {
        let mut state = ObservationState::pending();
        assert!(state.skip());
        assert_eq!(state, ObservationState::Terminal(Outcome::Skipped));

        let mut running = ObservationState::pending();
        assert!(running.start());
        assert!(!running.skip());
    }
}
