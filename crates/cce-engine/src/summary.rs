//! `ExecutionSummary`: the aggregate result of a check run.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::evidence::Outcome;

/// One control's outcome plus the observations that produced it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlResult {
    /// Control id.
    pub control_id: String,
    /// Control name.
    pub control_name: String,
    /// The control's overall outcome: `errored` if any observation
    /// errored, else `failed` if any failed, else `skipped` if every
    /// observation was skipped, else `passed`.
    pub outcome: Outcome,
    /// Per-observation evidence, in declaration order.
    pub observations: Vec<ObservationResult>,
}

/// One observation's plugin, outcome, and evidence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservationResult {
    /// Plugin that produced this observation.
    pub plugin: String,
    /// Terminal outcome.
    pub outcome: Outcome,
    /// The evidence collected, absent for skipped observations.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evidence: Option<crate::evidence::Evidence>,
}

/// Counts of total/passed/failed/errored/skipped controls plus
/// aggregate duration, produced at the end of a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionSummary {
    /// Every control's result, in profile order.
    pub controls: Vec<ControlResult>,
    /// Total controls evaluated.
    pub total: usize,
    /// Controls whose every observation passed.
    pub passed: usize,
    /// Controls with at least one failed observation and no errors.
    pub failed: usize,
    /// Controls with at least one errored observation.
    pub errored: usize,
    /// Controls entirely excluded by a filter.
    pub skipped: usize,
    /// Aggregate wall-clock duration of the run.
    #[serde(with = "duration_ms")]
    pub duration: Duration,
}

impl ExecutionSummary {
    /// Summarize a set of per-control results into aggregate counts.
    #[must_use]
    pub fn summarize(controls: Vec<ControlResult>, duration: Duration) -> Self {
        let total = controls.len();
        let mut passed = 0;
        let mut failed = 0;
        let mut errored = 0;
        let mut skipped = 0;
        for control in &controls {
            match control.outcome {
                Outcome::Passed => passed += 1,
                Outcome::Failed => failed += 1,
                Outcome::Errored => errored += 1,
                Outcome::Skipped => skipped += 1,
            }
        }
        Self { controls, total, passed, failed, errored, skipped, duration }
    }
}

/// A control's outcome given its observations' outcomes: `errored`
/// dominates `failed` dominates `skipped` dominates `passed`, and an
/// empty observation list (nothing ran) counts as skipped.
#[must_use]
pub fn control_outcome(observations: &[ObservationResult]) -> Outcome {
    if observations.is_empty() {
        return Outcome::Skipped;
    }
    if observations.iter().any(|o| o.outcome == Outcome::Errored) {
        return Outcome::Errored;
    }
    if observations.iter().any(|o| o.outcome == Outcome::Failed) {
        return Outcome::Failed;
    }
    if observations.iter().all(|o| o.outcome == Outcome::Skipped) {
        return Outcome::Skipped;
    }
    Outcome::Passed
}

mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(u64::try_from(duration.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
