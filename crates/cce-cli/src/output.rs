//! Rendering an [`ExecutionSummary`] for a human or a downstream
//! parser. Writes through an explicit `io::Write` handle rather than
//! `println!`/`eprintln!`, since this workspace denies the print
//! macros outright (`clippy::print_stdout`, `clippy::print_stderr`) —
//! only `write!`/`writeln!` against a named stream are allowed.

use std::io::Write;

use cce_engine::{ControlResult, ExecutionSummary};

use crate::cli::OutputFormat;
use crate::error::{Error, Result};

/// Render `summary` to `out` in `format`.
pub fn render(out: &mut impl Write, format: OutputFormat, summary: &ExecutionSummary) -> Result<()> {
    match format {
        OutputFormat::Json => render_json(out, summary),
        OutputFormat::Text => render_text(out, summary),
    }
}

fn render_json(out: &mut impl Write, summary: &ExecutionSummary) -> Result<()> {
    let json = serde_json::to_string_pretty(summary)
        .map_err(|e| Error::configuration(format!("serializing summary: {e}")))?;
    writeln!(out, "{json}")?;
    Ok(())
}

fn render_text(out: &mut impl Write, summary: &ExecutionSummary) -> Result<()> {
    for control in &summary.controls {
        writeln!(out, "[{:>7}] {} ({})", outcome_label(control), control.control_id, control.control_name)?;
        for observation in &control.observations {
            writeln!(out, "           - {}: {}", observation.plugin, observation_label(observation))?;
        }
    }
    writeln!(out)?;
    writeln!(
        out,
        "{} total, {} passed, {} failed, {} errored, {} skipped ({:.2}s)",
        summary.total,
        summary.passed,
        summary.failed,
        summary.errored,
        summary.skipped,
        summary.duration.as_secs_f64()
    )?;
    Ok(())
}

fn outcome_label(control: &ControlResult) -> &'static str {
    match control.outcome {
        cce_engine::Outcome::Passed => "PASS",
        cce_engine::Outcome::Failed => "FAIL",
        cce_engine::Outcome::Errored => "ERROR",
        cce_engine::Outcome::Skipped => "SKIP",
    }
}

fn observation_label(observation: &cce_engine::ObservationResult) -> String {
    let base = match observation.outcome {
        cce_engine::Outcome::Passed => "passed",
        cce_engine::Outcome::Failed => "failed",
        cce_engine::Outcome::Errored => "errored",
        cce_engine::Outcome::Skipped => "skipped",
    };
    match observation.evidence.as_ref().and_then(|e| e.error.as_ref()) {
        Some(detail) => format!("{base} ({})", detail.message),
        None => base.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn text_output_contains_aggregate_line() {
        let summary = ExecutionSummary::summarize(Vec::new(), Duration::from_secs(1));
        let mut buf = Vec::new();
        render(&mut buf, OutputFormat::Text, &summary).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.contains("0 total"));
    }

    #[test]
    fn json_output_round_trips_through_serde() {
        let summary = ExecutionSummary::summarize(Vec::new(), Duration::from_secs(1));
        let mut buf = Vec::new();
        render(&mut buf, OutputFormat::Json, &summary).unwrap();
        let parsed: serde_json::Value = serde_json::from_slice(&buf).unwrap();
        assert_eq!(parsed["total"], 0);
    }
}
