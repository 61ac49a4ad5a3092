//! `log_message` host function: accepts a structured log record from
//! the plugin and re-emits it through `tracing`, scrubbed by the
//! redactor.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::redact::Redactor;

#[derive(Debug, Deserialize)]
pub struct LogRecord {
    pub level: String,
    pub message: String,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub correlation_id: Option<String>,
    #[serde(default)]
    pub attributes: Vec<LogAttribute>,
}

#[derive(Debug, Deserialize)]
pub struct LogAttribute {
    pub key: String,
    #[serde(rename = "type")]
    pub attr_type: String,
    pub value: Value,
}

#[derive(Debug, Serialize, Default)]
pub struct LogMessageResponse {
    pub accepted: bool,
}

/// Render one attribute to a `key=value` pair for the log line. A
/// value that doesn't match its declared type falls back to its raw
/// JSON rendering under the generic `any` type rather than rejecting
/// the whole record.
fn render_attribute(attr: &LogAttribute) -> String {
    let rendered = match attr.attr_type.as_str() {
        "string" => attr.value.as_str().map(str::to_string),
        "int64" => attr.value.as_i64().map(|v| v.to_string()),
        "bool" => attr.value.as_bool().map(|v| v.to_string()),
        "float64" => attr.value.as_f64().map(|v| v.to_string()),
        "time" | "error" | "any" => attr.value.as_str().map(str::to_string),
        _ => None,
    };
    rendered.unwrap_or_else(|| attr.value.to_string())
}

/// Emit `record` at the appropriate `tracing` level, scrubbing the
/// message and every string-rendered attribute through `redactor`.
/// Never panics: an unrecognized level defaults to info with a
/// warning logged alongside it.
pub fn emit(record: &LogRecord, redactor: &Redactor) -> LogMessageResponse {
    let message = redactor.scrub_string(&record.message);
    let attrs: Vec<String> = record
        .attributes
        .iter()
        .map(|a| format!("{}={}", a.key, redactor.scrub_string(&render_attribute(a))))
        .collect();
    let attrs_joined = attrs.join(" ");
    let correlation_id = record.correlation_id.as_deref().unwrap_or("");

    match record.level.to_ascii_lowercase().as_str() {
        "trace" => tracing::trace!(correlation_id, attrs = %attrs_joined, "{message}"),
        "debug" => tracing::debug!(correlation_id, attrs = %attrs_joined, "{message}"),
        "warn" | "warning" => tracing::warn!(correlation_id, attrs = %attrs_joined, "{message}"),
        "error" => tracing::error!(correlation_id, attrs = %attrs_joined, "{message}"),
        "info" => tracing::info!(correlation_id, attrs = %attrs_joined, "{message}"),
        other => {
            tracing::warn!(level = other, "plugin log record used an unrecognized level, defaulting to info");
            tracing::info!(correlation_id, attrs = %attrs_joined, "{message}");
        }
    }

    LogMessageResponse { accepted: true }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_attribute_type_falls_back_to_raw_json() {
        let attr = LogAttribute {
            key: "x".to_string(),
            attr_type: "nonsense".to_string(),
            value: Value::from(42),
        };
        assert_eq!(render_attribute(&attr), "42");
    }

    #[test]
    fn int64_mismatch_falls_back_to_raw_json() {
        let attr = LogAttribute {
            key: "x".to_string(),
            attr_type: "int64".to_string(),
            value: Value::from("not a number"),
        };
        assert_eq!(render_attribute(&attr), "\"not a number\"");
    }

    #[test]
    fn emit_accepts_unknown_level() {
        let record = LogRecord {
            level: "critical".to_string(),
            message: "hello".to_string(),
            timestamp: None,
            correlation_id: None,
            attributes: vec![],
        };
        let response = emit(&record, &Redactor::new());
        assert!(response.accepted);
    }
}
