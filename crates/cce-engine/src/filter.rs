//! A control filter: an optional set of glob-style patterns over
//! control ids. Validated once against a profile's full control list
//! before a run starts, so a typo in a filter fails fast rather than
//! silently skipping every control.

use glob::Pattern;

use crate::error::{Error, Result};

/// Selects a subset of a profile's controls by id. Patterns without
/// any glob metacharacter are treated as exact ids.
pub struct ControlFilter {
    patterns: Vec<Pattern>,
}

impl ControlFilter {
    /// No filter: every control is selected.
    #[must_use]
    pub fn all() -> Self {
        Self { patterns: Vec::new() }
    }

    /// Compile a filter from raw pattern strings. Each pattern must
    /// compile as a glob; an invalid pattern is a validation error.
    pub fn compile(raw: &[String]) -> Result<Self> {
        let patterns = raw
            .iter()
            .map(|p| {
                Pattern::new(p).map_err(|e| Error::validation(format!("invalid filter pattern '{p}': {e}")))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { patterns })
    }

    /// Whether this filter selects every control.
    #[must_use]
    pub fn is_unfiltered(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Whether `control_id` is selected.
    #[must_use]
    pub fn matches(&self, control_id: &str) -> bool {
        self.patterns.is_empty() || self.patterns.iter().any(|p| p.matches(control_id))
    }

    /// Validate that every literal (non-glob) pattern names a control
    /// id that actually exists in `known_ids`. Glob patterns are
    /// exempt since an empty match is plausible and not a typo.
    pub fn validate_against(&self, raw: &[String], known_ids: &[String]) -> Result<()> {
        for pattern in raw {
            let is_literal = !pattern.contains(['*', '?', '[']);
            if is_literal && !known_ids.iter().any(|id| id == pattern) {
                return Err(Error::validation(format!(
                    "filter references unknown control id '{pattern}'"
                )));
            }
        }
        Ok(())
    }
}
