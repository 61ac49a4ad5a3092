//! A process-wide Redactor: tracks sensitive strings and scrubs them
//! out of anything surfaced to users (plugin stdout/stderr, error
//! messages).

use parking_lot::RwLock;
use regex::Regex;
use std::collections::BTreeSet;
use std::sync::Arc;

use crate::error::{Error, Result};

const MASK: &str = "[REDACTED]";

/// Tracks sensitive strings and patterns, and scrubs them from text.
/// Cloning shares the underlying tracked state; construct one per
/// process and clone it into every collaborator that needs to redact
/// output.
#[derive(Clone, Default)]
pub struct Redactor {
    tracked: Arc<RwLock<BTreeSet<String>>>,
    patterns: Arc<RwLock<Vec<Regex>>>,
}

impl Redactor {
    /// A redactor with nothing tracked yet.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `value` as sensitive. Empty strings are ignored — a
    /// blind `ScrubString` against an empty needle would otherwise
    /// mask everything.
    pub fn track(&self, value: impl Into<String>) {
        let value = value.into();
        if value.is_empty() {
            return;
        }
        self.tracked.write().insert(value);
    }

    /// Register every non-empty value in `values`.
    pub fn track_all<'a>(&self, values: impl IntoIterator<Item = &'a str>) {
        for v in values {
            self.track(v.to_string());
        }
    }

    /// Register a redaction pattern: anything it matches is masked
    /// wholesale, even values never seen ahead of time (secrets a
    /// plugin generates at runtime, e.g. `SECRET-[A-Z0-9]{8}`, can't
    /// be tracked by exact value).
    pub fn track_pattern(&self, pattern: &str) -> Result<()> {
        let regex = Regex::new(pattern)
            .map_err(|e| Error::execution(format!("invalid redaction pattern '{pattern}': {e}")))?;
        self.patterns.write().push(regex);
        Ok(())
    }

    /// Register every pattern in `patterns`, stopping at the first
    /// invalid one.
    pub fn track_patterns<'a>(&self, patterns: impl IntoIterator<Item = &'a str>) -> Result<()> {
        for pattern in patterns {
            self.track_pattern(pattern)?;
        }
        Ok(())
    }

    /// Return a copy of `input` with every tracked value and pattern
    /// match replaced. Longer tracked values are scrubbed first so a
    /// shorter value that happens to be a substring of a longer one
    /// never prevents the longer one from being masked; patterns run
    /// last since they can match text exact-value tracking already
    /// masked.
    #[must_use]
    pub fn scrub_string(&self, input: &str) -> String {
        let tracked = self.tracked.read();
        let mut ordered: Vec<&String> = tracked.iter().collect();
        ordered.sort_by_key(|s| std::cmp::Reverse(s.len()));

        let mut out = input.to_string();
        for needle in ordered {
            if !needle.is_empty() && out.contains(needle.as_str()) {
                out = out.replace(needle.as_str(), MASK);
            }
        }

        for pattern in self.patterns.read().iter() {
            if pattern.is_match(&out) {
                out = pattern.replace_all(&out, MASK).into_owned();
            }
        }
        out
    }

    /// Wrap an output stream (stdout/stderr capture) so every chunk of
    /// bytes written to it has tracked secrets scrubbed before
    /// forwarding, matching the plugin-output wrapping contract.
    #[must_use]
    pub fn scrub_bytes(&self, input: &[u8]) -> Vec<u8> {
        match std::str::from_utf8(input) {
            Ok(s) => self.scrub_string(s).into_bytes(),
            Err(_) => input.to_vec(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracked_value_is_masked() {
        let redactor = Redactor::new();
        redactor.track("super-secret-token");
        let scrubbed = redactor.scrub_string("auth used super-secret-token for the request");
        assert!(!scrubbed.contains("super-secret-token"));
        assert!(scrubbed.contains(MASK));
    }

    #[test]
    fn untracked_text_passes_through_unchanged() {
        let redactor = Redactor::new();
        redactor.track("foo");
        assert_eq!(redactor.scrub_string("bar baz"), "bar baz");
    }

    #[test]
    fn longer_values_masked_before_shorter_substrings() {
        let redactor = Redactor::new();
        redactor.track("sk");
        redactor.track("sk-ant-abc123");
        let scrubbed = redactor.scrub_string("key=sk-ant-abc123");
        assert_eq!(scrubbed, format!("key={MASK}"));
    }

    #[test]
    fn empty_value_is_never_tracked() {
        let redactor = Redactor::new();
        redactor.track("");
        assert_eq!(redactor.scrub_string("anything at all"), "anything at all");
    }

    #[test]
    fn clone_shares_tracked_set() {
        let redactor = Redactor::new();
        let clone = redactor.clone();
        redactor.track("shared-secret");
        assert!(clone.scrub_string("shared-secret").contains(MASK));
    }

    #[test]
    fn pattern_redacts_runtime_generated_value_never_tracked() {
        let redactor = Redactor::new();
        redactor.track_pattern("SECRET-[A-Z0-9]{8}").unwrap();
        let scrubbed = redactor.scrub_string("My secret is SECRET-ABC12345");
        assert_eq!(scrubbed, format!("My secret is {MASK}"));
    }

    #[test]
    fn invalid_pattern_is_rejected() {
        let redactor = Redactor::new();
        assert!(redactor.track_pattern("[").is_err());
    }

    #[test]
    fn clone_shares_tracked_patterns() {
        let redactor = Redactor::new();
        let clone = redactor.clone();
        redactor.track_pattern("sk-[0-9]+").unwrap();
        assert!(clone.scrub_string("key=sk-12345").contains(MASK));
    }
}
