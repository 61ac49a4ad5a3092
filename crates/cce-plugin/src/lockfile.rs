//! `Lockfile`: pins each profile-declared plugin to a resolved,
//! verifiable source.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::digest::Digest;
use crate::error::{Error, Result};
use crate::reference::PluginReference;

/// One plugin's resolution record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockEntry {
    /// The reference string as declared in the profile.
    pub requested: String,
    /// The reference string actually resolved (may differ, e.g. a
    /// `latest` tag resolving to a concrete version).
    pub resolved: String,
    /// Which resolver in the chain served this entry
    /// (`embedded` | `cache` | `registry`).
    pub source: String,
    /// The resolved artifact's digest.
    pub digest: Digest,
    /// When this entry was last (re)resolved.
    pub fetched_at: DateTime<Utc>,
}

/// Map from plugin name to its lock entry. Invariant: after a
/// successful resolution pass, every profile-declared plugin has an
/// entry.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Lockfile {
    plugins: BTreeMap<String, LockEntry>,
}

impl Lockfile {
    /// An empty lockfile.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record (or overwrite) the resolution entry for `name`.
    pub fn record(
        &mut self,
        name: impl Into<String>,
        requested: &PluginReference,
        resolved: &PluginReference,
        source: impl Into<String>,
        digest: Digest,
        fetched_at: DateTime<Utc>,
    ) {
        self.plugins.insert(
            name.into(),
            LockEntry {
                requested: requested.to_string(),
                resolved: resolved.to_string(),
                source: source.into(),
                digest,
                fetched_at,
            },
        );
    }

    /// Look up the entry for `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&LockEntry> {
        self.plugins.get(name)
    }

    /// Verify that every name in `declared` has an entry. Returns the
    /// names missing, if any.
    #[must_use]
    pub fn missing<'a>(&self, declared: impl IntoIterator<Item = &'a str>) -> Vec<&'a str> {
        declared.into_iter().filter(|name| !self.plugins.contains_key(*name)).collect()
    }

    /// Enforce the "every declared plugin has an entry" invariant,
    /// returning an error naming the first missing plugin.
    pub fn require_complete<'a>(&self, declared: impl IntoIterator<Item = &'a str>) -> Result<()> {
        let missing = self.missing(declared);
        if let Some(name) = missing.first() {
            return Err(Error::lockfile(format!(
                "plugin '{name}' has no lockfile entry after resolution"
            )));
        }
        Ok(())
    }

    /// Iterate all entries.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &LockEntry)> {
        self.plugins.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reference(s: &str) -> PluginReference {
        PluginReference::parse(s).unwrap()
    }

    #[test]
    fn complete_after_recording_all_declared() {
        let mut lock = Lockfile::new();
        lock.record(
            "file",
            &reference("file"),
            &reference("file@1.0.0"),
            "embedded",
            Digest::unknown(),
            Utc::now(),
        );
        assert!(lock.require_complete(["file"]).is_ok());
        assert!(lock.require_complete(["file", "http"]).is_err());
    }

    #[test]
    fn get_returns_recorded_entry() {
        let mut lock = Lockfile::new();
        lock.record(
            "file",
            &reference("file"),
            &reference("file@1.0.0"),
            "cache",
            Digest::sha256_of(b"x"),
            Utc::now(),
        );
        let entry = lock.get("file").unwrap();
        assert_eq!(entry.source, "cache");
        assert_eq!(entry.resolved, "file@1.0.0");
    }
}
