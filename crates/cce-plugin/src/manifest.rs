//! `PluginManifest`: the JSON document a plugin's `describe()` entry
//! point returns.

use serde::{Deserialize, Serialize};

use cce_capability::Capability;

/// One capability the plugin declares it may need, in wire form
/// (`{kind, pattern}`) before it is parsed into a [`Capability`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeclaredCapability {
    /// Capability kind as a string (`fs`, `exec`, `env`, `network`).
    pub kind: String,
    /// Kind-specific pattern.
    pub pattern: String,
}

/// The parsed result of a plugin's `describe()` call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginManifest {
    /// Plugin name.
    pub name: String,
    /// Plugin version.
    pub version: String,
    /// Human-readable description.
    #[serde(default)]
    pub description: String,
    /// Capabilities the plugin declares it may need.
    #[serde(default)]
    pub capabilities: Vec<DeclaredCapability>,
}

impl PluginManifest {
    /// Parse a manifest from the raw JSON bytes returned by
    /// `describe()`.
    pub fn from_json(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }

    /// Declared capabilities that parsed into valid [`Capability`]
    /// values. Entries with an unrecognized `kind` are silently
    /// dropped rather than failing the whole manifest — a single bad
    /// declaration should not block loading the rest.
    #[must_use]
    pub fn capabilities(&self) -> Vec<Capability> {
        self.capabilities
            .iter()
            .filter_map(|c| Capability::new(&c.kind, c.pattern.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_well_formed_describe_output() {
        let json = br#"{
            "name": "file",
            "version": "1.0.0",
            "description": "reads a file",
            "capabilities": [{"kind": "fs", "pattern": "read:/tmp/*"}]
        }"#;
        let manifest = PluginManifest::from_json(json).unwrap();
        assert_eq!(manifest.name, "file");
        assert_eq!(manifest.capabilities().len(), 1);
    }

    #[test]
    fn unknown_capability_kind_is_dropped_not_fatal() {
        let json = br#"{
            "name": "file",
            "version": "1.0.0",
            "capabilities": [{"kind": "bogus", "pattern": "x"}]
        }"#;
        let manifest = PluginManifest::from_json(json).unwrap();
        assert!(manifest.capabilities().is_empty());
    }

    #[test]
    fn missing_required_field_is_a_parse_error() {
        let json = br#"{"version": "1.0.0"}"#;
        assert!(PluginManifest::from_json(json).is_err());
    }
}
