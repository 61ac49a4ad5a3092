//! `PluginReference`: the parsed form of a plugin locator string.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Error, Result};

/// A parsed plugin locator. A reference is **embedded** if every
/// locator field (`registry`, `org`, `repo`) is empty and only `name`
/// is set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginReference {
    /// Registry host, empty for embedded/default-registry references.
    #[serde(default)]
    pub registry: String,
    /// Organization or namespace, empty for embedded references.
    #[serde(default)]
    pub org: String,
    /// Repository name, empty for embedded references.
    #[serde(default)]
    pub repo: String,
    /// Plugin name. Always set.
    pub name: String,
    /// Version constraint or pin, empty if unspecified.
    #[serde(default)]
    pub version: String,
}

impl PluginReference {
    /// Whether this reference is embedded (built into the binary).
    #[must_use]
    pub fn is_embedded(&self) -> bool {
        self.registry.is_empty() && self.org.is_empty() && self.repo.is_empty()
    }

    /// Parse `version` as a semantic version, if it's set and
    /// well-formed. A non-semver version string (a tag like `latest`,
    /// for instance) is not an error here — callers that need a
    /// strict pin should check for `None`.
    #[must_use]
    pub fn semantic_version(&self) -> Option<semver::Version> {
        if self.version.is_empty() {
            return None;
        }
        semver::Version::parse(&self.version).ok()
    }

    /// Parse a reference string. Accepted forms:
    /// - `name` — embedded or default-registry, no version.
    /// - `name@version` — embedded or default-registry, pinned.
    /// - `reg/org/repo:version` — fully qualified, pinned.
    /// - `reg/org/repo` — fully qualified, no version.
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() {
            return Err(Error::invalid_reference(s));
        }

        if s.contains('/') {
            let (locator, version) = match s.split_once(':') {
                Some((l, v)) => (l, v.to_string()),
                None => (s, String::new()),
            };
            let parts: Vec<&str> = locator.split('/').collect();
            let [registry, org, repo] = parts.as_slice() else {
                return Err(Error::invalid_reference(s));
            };
            if registry.is_empty() || org.is_empty() || repo.is_empty() {
                return Err(Error::invalid_reference(s));
            }
            return Ok(Self {
                registry: (*registry).to_string(),
                org: (*org).to_string(),
                repo: (*repo).to_string(),
                name: (*repo).to_string(),
                version,
            });
        }

        let (name, version) = match s.split_once('@') {
            Some((n, v)) => (n, v.to_string()),
            None => (s, String::new()),
        };
        if name.is_empty() {
            return Err(Error::invalid_reference(s));
        }
        Ok(Self {
            registry: String::new(),
            org: String::new(),
            repo: String::new(),
            name: name.to_string(),
            version,
        })
    }
}

impl fmt::Display for PluginReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_embedded() {
            if self.version.is_empty() {
                write!(f, "{}", self.name)
            } else {
                write!(f, "{}@{}", self.name, self.version)
            }
        } else if self.version.is_empty() {
            write!(f, "{}/{}/{}", self.registry, self.org, self.repo)
        } else {
            write!(f, "{}/{}/{}:{}", self.registry, self.org, self.repo, self.version)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_name_is_embedded() {
        let r = PluginReference::parse("file").unwrap();
        assert!(r.is_embedded());
        assert_eq!(r.name, "file");
        assert_eq!(r.version, "");
    }

    #[test]
    fn name_at_version() {
        let r = PluginReference::parse("file@1.2.3").unwrap();
        assert!(r.is_embedded());
        assert_eq!(r.version, "1.2.3");
    }

    #[test]
    fn fully_qualified_with_version() {
        let r = PluginReference::parse("registry.example.com/acme/widgets:2.0.0").unwrap();
        assert!(!r.is_embedded());
        assert_eq!(r.registry, "registry.example.com");
        assert_eq!(r.org, "acme");
        assert_eq!(r.repo, "widgets");
        assert_eq!(r.name, "widgets");
        assert_eq!(r.version, "2.0.0");
    }

    #[test]
    fn fully_qualified_without_version() {
        let r = PluginReference::parse("registry.example.com/acme/widgets").unwrap();
        assert_eq!(r.version, "");
    }

    #[test]
    fn empty_and_malformed_rejected() {
        assert!(PluginReference::parse("").is_err());
        assert!(PluginReference::parse("a/b").is_err());
        assert!(PluginReference::parse("a//c").is_err());
    }

    #[test]
    fn semantic_version_parses_well_formed_semver_only() {
        let r = PluginReference::parse("file@1.2.3").unwrap();
        assert_eq!(r.semantic_version().unwrap().to_string(), "1.2.3");
        let r = PluginReference::parse("file@latest").unwrap();
        assert!(r.semantic_version().is_none());
        let r = PluginReference::parse("file").unwrap();
        assert!(r.semantic_version().is_none());
    }

    #[test]
    fn display_round_trips() {
        let r = PluginReference::parse("file@1.2.3").unwrap();
        assert_eq!(r.to_string(), "file@1.2.3");
        let r = PluginReference::parse("reg/org/repo:9").unwrap();
        assert_eq!(r.to_string(), "reg/org/repo:9");
    }
}
