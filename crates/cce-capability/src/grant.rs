//! A `Grant` is the persisted, ordered collection of capabilities a
//! user has approved for a given plugin.

use serde::{Deserialize, Serialize};

use crate::capability::Capability;

/// The set of capabilities approved for one plugin. Capabilities are
/// kept in insertion order; duplicates (by `(kind, pattern)`) are
/// collapsed on insert.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Grant {
    capabilities: Vec<Capability>,
}

impl Grant {
    /// An empty grant.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a grant from an iterator of capabilities, deduplicating
    /// while preserving first-seen order.
    pub fn from_capabilities(caps: impl IntoIterator<Item = Capability>) -> Self {
        let mut grant = Self::new();
        for cap in caps {
            grant.insert(cap);
        }
        grant
    }

    /// Insert a capability if not already present. Returns `true` if
    /// it was newly added.
    pub fn insert(&mut self, cap: Capability) -> bool {
        if self.capabilities.contains(&cap) {
            return false;
        }
        self.capabilities.push(cap);
        true
    }

    /// Merge another grant's capabilities into this one.
    pub fn extend(&mut self, other: &Grant) {
        for cap in &other.capabilities {
            self.insert(cap.clone());
        }
    }

    /// Iterate the grant's capabilities in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Capability> {
        self.capabilities.iter()
    }

    /// Whether the grant has no capabilities.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.capabilities.is_empty()
    }

    /// Number of capabilities in the grant.
    #[must_use]
    pub fn len(&self) -> usize {
        self.capabilities.len()
    }

    /// Whether `cap` is present verbatim in this grant (exact
    /// `(kind, pattern)` match, not a policy match).
    #[must_use]
    pub fn contains(&self, cap: &Capability) -> bool {
        self.capabilities.contains(cap)
    }

    /// Whether any of `caps` is present verbatim in this grant.
    pub fn contains_any<'a>(&self, caps: impl IntoIterator<Item = &'a Capability>) -> bool {
        caps.into_iter().any(|cap| self.contains(cap))
    }

    /// Remove `cap` if present. Returns `true` if it was removed.
    pub fn remove(&mut self, cap: &Capability) -> bool {
        let before = self.capabilities.len();
        self.capabilities.retain(|c| c != cap);
        self.capabilities.len() != before
    }
}

impl FromIterator<Capability> for Grant {
    fn from_iter<T: IntoIterator<Item = Capability>>(iter: T) -> Self {
        Self::from_capabilities(iter)
    }
}

impl IntoIterator for Grant {
    type Item = Capability;
    type IntoIter = std::vec::IntoIter<Capability>;

    fn into_iter(self) -> Self::IntoIter {
        self.capabilities.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::Kind;

    #[test]
    fn insert_deduplicates() {
        let mut grant = Grant::new();
        assert!(grant.insert(Capability::of(Kind::Fs, "read:/tmp/a")));
        assert!(!grant.insert(Capability::of(Kind::Fs, "read:/tmp/a")));
        assert_eq!(grant.len(), 1);
    }

    #[test]
    fn extend_merges_without_duplicating() {
        let mut a = Grant::from_capabilities([Capability::of(Kind::Env, "HOME")]);
        let b = Grant::from_capabilities([
            Capability::of(Kind::Env, "HOME"),
            Capability::of(Kind::Env, "PATH"),
        ]);
        a.extend(&b);
        assert_eq!(a.len(), 2);
    }

    #[test]
    fn preserves_insertion_order() {
        let grant = Grant::from_capabilities([
            Capability::of(Kind::Env, "B"),
            Capability::of(Kind::Env, "A"),
        ]);
        let patterns: Vec<_> = grant.iter().map(|c| c.pattern.as_str()).collect();
        assert_eq!(patterns, vec!["B", "A"]);
    }
}
