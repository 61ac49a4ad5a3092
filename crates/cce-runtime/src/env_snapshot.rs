//! A frozen snapshot of the host process environment, taken once at
//! runtime creation and never refreshed.

use std::collections::BTreeMap;

use cce_capability::{is_granted, Capability, Grant, Kind};

/// The process environment as it existed when the sandbox runtime was
/// created. This is the only source the sandbox consults for
/// per-plugin environment injection — plugins never see live changes
/// to the host's environment after this snapshot is taken.
#[derive(Debug, Clone)]
pub struct FrozenEnvironment {
    vars: BTreeMap<String, String>,
}

impl FrozenEnvironment {
    /// Take a snapshot of the current process environment.
    #[must_use]
    pub fn capture() -> Self {
        Self {
            vars: std::env::vars().collect(),
        }
    }

    /// Build a snapshot from an explicit map, for tests.
    #[must_use]
    pub fn from_map(vars: BTreeMap<String, String>) -> Self {
        Self { vars }
    }

    /// The subset of the frozen snapshot that `grant` authorizes a
    /// plugin to see: every `key=value` pair where some granted `env`
    /// pattern matches `key`.
    #[must_use]
    pub fn inject_for(&self, grant: &Grant) -> BTreeMap<String, String> {
        self.vars
            .iter()
            .filter(|(key, _)| is_granted(grant, &Capability::of(Kind::Env, (*key).clone())))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot() -> FrozenEnvironment {
        let mut vars = BTreeMap::new();
        vars.insert("HOME".to_string(), "/home/user".to_string());
        vars.insert("AWS_SECRET_ACCESS_KEY".to_string(), "shh".to_string());
        vars.insert("PATH".to_string(), "/usr/bin".to_string());
        FrozenEnvironment::from_map(vars)
    }

    #[test]
    fn only_granted_keys_pass_through() {
        let grant = Grant::from_capabilities([Capability::of(Kind::Env, "HOME")]);
        let injected = snapshot().inject_for(&grant);
        assert_eq!(injected.len(), 1);
        assert_eq!(injected.get("HOME").unwrap(), "/home/user");
    }

    #[test]
    fn prefix_wildcard_grants_group_of_keys() {
        let grant = Grant::from_capabilities([Capability::of(Kind::Env, "AWS_*")]);
        let injected = snapshot().inject_for(&grant);
        assert_eq!(injected.len(), 1);
        assert!(injected.contains_key("AWS_SECRET_ACCESS_KEY"));
    }

    #[test]
    fn empty_grant_injects_nothing() {
        let injected = snapshot().inject_for(&Grant::new());
        assert!(injected.is_empty());
    }
}
