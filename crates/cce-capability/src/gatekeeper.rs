//! The Gatekeeper mediates between a plugin's required capabilities
//! and what the user (or an automated `--trust` flag) actually grants.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::capability::Capability;
use crate::error::{Error, Result};
use crate::grant::Grant;

/// Metadata accompanying a capability when it is presented for
/// approval.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapabilityInfo {
    /// The capability under consideration.
    pub capability: Capability,
    /// Name of the plugin that requires it.
    pub plugin_name: String,
    /// Whether this came from a profile-specific observation config
    /// rather than the plugin's own declared capabilities.
    pub is_profile_based: bool,
    /// Whether [`Capability::is_broad`] holds for this capability.
    pub is_broad: bool,
    /// A narrower profile-specific alternative, if one exists, shown
    /// to the user as a suggestion when falling back to declared caps.
    pub profile_specific: Option<Capability>,
}

/// The security posture applied while reconciling required
/// capabilities against what is actually granted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SecurityLevel {
    /// Broad capabilities are denied outright; everything else prompts.
    Strict,
    /// Broad capabilities prompt with an explicit risk explanation;
    /// everything else prompts too.
    Standard,
    /// Every capability is allowed silently.
    Permissive,
}

impl Default for SecurityLevel {
    fn default() -> Self {
        Self::Standard
    }
}

impl FromStr for SecurityLevel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "strict" => Ok(Self::Strict),
            "standard" => Ok(Self::Standard),
            "permissive" => Ok(Self::Permissive),
            other => Err(Error::store(format!("unknown security level '{other}'"))),
        }
    }
}

/// A single decision offered to the user for one missing capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptDecision {
    /// Grant for this session only.
    YesSession,
    /// Grant and persist to the store.
    AlwaysPersist,
    /// Deny.
    No,
}

/// Abstracts how a missing capability is presented to an operator.
/// Separated from [`Gatekeeper`] so tests and non-interactive
/// front-ends can supply a canned or auto-denying implementation.
pub trait Prompter: Send + Sync {
    /// Ask whether `info` should be granted. Only called when the
    /// process is interactive.
    fn prompt(&self, info: &CapabilityInfo) -> PromptDecision;
}

/// Always denies; used as a safe default when no interactive
/// front-end is wired up.
pub struct DenyAllPrompter;

impl Prompter for DenyAllPrompter {
    fn prompt(&self, _info: &CapabilityInfo) -> PromptDecision {
        PromptDecision::No
    }
}

/// Whether the current process has an interactive session available.
/// Grounded in a plain TTY check; front-ends may override by
/// constructing the gatekeeper with `interactive` forced.
#[must_use]
pub fn is_interactive() -> bool {
    use std::io::IsTerminal;
    std::io::stdin().is_terminal() && std::io::stdout().is_terminal()
}

/// Mediates capability requests against a security level, a
/// persisted grant store, and (when interactive) a [`Prompter`].
pub struct Gatekeeper<P: Prompter> {
    level: SecurityLevel,
    interactive: bool,
    prompter: P,
}

impl<P: Prompter> Gatekeeper<P> {
    /// Construct a gatekeeper with an explicit interactivity flag
    /// (bypassing the TTY probe, for tests).
    pub fn with_interactivity(level: SecurityLevel, interactive: bool, prompter: P) -> Self {
        Self {
            level,
            interactive,
            prompter,
        }
    }

    /// Construct a gatekeeper that probes the real process for
    /// interactivity.
    pub fn new(level: SecurityLevel, prompter: P) -> Self {
        Self::with_interactivity(level, is_interactive(), prompter)
    }

    /// Reconcile `required` against `persisted`, the previously-saved
    /// grant. Returns the resulting grant (persisted ∪ newly-approved),
    /// and a flag indicating whether the store should be rewritten.
    ///
    /// If `trust_all` is set, every required capability is granted
    /// without consulting the store, the policy table, or the user.
    pub fn resolve(
        &self,
        required: &[CapabilityInfo],
        persisted: &Grant,
        trust_all: bool,
    ) -> Result<(Grant, bool)> {
        if trust_all {
            let grant = Grant::from_capabilities(required.iter().map(|i| i.capability.clone()));
            return Ok((grant, false));
        }

        let missing: Vec<&CapabilityInfo> = required
            .iter()
            .filter(|info| !persisted.contains(&info.capability))
            .collect();

        if missing.is_empty() {
            return Ok((persisted.clone(), false));
        }

        if !self.interactive {
            let list = missing
                .iter()
                .map(|i| format!("  - {} (plugin: {})", i.capability, i.plugin_name))
                .collect::<Vec<_>>()
                .join("\n");
            return Err(Error::non_interactive_missing(format!(
                "missing capabilities and no interactive session is available; re-run with \
                 --trust, or grant interactively from a terminal:\n{list}"
            )));
        }

        let mut grant = persisted.clone();
        let mut dirty = false;

        for info in missing {
            match self.decide(info)? {
                Some(decision) => {
                    if decision == PromptDecision::No {
                        return Err(Error::denied(format!(
                            "user denied {} for plugin '{}'",
                            info.capability, info.plugin_name
                        )));
                    }
                    grant.insert(info.capability.clone());
                    if decision == PromptDecision::AlwaysPersist {
                        dirty = true;
                    }
                }
                None => {
                    return Err(Error::denied(format!(
                        "capability {} for plugin '{}' denied by strict security policy",
                        info.capability, info.plugin_name
                    )));
                }
            }
        }

        Ok((grant, dirty))
    }

    /// Apply the security-level policy table to one capability. Returns
    /// `None` when the level auto-denies without prompting (strict +
    /// broad); otherwise prompts (unless permissive, which
    /// auto-approves for-session).
    fn decide(&self, info: &CapabilityInfo) -> Result<Option<PromptDecision>> {
        match (self.level, info.is_broad) {
            (SecurityLevel::Strict, true) => Ok(None),
            (SecurityLevel::Permissive, _) => Ok(Some(PromptDecision::YesSession)),
            (SecurityLevel::Strict, false) | (SecurityLevel::Standard, _) => {
                info!(
                    plugin = %info.plugin_name,
                    capability = %info.capability,
                    broad = info.is_broad,
                    "prompting for capability grant"
                );
                Ok(Some(self.prompter.prompt(info)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::Kind;

    struct CannedPrompter(PromptDecision);

    impl Prompter for CannedPrompter {
        fn prompt(&self, _info: &CapabilityInfo) -> PromptDecision {
            self.0
        }
    }

    fn info(kind: Kind, pattern: &str, broad: bool) -> CapabilityInfo {
        CapabilityInfo {
            capability: Capability::of(kind, pattern),
            plugin_name: "plugin".to_string(),
            is_profile_based: false,
            is_broad: broad,
            profile_specific: None,
        }
    }

    #[test]
    fn trust_all_shortcut_grants_everything() {
        let gate = Gatekeeper::with_interactivity(SecurityLevel::Strict, false, DenyAllPrompter);
        let required = vec![info(Kind::Fs, "read:**", true)];
        let (grant, dirty) = gate.resolve(&required, &Grant::new(), true).unwrap();
        assert_eq!(grant.len(), 1);
        assert!(!dirty);
    }

    #[test]
    fn strict_denies_broad_without_prompting() {
        let gate = Gatekeeper::with_interactivity(SecurityLevel::Strict, true, CannedPrompter(PromptDecision::YesSession));
        let required = vec![info(Kind::Fs, "read:**", true)];
        let err = gate.resolve(&required, &Grant::new(), false).unwrap_err();
        assert!(matches!(err, Error::Denied(_)));
    }

    #[test]
    fn strict_prompts_for_non_broad() {
        let gate = Gatekeeper::with_interactivity(SecurityLevel::Strict, true, CannedPrompter(PromptDecision::YesSession));
        let required = vec![info(Kind::Fs, "read:/tmp/a", false)];
        let (grant, _) = gate.resolve(&required, &Grant::new(), false).unwrap();
        assert_eq!(grant.len(), 1);
    }

    #[test]
    fn permissive_allows_silently() {
        let gate = Gatekeeper::with_interactivity(SecurityLevel::Permissive, false, DenyAllPrompter);
        let required = vec![info(Kind::Network, "*", true)];
        let (grant, _) = gate.resolve(&required, &Grant::new(), false).unwrap();
        assert_eq!(grant.len(), 1);
    }

    #[test]
    fn non_interactive_with_missing_fails_helpfully() {
        let gate = Gatekeeper::with_interactivity(SecurityLevel::Standard, false, DenyAllPrompter);
        let required = vec![info(Kind::Env, "HOME", false)];
        let err = gate.resolve(&required, &Grant::new(), false).unwrap_err();
        assert!(matches!(err, Error::NonInteractiveMissing(_)));
    }

    #[test]
    fn already_persisted_capabilities_skip_prompting() {
        let gate = Gatekeeper::with_interactivity(SecurityLevel::Strict, false, DenyAllPrompter);
        let cap = Capability::of(Kind::Env, "HOME");
        let persisted = Grant::from_capabilities([cap.clone()]);
        let required = vec![CapabilityInfo {
            capability: cap,
            plugin_name: "plugin".to_string(),
            is_profile_based: false,
            is_broad: false,
            profile_specific: None,
        }];
        let (grant, dirty) = gate.resolve(&required, &persisted, false).unwrap();
        assert_eq!(grant.len(), 1);
        assert!(!dirty);
    }

    #[test]
    fn user_denial_yields_capability_denied() {
        let gate = Gatekeeper::with_interactivity(SecurityLevel::Standard, true, CannedPrompter(PromptDecision::No));
        let required = vec![info(Kind::Exec, "rg", false)];
        let err = gate.resolve(&required, &Grant::new(), false).unwrap_err();
        assert!(matches!(err, Error::Denied(_)));
    }

    #[test]
    fn always_persist_sets_dirty_flag() {
        let gate = Gatekeeper::with_interactivity(SecurityLevel::Standard, true, CannedPrompter(PromptDecision::AlwaysPersist));
        let required = vec![info(Kind::Exec, "rg", false)];
        let (_, dirty) = gate.resolve(&required, &Grant::new(), false).unwrap();
        assert!(dirty);
    }
}
