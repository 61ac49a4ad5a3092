//! The capability value object: a `(kind, pattern)` permission token,
//! its risk classification, and the `IsBroad` predicate.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The four capability kinds a plugin can request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Kind {
    /// Filesystem access.
    Fs,
    /// Subprocess execution.
    Exec,
    /// Environment variable access.
    Env,
    /// Outbound network access.
    Network,
}

impl Kind {
    /// Parse a kind from its wire string. An empty or unrecognized
    /// string is invalid.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "fs" => Some(Self::Fs),
            "exec" => Some(Self::Exec),
            "env" => Some(Self::Env),
            "network" => Some(Self::Network),
            _ => None,
        }
    }

    /// The wire string for this kind.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Fs => "fs",
            Self::Exec => "exec",
            Self::Env => "env",
            Self::Network => "network",
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Risk classification used to decide whether the gatekeeper prompts,
/// denies, or allows silently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    /// Low risk: narrow, specific access.
    Low,
    /// Medium risk: network, exec, or read access under `/etc`.
    Medium,
    /// High risk: a broad capability (see [`Capability::is_broad`]).
    High,
}

/// A `(kind, pattern)` permission token. Immutable once constructed;
/// two capabilities are equal iff both fields match byte-for-byte.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Capability {
    /// The capability's kind.
    pub kind: Kind,
    /// A kind-specific pattern string.
    pub pattern: String,
}

const BROAD_FS_PATTERNS: &[&str] = &[
    "**",
    "/**",
    "read:**",
    "write:**",
    "read:/",
    "write:/",
    "read:/etc/**",
    "write:/etc/**",
    "read:/root/**",
    "write:/root/**",
    "read:/home/**",
    "write:/home/**",
];

const DANGEROUS_SHELLS: &[&str] = &["sh", "bash", "dash", "zsh", "ksh", "csh", "tcsh", "fish"];

const DANGEROUS_INTERPRETERS: &[&str] = &[
    "python", "perl", "ruby", "node", "nodejs", "php", "lua", "awk", "gawk", "mawk", "nawk",
    "tclsh", "wish", "expect", "irb",
];

impl Capability {
    /// Construct a new capability. Returns `None` if `kind` is empty
    /// or unrecognized.
    pub fn new(kind: &str, pattern: impl Into<String>) -> Option<Self> {
        Some(Self {
            kind: Kind::parse(kind)?,
            pattern: pattern.into(),
        })
    }

    /// Construct a capability from an already-parsed kind.
    #[must_use]
    pub fn of(kind: Kind, pattern: impl Into<String>) -> Self {
        Self {
            kind,
            pattern: pattern.into(),
        }
    }

    /// Split an `"<op>:<rest>"` pattern into its operation and remainder.
    /// Used by both the `fs` broad check and the mount-path extractor.
    #[must_use]
    pub fn split_op(pattern: &str) -> Option<(&str, &str)> {
        pattern.split_once(':')
    }

    /// Whether this capability's pattern confers excessive authority.
    #[must_use]
    pub fn is_broad(&self) -> bool {
        match self.kind {
            Kind::Fs => BROAD_FS_PATTERNS.contains(&self.pattern.as_str()),
            Kind::Exec => is_broad_exec(&self.pattern),
            Kind::Network => matches!(self.pattern.as_str(), "*" | "outbound:*"),
            Kind::Env => matches!(self.pattern.as_str(), "*" | "AWS_*" | "AZURE_*" | "GCP_*"),
        }
    }

    /// This capability's computed risk level.
    #[must_use]
    pub fn risk_level(&self) -> RiskLevel {
        if self.is_broad() {
            return RiskLevel::High;
        }
        match self.kind {
            Kind::Network | Kind::Exec => RiskLevel::Medium,
            Kind::Fs => {
                if let Some((op, path)) = Self::split_op(&self.pattern) {
                    if op == "read" && path.starts_with("/etc") {
                        return RiskLevel::Medium;
                    }
                }
                RiskLevel::Low
            }
            Kind::Env => RiskLevel::Low,
        }
    }

    /// A human-readable explanation of the risk this capability poses,
    /// used by the gatekeeper's interactive prompt.
    #[must_use]
    pub fn risk_description(&self) -> String {
        match self.kind {
            Kind::Fs => {
                if let Some((op, path)) = Self::split_op(&self.pattern) {
                    format!("{op} access to files matching '{path}'")
                } else {
                    format!("filesystem access matching '{}'", self.pattern)
                }
            }
            Kind::Exec => format!("execute '{}'", self.pattern),
            Kind::Env => format!("read environment variable(s) matching '{}'", self.pattern),
            Kind::Network => format!("open outbound network connections to '{}'", self.pattern),
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.pattern)
    }
}

/// Shell and interpreter detection for the `exec` broad check, shared
/// with the exec host function's invocation classifier.
fn is_broad_exec(pattern: &str) -> bool {
    if pattern == "**" || pattern == "*" {
        return true;
    }

    let basename = pattern
        .strip_prefix("/bin/")
        .or_else(|| pattern.strip_prefix("/usr/bin/"))
        .unwrap_or(pattern);
    if DANGEROUS_SHELLS.contains(&basename) {
        return true;
    }

    for base in DANGEROUS_INTERPRETERS {
        if let Some(rest) = pattern.strip_prefix(base)
            && rest
                .chars()
                .next()
                .is_none_or(|c| c.is_ascii_digit() || c == '.' || c == ':')
        {
            return true;
        }
    }

    false
}

/// Basename extraction shared with the exec host function's
/// classifier: strips any directory component, panic-free on any
/// input including empty strings or trailing slashes.
#[must_use]
pub fn basename(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_kind_rejected() {
        assert!(Capability::new("", "foo").is_none());
        assert!(Capability::new("bogus", "foo").is_none());
    }

    #[test]
    fn broad_fs_patterns() {
        assert!(Capability::of(Kind::Fs, "read:**").is_broad());
        assert!(Capability::of(Kind::Fs, "write:/etc/**").is_broad());
        assert!(!Capability::of(Kind::Fs, "read:/tmp/foo").is_broad());
    }

    #[test]
    fn broad_exec_shells_with_and_without_prefix() {
        assert!(Capability::of(Kind::Exec, "sh").is_broad());
        assert!(Capability::of(Kind::Exec, "/bin/bash").is_broad());
        assert!(Capability::of(Kind::Exec, "/usr/bin/zsh").is_broad());
        assert!(!Capability::of(Kind::Exec, "/opt/bin/bash").is_broad());
    }

    #[test]
    fn exec_interpreter_variants() {
        assert!(Capability::of(Kind::Exec, "python3").is_broad());
        assert!(Capability::of(Kind::Exec, "python3.11").is_broad());
        assert!(Capability::of(Kind::Exec, "python:/s.py").is_broad());
        assert!(!Capability::of(Kind::Exec, "python-config").is_broad());
        assert!(!Capability::of(Kind::Exec, "pythonista").is_broad());
        assert!(!Capability::of(Kind::Exec, "/usr/bin/python3.11").is_broad());
    }

    #[test]
    fn broad_network_and_env() {
        assert!(Capability::of(Kind::Network, "*").is_broad());
        assert!(Capability::of(Kind::Network, "outbound:*").is_broad());
        assert!(!Capability::of(Kind::Network, "outbound:443").is_broad());
        assert!(Capability::of(Kind::Env, "AWS_*").is_broad());
        assert!(!Capability::of(Kind::Env, "MY_APP_*").is_broad());
    }

    #[test]
    fn universal_invariant_broad_implies_high_risk() {
        let candidates = [
            Capability::of(Kind::Fs, "**"),
            Capability::of(Kind::Exec, "bash"),
            Capability::of(Kind::Network, "*"),
            Capability::of(Kind::Env, "AWS_*"),
            Capability::of(Kind::Fs, "read:/tmp/x"),
        ];
        for c in candidates {
            if c.is_broad() {
                assert_eq!(c.risk_level(), RiskLevel::High);
            }
        }
    }

    #[test]
    fn fs_read_etc_is_medium_risk_even_if_not_broad() {
        let cap = Capability::of(Kind::Fs, "read:/etc/passwd");
        assert!(!cap.is_broad());
        assert_eq!(cap.risk_level(), RiskLevel::Medium);
    }

    #[test]
    fn basename_extraction_is_panic_free() {
        assert_eq!(basename(""), "");
        assert_eq!(basename("/"), "");
        assert_eq!(basename("bash"), "bash");
        assert_eq!(basename("/usr/bin/bash"), "bash");
        assert_eq!(basename("a/b/c/"), "");
    }
}
