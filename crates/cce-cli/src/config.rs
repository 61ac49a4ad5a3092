//! Layered run configuration: CLI flags resolved against an optional
//! file and the OS-appropriate default paths, the way
//! `orbis-config::Config::from_cli` layers its own settings over a
//! file and environment variables.

use std::path::{Path, PathBuf};

use cce_capability::SecurityLevel;
use cce_engine::EngineConfig;
use cce_runtime::MemoryLimit;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;

use crate::cli::Cli;
use crate::error::{Error, Result};
use crate::logging::LogConfig;

/// Settings read from an optional `--config` file, layered beneath
/// whatever the CLI flags supply. Every field is optional so a
/// partial file only overrides what it mentions.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FileConfig {
    /// Default registry base URL for unresolved plugin references.
    #[serde(default)]
    pub registry_url: Option<String>,
    /// Regex patterns the redactor scrubs from plugin output and
    /// user-facing error messages.
    #[serde(default)]
    pub redaction_patterns: Vec<String>,
    /// Fallback security level, used when neither `--security-level`
    /// nor `CCE_SECURITY_LEVEL` is set.
    #[serde(default)]
    pub security_level: Option<String>,
    /// Fallback per-observation memory ceiling in megabytes, used when
    /// `--memory-limit-mb` is unset.
    #[serde(default)]
    pub wasm_memory_limit_mb: Option<u64>,
    /// Cap on the serialized size of a single observation's evidence
    /// `data` payload; oversized evidence is replaced with a
    /// truncation marker and `truncated=true`. Unset means unbounded.
    #[serde(default)]
    pub max_evidence_size_bytes: Option<u64>,
}

impl FileConfig {
    /// Load a file config from `path`, if given.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let bytes = std::fs::read(path)
            .map_err(|e| Error::configuration(format!("reading config '{}': {e}", path.display())))?;
        let parsed: Self = serde_yaml::from_slice(&bytes)
            .map_err(|e| Error::configuration(format!("parsing config '{}': {e}", path.display())))?;
        Ok(parsed)
    }
}

/// The fully-resolved settings for one invocation, assembled from CLI
/// flags, an optional file, and OS-appropriate config-directory
/// defaults.
pub struct Config {
    /// Path to the per-user capability grant store.
    pub capability_store_path: PathBuf,
    /// Security level governing capability reconciliation.
    pub security_level: SecurityLevel,
    /// Registry base URL, if one is configured.
    pub registry_url: Option<String>,
    /// Logging configuration.
    pub log: LogConfig,
    /// Tunables handed straight to the engine.
    pub engine: EngineConfig,
}

impl Config {
    /// Assemble the resolved configuration from parsed CLI flags.
    pub fn from_cli(cli: &Cli) -> Result<Self> {
        let file = FileConfig::load(cli.config.as_deref())?;

        let security_level_name = cli
            .security_level
            .clone()
            .or_else(|| file.security_level.clone())
            .unwrap_or_else(|| "standard".to_string());
        let security_level =
            SecurityLevel::from_str(&security_level_name).map_err(|e| Error::configuration(e.to_string()))?;

        let capability_store_path = match &cli.capability_store {
            Some(path) => path.clone(),
            None => default_capability_store_path()?,
        };

        let memory_limit = match cli.memory_limit_mb.or(file.wasm_memory_limit_mb) {
            Some(mb) => MemoryLimit::Mb(mb),
            None => MemoryLimit::Unlimited,
        };

        let engine = EngineConfig {
            plugin_dir_override: cli.plugin_dir.clone(),
            product: String::new(),
            lockfile_override: cli.lockfile.clone(),
            memory_limit,
            time_limit: Duration::from_secs(cli.time_limit_secs),
            max_calls: cli.max_calls,
            fuel: cli.fuel,
            trust_all: cli.trust,
            dry_run: cli.dry_run,
            max_concurrent_observations: cli.max_concurrent_observations,
            max_concurrent_controls: cli.max_concurrent_controls,
            filters: cli.filters.clone(),
            redaction_patterns: file.redaction_patterns.clone(),
            max_evidence_size_bytes: file.max_evidence_size_bytes,
        };

        Ok(Self {
            capability_store_path,
            security_level,
            registry_url: file.registry_url,
            log: LogConfig::from_cli(cli),
            engine,
        })
    }
}

/// `~/.config/cce/capabilities.yaml` on Linux, and the platform
/// equivalent elsewhere — mirrors `CapabilityStore::user_default`'s
/// own resolution so a CLI-level override and the library default
/// never disagree about where "the" store lives.
fn default_capability_store_path() -> Result<PathBuf> {
    let dirs = ProjectDirs::from("", "", "cce")
        .ok_or_else(|| Error::configuration("could not determine a user config directory"))?;
    Ok(dirs.config_dir().join("capabilities.yaml"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_config_defaults_when_no_path_given() {
        let config = FileConfig::load(None).unwrap();
        assert!(config.registry_url.is_none());
        assert!(config.redaction_patterns.is_empty());
        assert!(config.security_level.is_none());
        assert!(config.wasm_memory_limit_mb.is_none());
        assert!(config.max_evidence_size_bytes.is_none());
    }
}
