//! Persists a [`Lockfile`] as version-tagged YAML next to a profile,
//! following the same schema-versioning pattern the per-user
//! capability store uses.

use std::fs;
use std::path::{Path, PathBuf};

use cce_plugin::Lockfile;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LockFile {
    #[serde(default = "default_schema_version")]
    schema_version: u32,
    #[serde(default)]
    lockfile: Lockfile,
}

fn default_schema_version() -> u32 {
    1
}

/// Reads and writes a [`Lockfile`] at `<profile-dir>/<product>.lock`.
pub struct LockfileStore {
    path: PathBuf,
}

impl LockfileStore {
    /// Build a store over an explicit path.
    #[must_use]
    pub fn at_path(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Build the conventional path next to a profile directory:
    /// `<profile_dir>/<product>.lock`.
    #[must_use]
    pub fn beside_profile(profile_dir: &Path, product: &str) -> Self {
        Self::at_path(profile_dir.join(format!("{product}.lock")))
    }

    /// The path this store reads from and writes to.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the persisted lockfile. Returns an empty lockfile when
    /// the file is absent.
    pub fn load(&self) -> Result<Lockfile> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Lockfile::new()),
            Err(e) => {
                return Err(Error::configuration(format!("reading {}: {e}", self.path.display())))
            }
        };
        let parsed: LockFile = serde_yaml::from_slice(&bytes)
            .map_err(|e| Error::configuration(format!("parsing {}: {e}", self.path.display())))?;
        Ok(parsed.lockfile)
    }

    /// Save `lockfile`, overwriting any existing content.
    pub fn save(&self, lockfile: &Lockfile) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| Error::configuration(format!("creating {}: {e}", parent.display())))?;
        }
        let file = LockFile {
            schema_version: default_schema_version(),
            lockfile: lockfile.clone(),
        };
        let yaml = serde_yaml::to_string(&file)
            .map_err(|e| Error::configuration(format!("serializing lockfile: {e}")))?;
        fs::write(&self.path, yaml)
            .map_err(|e| Error::configuration(format!("writing {}: {e}", self.path.display())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cce_plugin::{Digest, PluginReference};

    #[test]
    fn load_missing_file_returns_empty_lockfile() {
        let dir = tempfile::tempdir().unwrap();
        let store = LockfileStore::at_path(dir.path().join("nope.lock"));
        assert!(store.load().unwrap().missing(["file"]).contains(&"file"));
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = LockfileStore::beside_profile(dir.path(), "cce");
        let mut lockfile = Lockfile::new();
        lockfile.record(
            "file",
            &PluginReference::parse("file").unwrap(),
            &PluginReference::parse("file@1.0.0").unwrap(),
            "embedded",
            Digest::unknown(),
            cce_plugin::resolver::now(),
        );
        store.save(&lockfile).unwrap();
        let loaded = store.load().unwrap();
        assert_eq!(loaded.get("file").unwrap().source, "embedded");
    }

    #[test]
    fn malformed_yaml_is_a_parse_error_not_a_panic() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.lock");
        fs::write(&path, b"not: [valid, yaml: structure").unwrap();
        let store = LockfileStore::at_path(path);
        assert!(store.load().is_err());
    }
}
