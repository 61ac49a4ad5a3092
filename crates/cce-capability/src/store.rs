//! Persists a [`Grant`] as YAML in a per-user config file.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::grant::Grant;

/// On-disk schema for the capability store. Versioned so a future
/// format change can migrate rather than silently misparse.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoreFile {
    #[serde(default = "default_schema_version")]
    schema_version: u32,
    #[serde(default)]
    grant: Grant,
}

fn default_schema_version() -> u32 {
    1
}

/// Reads and writes a [`Grant`] to a fixed path on disk.
pub struct CapabilityStore {
    path: PathBuf,
}

impl CapabilityStore {
    /// Build a store over an explicit path, bypassing platform
    /// config-directory resolution (used by tests and CLI overrides).
    #[must_use]
    pub fn at_path(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Build a store at the platform-appropriate per-user config
    /// location (`~/.config/cce/capabilities.yaml` on Linux, and the
    /// platform equivalent elsewhere).
    pub fn user_default() -> Result<Self> {
        let dirs = ProjectDirs::from("", "", "cce")
            .ok_or_else(|| Error::store("could not determine a user config directory"))?;
        Ok(Self::at_path(dirs.config_dir().join("capabilities.yaml")))
    }

    /// The path this store reads from and writes to.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the persisted grant. Returns an empty grant when the file
    /// is absent. Never panics on malformed YAML; returns a parse
    /// error instead.
    pub fn load(&self) -> Result<Grant> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Grant::new()),
            Err(e) => return Err(Error::store(format!("reading {}: {e}", self.path.display()))),
        };
        let parsed: StoreFile = serde_yaml::from_slice(&bytes)
            .map_err(|e| Error::store(format!("parsing {}: {e}", self.path.display())))?;
        Ok(parsed.grant)
    }

    /// Save `grant`, creating parent directories with mode `0755` and
    /// writing the file with mode `0600`. Insertion order on disk
    /// matches the grant's iteration order.
    pub fn save(&self, grant: &Grant) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| Error::store(format!("creating {}: {e}", parent.display())))?;
            set_dir_permissions(parent, 0o755)?;
        }

        let file = StoreFile {
            schema_version: default_schema_version(),
            grant: grant.clone(),
        };
        let yaml = serde_yaml::to_string(&file)
            .map_err(|e| Error::store(format!("serializing capability grant: {e}")))?;

        write_with_permissions(&self.path, yaml.as_bytes(), 0o600)
    }
}

#[cfg(unix)]
fn set_dir_permissions(path: &Path, mode: u32) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(mode))
        .map_err(|e| Error::store(format!("setting permissions on {}: {e}", path.display())))
}

#[cfg(not(unix))]
fn set_dir_permissions(_path: &Path, _mode: u32) -> Result<()> {
    Ok(())
}

#[cfg(unix)]
fn write_with_permissions(path: &Path, bytes: &[u8], mode: u32) -> Result<()> {
    use std::os::unix::fs::OpenOptionsExt;
    let mut f = fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(mode)
        .open(path)
        .map_err(|e| Error::store(format!("opening {}: {e}", path.display())))?;
    f.write_all(bytes)
        .map_err(|e| Error::store(format!("writing {}: {e}", path.display())))?;
    // OpenOptions::mode only applies at creation time; force it on an
    // existing file too.
    fs::set_permissions(path, fs::Permissions::from_mode(mode))
        .map_err(|e| Error::store(format!("setting permissions on {}: {e}", path.display())))
}

#[cfg(not(unix))]
fn write_with_permissions(path: &Path, bytes: &[u8], _mode: u32) -> Result<()> {
    fs::write(path, bytes).map_err(|e| Error::store(format!("writing {}: {e}", path.display())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::{Capability, Kind};

    #[test]
    fn load_missing_file_returns_empty_grant() {
        let dir = tempfile::tempdir().unwrap();
        let store = CapabilityStore::at_path(dir.path().join("nope.yaml"));
        let grant = store.load().unwrap();
        assert!(grant.is_empty());
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = CapabilityStore::at_path(dir.path().join("sub").join("capabilities.yaml"));
        let grant = Grant::from_capabilities([
            Capability::of(Kind::Env, "HOME"),
            Capability::of(Kind::Fs, "read:/tmp/a"),
        ]);
        store.save(&grant).unwrap();
        let loaded = store.load().unwrap();
        assert_eq!(loaded.len(), grant.len());
    }

    #[test]
    fn malformed_yaml_is_a_parse_error_not_a_panic() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.yaml");
        fs::write(&path, b"not: [valid, yaml: structure").unwrap();
        let store = CapabilityStore::at_path(path);
        assert!(store.load().is_err());
    }

    #[cfg(unix)]
    #[test]
    fn save_sets_expected_permissions() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::tempdir().unwrap();
        let store = CapabilityStore::at_path(dir.path().join("nested").join("capabilities.yaml"));
        store.save(&Grant::new()).unwrap();

        let file_mode = fs::metadata(store.path()).unwrap().permissions().mode() & 0o777;
        assert_eq!(file_mode, 0o600);

        let dir_mode = fs::metadata(store.path().parent().unwrap())
            .unwrap()
            .permissions()
            .mode()
            & 0o777;
        assert_eq!(dir_mode, 0o755);
    }
}
