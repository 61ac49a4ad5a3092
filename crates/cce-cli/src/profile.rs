//! A YAML-backed [`ProfileReader`]: the concrete profile loader the
//! engine's specification leaves as an external collaborator. Parses
//! a version-tagged document straight into the core's own
//! `Control`/`PluginDeclaration` shapes via `serde`, with no
//! filter-expression compilation of its own — control selection is
//! left entirely to `cce_engine::ControlFilter`.

use std::path::{Path, PathBuf};

use cce_core::{Control, PluginDeclaration, ProfileReader};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

fn default_schema_version() -> u32 {
    1
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ProfileFile {
    #[serde(default = "default_schema_version")]
    schema_version: u32,
    /// Product name the lockfile is keyed under.
    product: String,
    #[serde(default)]
    plugins: Vec<PluginDeclaration>,
    #[serde(default)]
    controls: Vec<Control>,
}

/// A profile loaded from a single YAML file on disk.
pub struct YamlProfile {
    file: ProfileFile,
    path: PathBuf,
}

impl YamlProfile {
    /// Load and parse `path`. Rejects a `schema_version` newer than
    /// this binary understands rather than silently misreading it.
    pub fn load(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)
            .map_err(|e| Error::configuration(format!("reading profile '{}': {e}", path.display())))?;
        let file: ProfileFile = serde_yaml::from_slice(&bytes)
            .map_err(|e| Error::configuration(format!("parsing profile '{}': {e}", path.display())))?;
        if file.schema_version > default_schema_version() {
            return Err(Error::configuration(format!(
                "profile '{}' declares schema_version {}, which this build does not understand",
                path.display(),
                file.schema_version
            )));
        }
        Ok(Self { file, path: path.to_path_buf() })
    }

    /// Directory the profile file lives in, used to anchor the
    /// lockfile's conventional location.
    #[must_use]
    pub fn dir(&self) -> PathBuf {
        self.path.parent().map(Path::to_path_buf).unwrap_or_else(|| PathBuf::from("."))
    }

    /// The product name the lockfile is keyed under.
    #[must_use]
    pub fn product(&self) -> &str {
        &self.file.product
    }
}

impl ProfileReader for YamlProfile {
    fn get_plugins(&self) -> cce_core::Result<Vec<PluginDeclaration>> {
        Ok(self.file.plugins.clone())
    }

    fn get_all_controls(&self) -> cce_core::Result<Vec<Control>> {
        Ok(self.file.controls.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_a_minimal_profile() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("profile.yaml");
        std::fs::write(
            &path,
            r#"
schema_version: 1
product: demo
plugins:
  - name: file
controls:
  - id: c1
    name: check something
    observations:
      - plugin: file
        config: {}
"#,
        )
        .unwrap();

        let profile = YamlProfile::load(&path).unwrap();
        assert_eq!(profile.product(), "demo");
        assert_eq!(profile.get_plugins().unwrap().len(), 1);
        assert_eq!(profile.get_all_controls().unwrap().len(), 1);
    }

    #[test]
    fn future_schema_version_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("profile.yaml");
        std::fs::write(&path, "schema_version: 99\nproduct: demo\n").unwrap();
        assert!(YamlProfile::load(&path).is_err());
    }
}
