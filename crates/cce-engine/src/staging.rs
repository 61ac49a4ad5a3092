//! Staging a runtime-plugin directory: every resolved plugin's
//! bytecode is copied (never symlinked) into its own subdirectory
//! under a fresh temporary root, so the sandbox never mounts a path
//! that could resolve outside of it.

use std::path::{Path, PathBuf};

use tempfile::TempDir;

use crate::error::{Error, Result};

/// A staged, temporary directory of plugin bytecode. Removed when
/// dropped.
pub struct StagedPlugins {
    root: TempDir,
}

impl StagedPlugins {
    /// Stage every `(name, bytecode)` pair into `name/name.bytecode`
    /// under a fresh temporary directory.
    pub fn stage<'a>(plugins: impl IntoIterator<Item = (&'a str, &'a [u8])>) -> Result<Self> {
        let root = tempfile::tempdir()
            .map_err(|e| Error::configuration(format!("creating staging directory: {e}")))?;

        for (name, bytecode) in plugins {
            let plugin_dir = root.path().join(name);
            std::fs::create_dir_all(&plugin_dir)
                .map_err(|e| Error::configuration(format!("staging plugin '{name}': {e}")))?;
            let target = plugin_dir.join(format!("{name}.bytecode"));
            std::fs::write(&target, bytecode)
                .map_err(|e| Error::configuration(format!("staging plugin '{name}': {e}")))?;
        }

        Ok(Self { root })
    }

    /// The staged directory's root path.
    #[must_use]
    pub fn path(&self) -> &Path {
        self.root.path()
    }

    /// The bytecode path for a staged plugin, if it was staged.
    #[must_use]
    pub fn bytecode_path(&self, name: &str) -> PathBuf {
        self.root.path().join(name).join(format!("{name}.bytecode"))
    }

    /// Read a staged plugin's bytecode back off disk.
    pub fn read(&self, name: &str) -> Result<Vec<u8>> {
        let path = self.bytecode_path(name);
        std::fs::read(&path)
            .map_err(|e| Error::execution(format!("reading staged plugin '{name}': {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn staged_plugin_round_trips() {
        let staged = StagedPlugins::stage([("file", b"\0asm".as_slice())]).unwrap();
        assert_eq!(staged.read("file").unwrap(), b"\0asm");
        assert!(staged.bytecode_path("file").exists());
    }

    #[test]
    fn staged_directory_is_named_after_the_plugin() {
        let staged = StagedPlugins::stage([("http", b"bytecode".as_slice())]).unwrap();
        assert!(staged.path().join("http").is_dir());
    }

    #[test]
    fn reading_an_unstaged_plugin_is_an_error() {
        let staged = StagedPlugins::stage(std::iter::empty()).unwrap();
        assert!(staged.read("missing").is_err());
    }
}
