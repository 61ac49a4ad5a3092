//! Resolving the local plugin directory: CLI override, then
//! auto-detected current working directory, then a directory relative
//! to the running executable.

use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

const PLUGIN_DIR_NAME: &str = "plugins";

/// Resolve the directory holding locally available plugin bytecode.
///
/// 1. `override_dir`, if given, is used verbatim and must exist.
/// 2. Otherwise, `<cwd>/plugins` is used if it exists.
/// 3. Otherwise, `<executable-dir>/plugins` is used if it exists.
/// 4. If none exist and `allow_empty` is true (no external plugins
///    are declared by the profile), `None` is returned. Otherwise
///    this is a configuration error.
pub fn resolve(override_dir: Option<&Path>, allow_empty: bool) -> Result<Option<PathBuf>> {
    if let Some(dir) = override_dir {
        return if dir.is_dir() {
            Ok(Some(dir.to_path_buf()))
        } else {
            Err(Error::configuration(format!(
                "plugin directory override '{}' does not exist",
                dir.display()
            )))
        };
    }

    if let Ok(cwd) = std::env::current_dir() {
        let candidate = cwd.join(PLUGIN_DIR_NAME);
        if candidate.is_dir() {
            return Ok(Some(candidate));
        }
    }

    if let Ok(exe) = std::env::current_exe()
        && let Some(exe_dir) = exe.parent()
    {
        let candidate = exe_dir.join(PLUGIN_DIR_NAME);
        if candidate.is_dir() {
            return Ok(Some(candidate));
        }
    }

    if allow_empty {
        Ok(None)
    } else {
        Err(Error::configuration(
            "no local plugin directory found and the profile declares external plugins",
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn override_dir_must_exist() {
        let missing = PathBuf::from("/nonexistent/definitely/not/real");
        assert!(resolve(Some(&missing), true).is_err());
    }

    #[test]
    fn override_dir_used_when_present() {
        let dir = tempfile::tempdir().unwrap();
        let resolved = resolve(Some(dir.path()), true).unwrap();
        assert_eq!(resolved.unwrap(), dir.path());
    }

    #[test]
    fn no_directory_found_with_allow_empty_returns_none() {
        let original = std::env::current_dir().unwrap();
        let scratch = tempfile::tempdir().unwrap();
        std::env::set_current_dir(scratch.path()).unwrap();
        let result = resolve(None, true);
        std::env::set_current_dir(original).unwrap();
        assert!(result.unwrap().is_none());
    }

    #[test]
    fn no_directory_found_without_allow_empty_is_an_error() {
        let original = std::env::current_dir().unwrap();
        let scratch = tempfile::tempdir().unwrap();
        std::env::set_current_dir(scratch.path()).unwrap();
        let result = resolve(None, false);
        std::env::set_current_dir(original).unwrap();
        assert!(result.is_err());
    }
}
