//! A resolver over a local plugin directory: reads bytecode straight
//! off disk rather than from the embedded/cache/registry chain. Not
//! part of `cce_plugin::ResolverChain` itself since it's specific to
//! this engine's notion of "a directory the caller pointed us at",
//! not a generic resolution source — consulted as the last resort
//! after the standard chain reports a plugin unresolvable.

use std::path::{Path, PathBuf};

use cce_plugin::resolver::{ResolvedPlugin, Resolver};
use cce_plugin::{Digest, PluginReference, Result};

/// Resolves a reference by reading `<dir>/<name>/<name>.bytecode`.
pub struct LocalDirResolver {
    dir: PathBuf,
}

impl LocalDirResolver {
    /// Build a resolver rooted at `dir`.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn bytecode_path(&self, name: &str) -> PathBuf {
        self.dir.join(name).join(format!("{name}.bytecode"))
    }

    /// Whether `name` is resolvable from this directory without
    /// actually reading the bytecode.
    #[must_use]
    pub fn has(&self, name: &str) -> bool {
        self.bytecode_path(name).is_file()
    }
}

impl Resolver for LocalDirResolver {
    fn resolve(&self, reference: &PluginReference) -> Result<Option<ResolvedPlugin>> {
        let path = self.bytecode_path(&reference.name);
        if !path.is_file() {
            return Ok(None);
        }
        let bytecode = std::fs::read(&path)
            .map_err(|e| cce_plugin::Error::cache(format!("reading {}: {e}", path.display())))?;
        Ok(Some(ResolvedPlugin {
            reference: reference.clone(),
            digest: Digest::sha256_of(&bytecode),
            bytecode,
            source: "local",
        }))
    }
}

#[must_use]
pub fn exists_under(dir: &Path, name: &str) -> bool {
    LocalDirResolver::new(dir.to_path_buf()).has(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_plugin_present_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let plugin_dir = dir.path().join("file");
        std::fs::create_dir_all(&plugin_dir).unwrap();
        std::fs::write(plugin_dir.join("file.bytecode"), b"\0asm").unwrap();

        let resolver = LocalDirResolver::new(dir.path());
        let reference = PluginReference::parse("file").unwrap();
        let resolved = resolver.resolve(&reference).unwrap().unwrap();
        assert_eq!(resolved.source, "local");
        assert_eq!(resolved.bytecode, b"\0asm");
    }

    #[test]
    fn missing_plugin_delegates() {
        let dir = tempfile::tempdir().unwrap();
        let resolver = LocalDirResolver::new(dir.path());
        let reference = PluginReference::parse("missing").unwrap();
        assert!(resolver.resolve(&reference).unwrap().is_none());
    }
}
