//! Content-addressed local plugin cache.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

use crate::digest::Digest;
use crate::error::{Error, Result};
use crate::reference::PluginReference;

/// A content-addressed store of fetched plugin bytecode, backed by a
/// directory on disk. Bytecode is stored under `objects/<digest>`; a
/// JSON index maps `reference.to_string()` to the digest that
/// satisfied the most recent fetch of that reference.
pub struct CacheRepository {
    root: PathBuf,
}

impl CacheRepository {
    /// Open (without yet creating) a cache rooted at `root`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn objects_dir(&self) -> PathBuf {
        self.root.join("objects")
    }

    fn index_path(&self) -> PathBuf {
        self.root.join("index.json")
    }

    fn load_index(&self) -> Result<HashMap<String, Digest>> {
        match fs::read(self.index_path()) {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .map_err(|e| Error::cache(format!("parsing cache index: {e}"))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(HashMap::new()),
            Err(e) => Err(Error::cache(format!("reading cache index: {e}"))),
        }
    }

    fn save_index(&self, index: &HashMap<String, Digest>) -> Result<()> {
        fs::create_dir_all(&self.root)
            .map_err(|e| Error::cache(format!("creating {}: {e}", self.root.display())))?;
        let bytes = serde_json::to_vec_pretty(index)
            .map_err(|e| Error::cache(format!("serializing cache index: {e}")))?;
        fs::write(self.index_path(), bytes)
            .map_err(|e| Error::cache(format!("writing cache index: {e}")))
    }

    /// Look up the bytecode most recently cached for `reference`.
    /// Returns `None` on a miss; never fails for a plain miss.
    pub fn get(&self, reference: &PluginReference) -> Result<Option<(Digest, Vec<u8>)>> {
        let index = self.load_index()?;
        let Some(digest) = index.get(&reference.to_string()) else {
            return Ok(None);
        };
        let object_path = self.objects_dir().join(&digest.value);
        match fs::read(&object_path) {
            Ok(bytes) => Ok(Some((digest.clone(), bytes))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::cache(format!("reading {}: {e}", object_path.display()))),
        }
    }

    /// Store `bytes` under its digest and record `reference` as
    /// pointing at it.
    pub fn put(&self, reference: &PluginReference, digest: &Digest, bytes: &[u8]) -> Result<()> {
        let objects_dir = self.objects_dir();
        fs::create_dir_all(&objects_dir)
            .map_err(|e| Error::cache(format!("creating {}: {e}", objects_dir.display())))?;
        fs::write(objects_dir.join(&digest.value), bytes)
            .map_err(|e| Error::cache(format!("writing cache object: {e}")))?;

        let mut index = self.load_index()?;
        index.insert(reference.to_string(), digest.clone());
        self.save_index(&index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn miss_returns_none_without_error() {
        let dir = tempfile::tempdir().unwrap();
        let cache = CacheRepository::new(dir.path());
        let reference = PluginReference::parse("file").unwrap();
        assert!(cache.get(&reference).unwrap().is_none());
    }

    #[test]
    fn put_then_get_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let cache = CacheRepository::new(dir.path());
        let reference = PluginReference::parse("file@1.0.0").unwrap();
        let bytes = b"bytecode".to_vec();
        let digest = Digest::sha256_of(&bytes);
        cache.put(&reference, &digest, &bytes).unwrap();

        let (got_digest, got_bytes) = cache.get(&reference).unwrap().unwrap();
        assert_eq!(got_digest, digest);
        assert_eq!(got_bytes, bytes);
    }
}
