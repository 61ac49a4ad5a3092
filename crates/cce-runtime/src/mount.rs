//! Deriving filesystem mount points from granted `fs` capabilities.

use std::path::{Path, PathBuf};

use cce_capability::Capability;
use tracing::warn;

/// One mount the sandbox should expose to the guest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mount {
    /// `read` or `write`, taken verbatim from the capability.
    pub op: String,
    /// Host directory to mount.
    pub host_path: PathBuf,
    /// Read-only iff `op == "read"`.
    pub read_only: bool,
}

/// Derive a host directory from an `fs:<op>:<pattern>` capability:
///
/// 1. Strip the `<op>:` prefix if present.
/// 2. If the remainder is exactly `/**` or `/*`, return `/`.
/// 3. If it ends in `/**` or `/*`, return the path with that suffix
///    removed.
/// 4. If the remainder is `/`, return `/`.
/// 5. Otherwise, treat it as a file pattern and return its parent
///    directory. A relative parent (`.`) resolves to the current
///    working directory, never `/`, with a warning logged. If the CWD
///    cannot be determined, return `None` and the caller skips this
///    mount.
#[must_use]
pub fn extract_mount_path(pattern: &str) -> Option<PathBuf> {
    let remainder = Capability::split_op(pattern).map_or(pattern, |(_, rest)| rest);

    if remainder == "/**" || remainder == "/*" {
        return Some(PathBuf::from("/"));
    }
    if let Some(stripped) = remainder.strip_suffix("/**").or_else(|| remainder.strip_suffix("/*")) {
        let stripped = if stripped.is_empty() { "/" } else { stripped };
        return Some(PathBuf::from(stripped));
    }
    if remainder == "/" {
        return Some(PathBuf::from("/"));
    }

    let parent = Path::new(remainder).parent().unwrap_or_else(|| Path::new("."));
    if parent == Path::new(".") || parent.as_os_str().is_empty() {
        return match std::env::current_dir() {
            Ok(cwd) => {
                warn!(pattern = %pattern, cwd = %cwd.display(), "relative fs pattern resolved against current working directory");
                Some(cwd)
            }
            Err(_) => None,
        };
    }
    Some(parent.to_path_buf())
}

/// Compute the deduplicated mount set for a grant's `fs` capabilities.
/// Distinct paths for the same operation are both mounted; a
/// `(op, host_path)` pair is mounted only once.
#[must_use]
pub fn mounts_for(fs_capabilities: &[Capability]) -> Vec<Mount> {
    let mut mounts: Vec<Mount> = Vec::new();
    for cap in fs_capabilities {
        let Some((op, _)) = Capability::split_op(&cap.pattern) else {
            continue;
        };
        let Some(host_path) = extract_mount_path(&cap.pattern) else {
            continue;
        };
        let read_only = op == "read";
        if mounts
            .iter()
            .any(|m| m.op == op && m.host_path == host_path)
        {
            continue;
        }
        mounts.push(Mount {
            op: op.to_string(),
            host_path,
            read_only,
        });
    }
    mounts
}
