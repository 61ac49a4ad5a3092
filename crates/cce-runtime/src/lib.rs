//! Sandboxed plugin execution: a wasmtime-backed runtime that
//! instantiates compiled bytecode behind a granted capability set,
//! mediates every outbound effect through a fixed set of host
//! functions, and scrubs tracked secrets out of anything the plugin
//! surfaces.

pub mod env_snapshot;
pub mod error;
mod host;
pub mod mount;
pub mod redact;
pub mod sandbox;
pub mod wire;

pub use env_snapshot::FrozenEnvironment;
pub use error::{Error, Result};
pub use mount::{extract_mount_path, mounts_for, Mount};
pub use redact::Redactor;
pub use sandbox::{MemoryLimit, SandboxConfig, SandboxRuntime, StoreData, DEFAULT_MEMORY_LIMIT_MB};
