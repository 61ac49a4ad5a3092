//! The sandbox runtime: a fresh, isolated wasmtime execution context
//! per invocation, built from a plugin's effective grant.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use cce_capability::Grant;
use dashmap::DashMap;
use parking_lot::RwLock;
use wasmtime::{Config, Engine, Linker, Module, Store, StoreLimits, StoreLimitsBuilder};
use wasmtime_wasi::pipe::MemoryOutputPipe;
use wasmtime_wasi::preview1::{self, WasiP1Ctx};
use wasmtime_wasi::{DirPerms, FilePerms, WasiCtxBuilder};

use crate::env_snapshot::FrozenEnvironment;
use crate::error::{Error, Result};
use crate::host;
use crate::mount::{mounts_for, Mount};
use crate::redact::Redactor;

/// Default memory limit applied when a plugin's configuration doesn't
/// specify one, in MiB.
pub const DEFAULT_MEMORY_LIMIT_MB: i64 = 256;

/// A validated memory limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryLimit {
    /// `-1`: no memory ceiling.
    Unlimited,
    /// An explicit positive MiB value.
    Mb(u64),
}

impl MemoryLimit {
    /// Validate a raw configuration value per the sandbox's contract:
    /// `-1` means unlimited; a positive value is taken as MiB;
    /// `0 < v < 64` is accepted but logged as a warning (too small to
    /// be useful for most plugins); anything `< -1` is rejected.
    pub fn validate(raw: i64) -> Result<Self> {
        if raw == -1 {
            return Ok(Self::Unlimited);
        }
        if raw < -1 {
            return Err(Error::invalid_memory_limit(format!(
                "{raw} is not a valid memory limit (only -1 or a non-negative MiB value is)"
            )));
        }
        if raw == 0 {
            return Err(Error::invalid_memory_limit(
                "0 MiB would leave the plugin no usable memory",
            ));
        }
        #[allow(clippy::cast_sign_loss)]
        let mb = raw as u64;
        if mb < 64 {
            tracing::warn!(requested_mb = mb, "memory limit below 64MiB may be too small to run most plugins");
        }
        Ok(Self::Mb(mb))
    }

    /// The limit in bytes, or `None` for unlimited.
    #[must_use]
    pub fn bytes(&self) -> Option<usize> {
        match self {
            Self::Unlimited => None,
            Self::Mb(mb) => Some((*mb as usize) * 1024 * 1024),
        }
    }
}

/// Per-invocation wasmtime store data: resource accounting and the
/// context a host function needs to perform its capability check and
/// redact its output.
pub struct StoreData {
    pub(crate) limits: StoreLimits,
    pub(crate) plugin_name: String,
    pub(crate) grant: Grant,
    pub(crate) mounts: Vec<Mount>,
    pub(crate) env: std::collections::BTreeMap<String, String>,
    pub(crate) redactor: Redactor,
    pub(crate) max_calls: u64,
    pub(crate) call_count: u64,
    pub(crate) deadline: Instant,
    pub(crate) wasi: WasiP1Ctx,
    stdout_pipe: MemoryOutputPipe,
    stderr_pipe: MemoryOutputPipe,
}

impl StoreData {
    /// Enforce the call-count and wall-clock budget for this
    /// invocation. Called at the top of every host function.
    pub fn check_limits(&mut self) -> Result<()> {
        self.call_count += 1;
        if self.call_count > self.max_calls {
            return Err(Error::execution(format!(
                "plugin '{}' exceeded maximum host calls ({})",
                self.plugin_name, self.max_calls
            )));
        }
        if Instant::now() >= self.deadline {
            return Err(Error::Timeout(self.plugin_name.clone()));
        }
        Ok(())
    }

    /// Drain the plugin's captured stdout/stderr, scrubbed through the
    /// redactor. Call once after the invocation completes.
    #[must_use]
    pub fn take_output(&self) -> (String, String) {
        let stdout = String::from_utf8_lossy(self.redactor.scrub_bytes(&self.stdout_pipe.contents()).as_slice()).into_owned();
        let stderr = String::from_utf8_lossy(self.redactor.scrub_bytes(&self.stderr_pipe.contents()).as_slice()).into_owned();
        (stdout, stderr)
    }
}

/// Configuration for one sandboxed invocation.
pub struct SandboxConfig {
    /// Plugin name, used for logging and as the capability-check key.
    pub plugin_name: String,
    /// The plugin's effective (already-reconciled) grant.
    pub grant: Grant,
    /// Frozen environment snapshot to project through per the grant.
    pub env: FrozenEnvironment,
    /// Wall-clock budget for one invocation.
    pub time_limit: std::time::Duration,
    /// Memory ceiling for the instance.
    pub memory_limit: MemoryLimit,
    /// Maximum host-function calls in one invocation.
    pub max_calls: u64,
    /// Fuel budget (execution steps), independent of wall-clock time.
    pub fuel: u64,
}

/// Creates fresh, isolated execution contexts and caches compiled
/// modules by plugin name.
#[derive(Clone)]
pub struct SandboxRuntime {
    engine: Engine,
    modules: Arc<DashMap<String, Module>>,
    load_lock: Arc<RwLock<()>>,
    redactor: Redactor,
}

impl SandboxRuntime {
    /// Build a sandbox runtime with a fresh wasmtime engine configured
    /// for fuel-based execution limits and a bounded guest stack.
    #[must_use]
    pub fn new(redactor: Redactor) -> Self {
        let mut config = Config::new();
        config.consume_fuel(true);
        config.max_wasm_stack(512 * 1024);
        let engine = Engine::new(&config).expect("wasmtime engine configuration is valid");

        Self {
            engine,
            modules: Arc::new(DashMap::new()),
            load_lock: Arc::new(RwLock::new(())),
            redactor,
        }
    }

    /// Load (or fetch from cache) the compiled module for `name`.
    /// Double-checked locking: a fast read-path returns immediately
    /// when the module is already cached; only a genuine miss takes
    /// the write lock and compiles.
    pub fn load_module(&self, name: &str, bytecode: &[u8]) -> Result<Module> {
        if let Some(module) = self.modules.get(name) {
            return Ok(module.clone());
        }

        let _write_guard = self.load_lock.write();
        if let Some(module) = self.modules.get(name) {
            return Ok(module.clone());
        }

        let module = Module::new(&self.engine, bytecode)
            .map_err(|e| Error::load(name, e.to_string()))?;
        self.modules.insert(name.to_string(), module.clone());
        Ok(module)
    }

    /// Drop a cached module, forcing recompilation on next use.
    pub fn evict(&self, name: &str) {
        self.modules.remove(name);
    }

    /// Instantiate `module` with a fresh store built from `config`,
    /// register the mediated host functions, and return the
    /// instantiated store ready for the caller to invoke `describe`,
    /// `schema`, or `observe`.
    pub fn instantiate(
        &self,
        module: &Module,
        config: SandboxConfig,
    ) -> Result<(Store<StoreData>, wasmtime::Instance)> {
        let mounts = mounts_for(
            &config
                .grant
                .iter()
                .filter(|c| c.kind == cce_capability::Kind::Fs)
                .cloned()
                .collect::<Vec<_>>(),
        );
        let env = config.env.inject_for(&config.grant);

        let limits = StoreLimitsBuilder::new()
            .memory_size(config.memory_limit.bytes().unwrap_or(usize::MAX))
            .build();

        const OUTPUT_CAP: usize = 10 * 1024 * 1024;
        let stdout_pipe = MemoryOutputPipe::new(OUTPUT_CAP);
        let stderr_pipe = MemoryOutputPipe::new(OUTPUT_CAP);

        let mut wasi_builder = WasiCtxBuilder::new();
        wasi_builder
            .stdout(stdout_pipe.clone())
            .stderr(stderr_pipe.clone())
            .envs(&env.iter().map(|(k, v)| (k.clone(), v.clone())).collect::<Vec<_>>());
        for mount in &mounts {
            let perms = if mount.read_only {
                (DirPerms::READ, FilePerms::READ)
            } else {
                (DirPerms::all(), FilePerms::all())
            };
            wasi_builder
                .preopened_dir(&mount.host_path, mount.host_path.to_string_lossy(), perms.0, perms.1)
                .map_err(|e| Error::load(&config.plugin_name, format!("mounting {}: {e}", mount.host_path.display())))?;
        }
        let wasi = wasi_builder.build_p1();

        let store_data = StoreData {
            limits,
            plugin_name: config.plugin_name.clone(),
            grant: config.grant,
            mounts,
            env,
            redactor: self.redactor.clone(),
            max_calls: config.max_calls,
            call_count: 0,
            deadline: Instant::now() + config.time_limit,
            wasi,
            stdout_pipe,
            stderr_pipe,
        };

        let mut store = Store::new(&self.engine, store_data);
        store.limiter(|data| &mut data.limits);
        store
            .set_fuel(config.fuel)
            .map_err(|e| Error::load(&config.plugin_name, format!("failed to set fuel: {e}")))?;

        let mut linker = Linker::new(&self.engine);
        preview1::add_to_linker_sync(&mut linker, |data: &mut StoreData| &mut data.wasi)
            .map_err(|e| Error::load(&config.plugin_name, format!("registering WASI: {e}")))?;
        host::register_all(&mut linker).map_err(|e| Error::load(&config.plugin_name, e.to_string()))?;

        let instance = linker
            .instantiate(&mut store, module)
            .map_err(|e| Error::load(&config.plugin_name, format!("instantiation failed: {e}")))?;

        Ok((store, instance))
    }
}

/// No-op on an unrecognized pointer: guests are expected to free what
/// they allocated, and a guest bug here should not crash the host.
pub fn deallocate_best_effort(
    store: &mut Store<StoreData>,
    instance: &wasmtime::Instance,
    ptr: u32,
    len: u32,
) {
    let Some(dealloc) = instance.get_func(&mut *store, "deallocate") else {
        return;
    };
    let Ok(typed) = dealloc.typed::<(i32, i32), ()>(&*store) else {
        return;
    };
    let _ = typed.call(&mut *store, (ptr as i32, len as i32));
}

/// A host directory the sandbox root is never allowed to resolve
/// mounts onto by accident.
#[must_use]
pub fn default_plugin_dir() -> PathBuf {
    std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_limit_minus_one_is_unlimited() {
        assert_eq!(MemoryLimit::validate(-1).unwrap(), MemoryLimit::Unlimited);
    }

    #[test]
    fn memory_limit_below_minus_one_rejected() {
        assert!(MemoryLimit::validate(-2).is_err());
    }

    #[test]
    fn memory_limit_zero_rejected() {
        assert!(MemoryLimit::validate(0).is_err());
    }

    #[test]
    fn memory_limit_small_value_warns_but_proceeds() {
        let limit = MemoryLimit::validate(32).unwrap();
        assert_eq!(limit, MemoryLimit::Mb(32));
    }

    #[test]
    fn memory_limit_default_is_256mb() {
        let limit = MemoryLimit::validate(DEFAULT_MEMORY_LIMIT_MB).unwrap();
        assert_eq!(limit.bytes(), Some(256 * 1024 * 1024));
    }

    #[test]
    fn load_module_rejects_malformed_bytecode() {
        let runtime = SandboxRuntime::new(Redactor::new());
        assert!(runtime.load_module("bad", b"not a wasm module").is_err());
    }
}
