//! Low-level plugin invocation: bridges a sandboxed `Store`/`Instance`
//! pair to the three entry points a plugin bytecode module exports
//! (`describe`, `schema`, `observe`), adapting the packed
//! `(ptr<<32|len)` result convention the sandbox ABI uses for reading
//! a value back out of guest memory. The call sequence itself —
//! allocate, write, call, read, deallocate — mirrors the host-to-guest
//! invocation orbis-plugin's runtime performs for its own handlers.

use std::time::Duration;

use cce_capability::Grant;
use cce_plugin::PluginManifest;
use cce_runtime::sandbox::{deallocate_best_effort, SandboxConfig, SandboxRuntime, StoreData};
use cce_runtime::wire::unpack;
use cce_runtime::{FrozenEnvironment, MemoryLimit};
use wasmtime::{Instance, Store};

use crate::error::{Error, Result};
use crate::evidence::Evidence;

/// Resource budget for a `describe`/`schema` call: these never touch
/// a host function, so they need only enough room to run a plugin's
/// own bootstrapping code, not a production-sized observation budget.
const DESCRIBE_FUEL: u64 = 10_000_000;
const DESCRIBE_MAX_CALLS: u64 = 64;
const DESCRIBE_TIME_LIMIT: Duration = Duration::from_secs(5);
const DESCRIBE_MEMORY_LIMIT_MB: u64 = 64;

/// Invokes a plugin's `describe`, `schema`, and `observe` entry
/// points against a sandbox runtime.
#[derive(Clone)]
pub struct PluginHost {
    runtime: SandboxRuntime,
    env: FrozenEnvironment,
}

impl PluginHost {
    /// Build a plugin host over a sandbox runtime and the environment
    /// snapshot every instantiation should project through.
    #[must_use]
    pub fn new(runtime: SandboxRuntime, env: FrozenEnvironment) -> Self {
        Self { runtime, env }
    }

    #[allow(clippy::too_many_arguments)]
    fn instantiate(
        &self,
        plugin_name: &str,
        bytecode: &[u8],
        grant: Grant,
        time_limit: Duration,
        memory_limit: MemoryLimit,
        max_calls: u64,
        fuel: u64,
    ) -> Result<(Store<StoreData>, Instance)> {
        let module = self.runtime.load_module(plugin_name, bytecode)?;
        let config = SandboxConfig {
            plugin_name: plugin_name.to_string(),
            grant,
            env: self.env.clone(),
            time_limit,
            memory_limit,
            max_calls,
            fuel,
        };
        let (store, instance) = self.runtime.instantiate(&module, config)?;
        Ok((store, instance))
    }

    fn call_lifecycle_hook(store: &mut Store<StoreData>, instance: &Instance) -> Result<()> {
        let Some(init) = instance.get_func(&mut *store, "_initialize") else {
            return Ok(());
        };
        let typed = init
            .typed::<(), ()>(&*store)
            .map_err(|e| Error::execution(format!("_initialize has wrong signature: {e}")))?;
        typed
            .call(&mut *store, ())
            .map_err(|e| Error::execution(format!("_initialize trapped: {e}")))
    }

    /// Call a nullary entry point that returns a packed `(ptr, len)`
    /// word, and read the JSON bytes it points at. A zero-length
    /// result (or a missing export) means "nothing to report" rather
    /// than an error — `schema()` in particular is optional.
    fn call_nullary_json(
        store: &mut Store<StoreData>,
        instance: &Instance,
        export: &str,
    ) -> Result<Option<Vec<u8>>> {
        let Some(func) = instance.get_func(&mut *store, export) else {
            return Ok(None);
        };
        let typed = func
            .typed::<(), u64>(&mut *store)
            .map_err(|e| Error::execution(format!("{export} has wrong signature: {e}")))?;
        let packed = typed
            .call(&mut *store, ())
            .map_err(|e| Error::execution(format!("{export} trapped: {e}")))?;
        let (ptr, len) = unpack(packed);
        if len == 0 {
            return Ok(None);
        }
        let bytes = read_memory(store, instance, ptr, len)?;
        deallocate_best_effort(store, instance, ptr, len);
        Ok(Some(bytes))
    }

    /// Call `describe()` and parse its result into a manifest.
    pub fn describe(&self, plugin_name: &str, bytecode: &[u8]) -> Result<PluginManifest> {
        let (mut store, instance) = self.instantiate(
            plugin_name,
            bytecode,
            Grant::new(),
            DESCRIBE_TIME_LIMIT,
            MemoryLimit::Mb(DESCRIBE_MEMORY_LIMIT_MB),
            DESCRIBE_MAX_CALLS,
            DESCRIBE_FUEL,
        )?;
        Self::call_lifecycle_hook(&mut store, &instance)?;
        let bytes = Self::call_nullary_json(&mut store, &instance, "describe")?.ok_or_else(|| {
            Error::execution(format!("plugin '{plugin_name}' returned no describe() output"))
        })?;
        PluginManifest::from_json(&bytes)
            .map_err(|e| Error::execution(format!("plugin '{plugin_name}' describe() output: {e}")))
    }

    /// Call `schema()`, if the plugin exports one.
    pub fn schema(&self, plugin_name: &str, bytecode: &[u8]) -> Result<Option<serde_json::Value>> {
        let (mut store, instance) = self.instantiate(
            plugin_name,
            bytecode,
            Grant::new(),
            DESCRIBE_TIME_LIMIT,
            MemoryLimit::Mb(DESCRIBE_MEMORY_LIMIT_MB),
            DESCRIBE_MAX_CALLS,
            DESCRIBE_FUEL,
        )?;
        Self::call_lifecycle_hook(&mut store, &instance)?;
        let Some(bytes) = Self::call_nullary_json(&mut store, &instance, "schema")? else {
            return Ok(None);
        };
        let value = serde_json::from_slice(&bytes)
            .map_err(|e| Error::execution(format!("plugin '{plugin_name}' schema() output: {e}")))?;
        Ok(Some(value))
    }

    /// Call `observe(config)` under a granted capability set and a
    /// real resource budget, and collect the resulting evidence.
    #[allow(clippy::too_many_arguments)]
    pub fn observe(
        &self,
        plugin_name: &str,
        bytecode: &[u8],
        grant: Grant,
        config: &serde_json::Value,
        time_limit: Duration,
        memory_limit: MemoryLimit,
        max_calls: u64,
        fuel: u64,
    ) -> Result<Evidence> {
        let (mut store, instance) =
            self.instantiate(plugin_name, bytecode, grant, time_limit, memory_limit, max_calls, fuel)?;
        Self::call_lifecycle_hook(&mut store, &instance)?;

        let cfg_bytes = serde_json::to_vec(config)
            .map_err(|e| Error::execution(format!("serializing observe() config: {e}")))?;
        let (cfg_ptr, cfg_len) = allocate_and_write(&mut store, &instance, &cfg_bytes)?;

        let observe_func = instance
            .get_func(&mut store, "observe")
            .ok_or_else(|| Error::execution(format!("plugin '{plugin_name}' has no observe() export")))?;
        let typed = observe_func
            .typed::<(i32, i32), u64>(&store)
            .map_err(|e| Error::execution(format!("observe() has wrong signature: {e}")))?;
        let result = typed.call(&mut store, (cfg_ptr as i32, cfg_len as i32));
        deallocate_best_effort(&mut store, &instance, cfg_ptr, cfg_len);
        let packed = result.map_err(|e| Error::execution(format!("observe() trapped: {e}")))?;

        let (ptr, len) = unpack(packed);
        if len == 0 {
            return Err(Error::execution(format!(
                "plugin '{plugin_name}' observe() returned no result"
            )));
        }
        let bytes = read_memory(&mut store, &instance, ptr, len)?;
        deallocate_best_effort(&mut store, &instance, ptr, len);

        let (stdout, stderr) = store.data().take_output();
        if !stdout.is_empty() {
            tracing::debug!(plugin = plugin_name, "{stdout}");
        }
        if !stderr.is_empty() {
            tracing::debug!(plugin = plugin_name, stream = "stderr", "{stderr}");
        }

        serde_json::from_slice(&bytes)
            .map_err(|e| Error::execution(format!("plugin '{plugin_name}' observe() output: {e}")))
    }
}

/// The seam `CapabilityOrchestrator::collect_capabilities` calls to
/// learn a plugin's declared capabilities without `cce-capability`
/// ever depending on wasmtime.
impl cce_capability::PluginDescriber for PluginHost {
    fn describe(&self, plugin_name: &str, plugin_dir: &std::path::Path) -> cce_capability::Result<Grant> {
        let path = plugin_dir.join(plugin_name).join(format!("{plugin_name}.bytecode"));
        let bytecode = std::fs::read(&path)
            .map_err(|e| cce_capability::Error::extraction(format!("reading {}: {e}", path.display())))?;
        let manifest = self
            .describe(plugin_name, &bytecode)
            .map_err(|e| cce_capability::Error::extraction(e.to_string()))?;
        Ok(Grant::from_capabilities(manifest.capabilities()))
    }
}

fn read_memory(store: &mut Store<StoreData>, instance: &Instance, ptr: u32, len: u32) -> Result<Vec<u8>> {
    let memory = instance
        .get_memory(&mut *store, "memory")
        .ok_or_else(|| Error::execution("memory export not found"))?;
    let mut buffer = vec![0u8; len as usize];
    memory
        .read(&mut *store, ptr as usize, &mut buffer)
        .map_err(|e| Error::execution(format!("reading guest memory: {e}")))?;
    Ok(buffer)
}

fn allocate_and_write(store: &mut Store<StoreData>, instance: &Instance, bytes: &[u8]) -> Result<(u32, u32)> {
    let alloc = instance
        .get_func(&mut *store, "allocate")
        .ok_or_else(|| Error::execution("plugin has no allocate() export"))?;
    let typed = alloc
        .typed::<i32, i32>(&*store)
        .map_err(|e| Error::execution(format!("allocate() has wrong signature: {e}")))?;
    let ptr = typed
        .call(&mut *store, bytes.len() as i32)
        .map_err(|e| Error::execution(format!("allocate() trapped: {e}")))? as u32;

    let memory = instance
        .get_memory(&mut *store, "memory")
        .ok_or_else(|| Error::execution("memory export not found"))?;
    memory
        .write(&mut *store, ptr as usize, bytes)
        .map_err(|e| Error::execution(format!("writing guest memory: {e}")))?;

    Ok((ptr, bytes.len() as u32))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn describe_fuel_budget_is_nonzero() {
        assert!(DESCRIBE_FUEL > 0);
    }
}
