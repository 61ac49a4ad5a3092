//! The orchestrating use case: profile → resolved plugins → staged
//! sandbox directory → granted capabilities → executed observations →
//! a summarized result.
//!
//! Plugin resolution happens in two passes. The standard embedded →
//! cache → registry chain runs first against every declared plugin;
//! anything it reports `NotResolvable` is deferred, not failed,
//! because a local plugin directory (step below) may still supply it.
//! Only a plugin that neither chain nor local directory can produce
//! is a hard error.

use std::collections::HashMap;
use std::path::Path;
use std::time::Instant;

use cce_capability::{
    CapabilityOrchestrator, ExtractorRegistry, Gatekeeper, Grant, GrantedMap, Prompter,
};
use cce_core::{Control, ErrorDetail, ObservationDefinition, ProfileReader};
use cce_plugin::resolver::{now, Resolver};
use cce_plugin::{Lockfile, PluginReference, ResolverChain};
use cce_runtime::{FrozenEnvironment, MemoryLimit, Redactor, SandboxRuntime};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, info_span, warn};

use crate::error::{Error, Result};
use crate::evidence::{Evidence, Outcome};
use crate::filter::ControlFilter;
use crate::lockfile_store::LockfileStore;
use crate::local_resolver::LocalDirResolver;
use crate::plugin_dir;
use crate::plugin_host::PluginHost;
use crate::staging::StagedPlugins;
use crate::summary::{control_outcome, ControlResult, ExecutionSummary, ObservationResult};

/// Tunables for one run, assembled from CLI flags and configuration
/// layering upstream of this crate.
pub struct EngineConfig {
    /// Explicit plugin directory, bypassing auto-detection.
    pub plugin_dir_override: Option<PathBuf>,
    /// Product name the lockfile is keyed under
    /// (`<profile_dir>/<product>.lock`).
    pub product: String,
    /// Explicit lockfile path, bypassing the
    /// `<profile_dir>/<product>.lock` convention.
    pub lockfile_override: Option<PathBuf>,
    /// Per-observation memory ceiling.
    pub memory_limit: MemoryLimit,
    /// Per-observation wall-clock deadline.
    pub time_limit: Duration,
    /// Per-observation host-call budget.
    pub max_calls: u64,
    /// Per-observation fuel budget.
    pub fuel: u64,
    /// Grant every required capability without consulting the store
    /// or prompting.
    pub trust_all: bool,
    /// Stop after capability collection and granting; no plugin is
    /// ever instantiated for an `observe()` call.
    pub dry_run: bool,
    /// Bound on observations executed at once within one control.
    /// `0` means unbounded.
    pub max_concurrent_observations: usize,
    /// Bound on controls executed at once. `0` means unbounded.
    pub max_concurrent_controls: usize,
    /// Control-id glob patterns restricting which controls run. Empty
    /// means every control runs.
    pub filters: Vec<String>,
    /// Regex patterns the redactor scrubs from plugin output and
    /// user-facing error messages, e.g. `SECRET-[A-Z0-9]{8}`.
    pub redaction_patterns: Vec<String>,
    /// Cap on the serialized size of one observation's evidence
    /// `data` payload. `None` means unbounded.
    pub max_evidence_size_bytes: Option<u64>,
}

/// What a run produced: the execution summary, plus the capability
/// grant the gatekeeper settled on and whether it differs from what
/// was persisted (the caller owns the capability store and decides
/// whether to write it back).
pub struct EngineOutcome {
    /// The per-control results and aggregate counts.
    pub summary: ExecutionSummary,
    /// The grant the gatekeeper resolved to, across every plugin.
    pub granted: Grant,
    /// Whether `granted` should be persisted.
    pub granted_store_dirty: bool,
}

/// Runs the full profile-to-evidence pipeline for one set of tunables.
pub struct Engine {
    config: EngineConfig,
}

impl Engine {
    /// Build an engine over a fixed configuration.
    #[must_use]
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    /// Execute one run.
    ///
    /// `profile_dir` anchors the lockfile's conventional location
    /// (`<profile_dir>/<product>.lock`). `persisted` is the
    /// previously granted capability set; `gatekeeper` mediates
    /// anything beyond it.
    pub fn run<P: Prompter>(
        &self,
        profile: &dyn ProfileReader,
        profile_dir: &Path,
        resolver_chain: &ResolverChain,
        gatekeeper: &Gatekeeper<P>,
        persisted: &Grant,
    ) -> Result<EngineOutcome> {
        let started = Instant::now();
        let config = &self.config;

        let controls = profile.get_all_controls()?;
        let declared = profile.get_plugins()?;

        let known_ids: Vec<String> = controls.iter().map(|c| c.id.clone()).collect();
        let filter = ControlFilter::compile(&config.filters)?;
        filter.validate_against(&config.filters, &known_ids)?;

        let lockfile_store = match &config.lockfile_override {
            Some(path) => LockfileStore::at_path(path.clone()),
            None => LockfileStore::beside_profile(profile_dir, &config.product),
        };
        let previous_lock = lockfile_store.load()?;

        let mut declared_refs: HashMap<String, PluginReference> = HashMap::new();
        let mut resolved: HashMap<String, cce_plugin::ResolvedPlugin> = HashMap::new();
        let mut unresolved: Vec<PluginReference> = Vec::new();

        for decl in &declared {
            let locator = match &decl.version {
                Some(version) if !version.is_empty() => format!("{}@{version}", decl.name),
                _ => decl.name.clone(),
            };
            let reference = PluginReference::parse(&locator)?;
            declared_refs.insert(decl.name.clone(), reference.clone());

            let expected_digest = previous_lock.get(&decl.name).map(|entry| entry.digest.clone());
            match resolver_chain.resolve(&reference, expected_digest.as_ref()) {
                Ok(plugin) => {
                    resolved.insert(decl.name.clone(), plugin);
                }
                Err(cce_plugin::Error::NotResolvable(_)) => {
                    warn!(plugin = %decl.name, "not resolvable by the standard chain, deferring to local directory");
                    unresolved.push(reference);
                }
                Err(e) => return Err(e.into()),
            }
        }

        let local_dir = plugin_dir::resolve(config.plugin_dir_override.as_deref(), unresolved.is_empty())?;

        if !unresolved.is_empty() {
            let dir = local_dir.clone().ok_or_else(|| {
                Error::validation(
                    "profile declares external plugins but no local plugin directory is available",
                )
            })?;
            let local_resolver = LocalDirResolver::new(dir);
            for reference in unresolved {
                let plugin = local_resolver.resolve(&reference)?.ok_or_else(|| {
                    Error::validation(format!("plugin '{}' could not be resolved", reference.name))
                })?;
                resolved.insert(reference.name.clone(), plugin);
            }
        }

        let mut lockfile = Lockfile::new();
        for (name, plugin) in &resolved {
            let requested = declared_refs.get(name).unwrap_or(&plugin.reference);
            lockfile.record(
                name.clone(),
                requested,
                &plugin.reference,
                plugin.source,
                plugin.digest.clone(),
                now(),
            );
        }
        let declared_names: Vec<&str> = declared.iter().map(|d| d.name.as_str()).collect();
        lockfile.require_complete(declared_names.iter().copied())?;
        lockfile_store.save(&lockfile)?;

        let stage_items: Vec<(&str, &[u8])> =
            resolved.iter().map(|(name, plugin)| (name.as_str(), plugin.bytecode.as_slice())).collect();
        let staged = StagedPlugins::stage(stage_items)?;

        let redactor = Redactor::new();
        redactor.track_patterns(config.redaction_patterns.iter().map(String::as_str))?;

        let extractors = ExtractorRegistry::with_builtins();
        let orchestrator = CapabilityOrchestrator::new(&extractors);
        let describer = PluginHost::new(SandboxRuntime::new(redactor.clone()), FrozenEnvironment::capture());
        let required = orchestrator.collect_capabilities(profile, staged.path(), &describer)?;
        let (granted_map, granted, dirty) =
            orchestrator.grant_capabilities(&required, gatekeeper, persisted, config.trust_all)?;
        info!(granted = granted.len(), plugins = granted_map.len(), "capabilities granted");

        if config.dry_run {
            info!("dry run: skipping observation execution");
            return Ok(EngineOutcome {
                summary: ExecutionSummary::summarize(Vec::new(), started.elapsed()),
                granted,
                granted_store_dirty: dirty,
            });
        }

        let host = PluginHost::new(SandboxRuntime::new(redactor), FrozenEnvironment::capture());

        let control_results = scoped_map(&controls, config.max_concurrent_controls, |control| {
            self.run_control(control, &filter, &host, &staged, &granted_map)
        });

        Ok(EngineOutcome {
            summary: ExecutionSummary::summarize(control_results, started.elapsed()),
            granted,
            granted_store_dirty: dirty,
        })
    }

    fn run_control(
        &self,
        control: &Control,
        filter: &ControlFilter,
        host: &PluginHost,
        staged: &StagedPlugins,
        granted_map: &GrantedMap,
    ) -> ControlResult {
        if !filter.matches(&control.id) {
            return skipped_control_result(control);
        }

        let span = info_span!("control", id = %control.id, name = %control.name);
        let _entered = span.enter();

        let observations = scoped_map(&control.observations, self.config.max_concurrent_observations, |obs| {
            let span = info_span!("observation", plugin = %obs.plugin);
            let _entered = span.enter();
            match execute_observation(host, staged, granted_map.get(&obs.plugin), &self.config, obs) {
                Ok(result) => result,
                Err(e) => errored_observation_result(&obs.plugin, &e.to_string()),
            }
        });

        let outcome = control_outcome(&observations);
        info!(outcome = ?outcome, "control complete");
        ControlResult {
            control_id: control.id.clone(),
            control_name: control.name.clone(),
            outcome,
            observations,
        }
    }
}

/// Build a control's result for the case where a filter excluded it
/// before any observation ran.
fn skipped_control_result(control: &Control) -> ControlResult {
    let observations = control
        .observations
        .iter()
        .map(|o| ObservationResult { plugin: o.plugin.clone(), outcome: Outcome::Skipped, evidence: None })
        .collect();
    ControlResult {
        control_id: control.id.clone(),
        control_name: control.name.clone(),
        outcome: Outcome::Skipped,
        observations,
    }
}

/// Build an observation result for a plugin the gatekeeper granted
/// nothing to: the intersection of required and granted capabilities
/// was empty, so the observation never runs.
fn capability_denied_result(plugin: &str) -> ObservationResult {
    ObservationResult {
        plugin: plugin.to_string(),
        outcome: Outcome::Errored,
        evidence: Some(Evidence {
            status: false,
            data: serde_json::Value::Null,
            error: Some(ErrorDetail::capability(format!(
                "no capabilities were granted to plugin '{plugin}'"
            ))),
            truncated: false,
            duration_ms: 0,
        }),
    }
}

/// Build an observation result for a failure that happened before or
/// around the plugin call itself (staging I/O, config serialization),
/// rather than one the plugin reported through its own evidence.
fn errored_observation_result(plugin: &str, message: &str) -> ObservationResult {
    ObservationResult {
        plugin: plugin.to_string(),
        outcome: Outcome::Errored,
        evidence: Some(Evidence {
            status: false,
            data: serde_json::Value::Null,
            error: Some(ErrorDetail::execution(message.to_string())),
            truncated: false,
            duration_ms: 0,
        }),
    }
}

fn execute_observation(
    host: &PluginHost,
    staged: &StagedPlugins,
    grant: Option<&Grant>,
    config: &EngineConfig,
    observation: &ObservationDefinition,
) -> Result<ObservationResult> {
    let Some(grant) = grant else {
        return Ok(capability_denied_result(&observation.plugin));
    };

    let bytecode = staged.read(&observation.plugin)?;
    let cfg_value = serde_json::to_value(&observation.config)
        .map_err(|e| Error::execution(format!("serializing observation config: {e}")))?;

    let started = Instant::now();
    let outcome = host.observe(
        &observation.plugin,
        &bytecode,
        grant.clone(),
        &cfg_value,
        config.time_limit,
        config.memory_limit,
        config.max_calls,
        config.fuel,
    );
    let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

    let evidence = match outcome {
        Ok(mut evidence) => {
            if evidence.duration_ms == 0 {
                evidence.duration_ms = elapsed_ms;
            }
            if let Some(max) = config.max_evidence_size_bytes {
                evidence.enforce_max_size(max);
            }
            evidence
        }
        Err(e) => Evidence {
            status: false,
            data: serde_json::Value::Null,
            error: Some(error_detail_for(&e)),
            truncated: false,
            duration_ms: elapsed_ms,
        },
    };

    Ok(ObservationResult { plugin: observation.plugin.clone(), outcome: evidence.outcome(), evidence: Some(evidence) })
}

fn error_detail_for(e: &Error) -> ErrorDetail {
    match e {
        Error::Capability(msg) => ErrorDetail::capability(msg.clone()),
        other => ErrorDetail::execution(other.to_string()),
    }
}

/// Run `f` over `items`, bounding concurrency to `limit` at a time
/// (`0` means unbounded — everything runs in one batch). Mirrors the
/// `std::thread::scope` parallel-describe pattern the capability
/// orchestrator uses for its own fan-out.
fn scoped_map<'env, T, R, F>(items: &'env [T], limit: usize, f: F) -> Vec<R>
where
    T: Sync,
    R: Send,
    F: Fn(&'env T) -> R + Sync,
{
    if items.is_empty() {
        return Vec::new();
    }
    let chunk_size = if limit == 0 { items.len() } else { limit.max(1) };
    let mut results = Vec::with_capacity(items.len());
    for chunk in items.chunks(chunk_size) {
        let mut chunk_results: Vec<R> = std::thread::scope(|scope| {
            let handles: Vec<_> = chunk.iter().map(|item| scope.spawn(|| f(item))).collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });
        results.append(&mut chunk_results);
    }
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap as Map;

    #[test]
    fn skipped_control_marks_every_observation_skipped() {
        let control = Control {
            id: "c1".to_string(),
            name: "one".to_string(),
            observations: vec![
                ObservationDefinition { plugin: "file".to_string(), config: Map::new() },
                ObservationDefinition { plugin: "http".to_string(), config: Map::new() },
            ],
        };
        let result = skipped_control_result(&control);
        assert_eq!(result.outcome, Outcome::Skipped);
        assert_eq!(result.observations.len(), 2);
        assert!(result.observations.iter().all(|o| o.outcome == Outcome::Skipped && o.evidence.is_none()));
    }

    #[test]
    fn capability_denied_result_is_errored_with_detail() {
        let result = capability_denied_result("file");
        assert_eq!(result.outcome, Outcome::Errored);
        let evidence = result.evidence.unwrap();
        assert!(evidence.error.is_some());
        assert!(!evidence.status);
    }

    #[test]
    fn scoped_map_preserves_order_across_chunks() {
        let items = vec![1, 2, 3, 4, 5];
        let results = scoped_map(&items, 2, |x| x * 10);
        assert_eq!(results, vec![10, 20, 30, 40, 50]);
    }

    #[test]
    fn scoped_map_zero_limit_runs_unbounded() {
        let items = vec![1, 2, 3];
        let results = scoped_map(&items, 0, |x| x + 1);
        assert_eq!(results, vec![2, 3, 4]);
    }

    #[test]
    fn scoped_map_on_empty_slice_is_empty() {
        let items: Vec<i32> = Vec::new();
        let results = scoped_map(&items, 4, |x| *x);
        assert!(results.is_empty());
    }
}
