//! The Capability Orchestrator: collects per-plugin required
//! capabilities from a profile and reconciles them through the
//! gatekeeper into per-plugin granted maps.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

use cce_core::ProfileReader;

use crate::capability::Capability;
use crate::error::{Error, Result};
use crate::extractor::ExtractorRegistry;
use crate::gatekeeper::{CapabilityInfo, Gatekeeper, Prompter};
use crate::grant::Grant;

/// Collaborator that can load a plugin's bytecode from `plugin_dir`
/// under a sandboxed directory handle and call its `describe` entry
/// point to learn its declared capabilities. Implemented by
/// `cce-runtime`'s sandbox; kept as a trait here so this crate never
/// depends on the wasmtime stack.
pub trait PluginDescriber: Send + Sync {
    /// Return the plugin's declared capabilities, or an error if the
    /// plugin could not be loaded or described.
    fn describe(&self, plugin_name: &str, plugin_dir: &Path) -> Result<Grant>;
}

/// Required capabilities for one plugin, already merged between
/// profile-specific and declared sources.
pub type RequiredMap = HashMap<String, Vec<CapabilityInfo>>;

/// Granted capabilities re-projected per plugin.
pub type GrantedMap = HashMap<String, Grant>;

/// Collects and grants capabilities across a profile's declared
/// plugins.
pub struct CapabilityOrchestrator<'a> {
    extractors: &'a ExtractorRegistry,
}

impl<'a> CapabilityOrchestrator<'a> {
    /// Build an orchestrator over the given extractor registry.
    #[must_use]
    pub fn new(extractors: &'a ExtractorRegistry) -> Self {
        Self { extractors }
    }

    /// `CollectCapabilities(profile, plugin_dir) -> required`.
    ///
    /// 1. Extract profile-implied capabilities per plugin via the
    ///    extractor registry.
    /// 2. Enumerate unique plugin names used across controls.
    /// 3. In parallel, describe each plugin's declared capabilities
    ///    under the sandboxed directory handle `describer` provides.
    /// 4. Merge per plugin: profile-specific caps win when present
    ///    (`is_profile_based=true`); otherwise declared caps are used,
    ///    with the first profile-specific alternative (if any)
    ///    recorded as `profile_specific`.
    pub fn collect_capabilities(
        &self,
        profile: &dyn ProfileReader,
        plugin_dir: &Path,
        describer: &dyn PluginDescriber,
    ) -> Result<RequiredMap> {
        let controls = profile
            .get_all_controls()
            .map_err(|e| Error::extraction(format!("reading controls: {e}")))?;

        let mut profile_implied: HashMap<String, Grant> = HashMap::new();
        for control in &controls {
            for observation in &control.observations {
                let implied = self.extractors.extract(&observation.plugin, &observation.config);
                profile_implied
                    .entry(observation.plugin.clone())
                    .or_default()
                    .extend(&implied);
            }
        }

        let mut plugin_names: Vec<String> = profile_implied.keys().cloned().collect();
        plugin_names.sort();
        plugin_names.dedup();

        let declared: Mutex<HashMap<String, Result<Grant>>> = Mutex::new(HashMap::new());
        std::thread::scope(|scope| {
            for name in &plugin_names {
                let declared = &declared;
                scope.spawn(move || {
                    let result = describer.describe(name, plugin_dir);
                    declared.lock().unwrap().insert(name.clone(), result);
                });
            }
        });
        let declared = declared.into_inner().unwrap();

        let mut required = RequiredMap::new();
        for name in &plugin_names {
            let specific = profile_implied.get(name).cloned().unwrap_or_default();
            let merged = self.merge_plugin_capabilities(name, specific, declared.get(name))?;
            required.insert(name.clone(), merged);
        }
        Ok(required)
    }

    fn merge_plugin_capabilities(
        &self,
        plugin_name: &str,
        specific: Grant,
        declared: Option<&Result<Grant>>,
        ) -> Result<Vec<CapabilityInfo>> {
        if !specific.is_empty() {
            return Ok(specific
                .iter()
                .map(|cap| CapabilityInfo {
                    capability: cap.clone(),
                    plugin_name: plugin_name.to_string(),
                    is_profile_based: true,
                    is_broad: cap.is_broad(),
                    profile_specific: None,
                })
                .collect());
        }

        let declared = match declared {
            Some(Ok(grant)) => grant.clone(),
            Some(Err(e)) => {
                return Err(Error::extraction(format!(
                    "describing plugin '{plugin_name}': {e}"
                )));
            }
            None => Grant::new(),
        };

        // The merge above is whole-plugin, all-or-nothing: this branch
        // only runs when `specific` was empty for the entire plugin,
        // so there is by construction no profile-specific alternative
        // to offer for any of its declared-fallback capabilities.
        let first_specific: Option<Capability> = None;
        Ok(declared
            .iter()
            .map(|cap| CapabilityInfo {
                capability: cap.clone(),
                plugin_name: plugin_name.to_string(),
                is_profile_based: false,
                is_broad: cap.is_broad(),
                profile_specific: first_specific.clone(),
            })
            .collect())
    }

    /// `GrantCapabilities(required, trust_all) -> granted`.
    ///
    /// 1. Flatten to a unique grant across all plugins.
    /// 2. Consult the gatekeeper to produce a globally granted grant.
    /// 3. Re-project onto per-plugin maps: each plugin sees only the
    ///    intersection of its request and the granted set; plugins
    ///    whose intersection is empty are omitted.
    pub fn grant_capabilities<P: Prompter>(
        &self,
        required: &RequiredMap,
        gatekeeper: &Gatekeeper<P>,
        persisted: &Grant,
        trust_all: bool,
    ) -> Result<(GrantedMap, Grant, bool)> {
        let mut flattened: Vec<CapabilityInfo> = Vec::new();
        for infos in required.values() {
            for info in infos {
                if !flattened.iter().any(|i| i.capability == info.capability) {
                    flattened.push(info.clone());
                }
            }
        }

        let (granted, dirty) = gatekeeper.resolve(&flattened, persisted, trust_all)?;

        let mut per_plugin = GrantedMap::new();
        for (plugin_name, infos) in required {
            let intersection: Grant = infos
                .iter()
                .map(|i| &i.capability)
                .filter(|cap| granted.contains(cap))
                .cloned()
                .collect();
            if !intersection.is_empty() {
                per_plugin.insert(plugin_name.clone(), intersection);
            }
        }

        Ok((per_plugin, granted, dirty))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::Kind;
    use crate::gatekeeper::SecurityLevel;
    use cce_core::{Control, ObservationDefinition, PluginDeclaration};
    use std::collections::HashMap as Map;

    struct StaticProfile {
        controls: Vec<Control>,
    }

    impl ProfileReader for StaticProfile {
        fn get_plugins(&self) -> cce_core::Result<Vec<PluginDeclaration>> {
            Ok(vec![])
        }
        fn get_all_controls(&self) -> cce_core::Result<Vec<Control>> {
            Ok(self.controls.clone())
        }
    }

    struct NoDeclaredCaps;

    impl PluginDescriber for NoDeclaredCaps {
        fn describe(&self, _plugin_name: &str, _plugin_dir: &Path) -> Result<Grant> {
            Ok(Grant::new())
        }
    }

    fn profile_with_file_observation(path: &str) -> StaticProfile {
        let mut cfg = Map::new();
        cfg.insert("path".to_string(), serde_json::Value::String(path.to_string()));
        StaticProfile {
            controls: vec![Control {
                id: "c1".to_string(),
                name: "check file".to_string(),
                observations: vec![ObservationDefinition {
                    plugin: "file".to_string(),
                    config: cfg,
                }],
            }],
        }
    }

    #[test]
    fn collect_extracts_profile_implied_capabilities() {
        let extractors = ExtractorRegistry::with_builtins();
        let orchestrator = CapabilityOrchestrator::new(&extractors);
        let profile = profile_with_file_observation("/tmp/a");
        let required = orchestrator
            .collect_capabilities(&profile, Path::new("/plugins"), &NoDeclaredCaps)
            .unwrap();
        let infos = required.get("file").unwrap();
        assert_eq!(infos.len(), 1);
        assert!(infos[0].is_profile_based);
        assert_eq!(infos[0].capability, Capability::of(Kind::Fs, "read:/tmp/a"));
    }

    #[test]
    fn grant_reprojects_and_omits_empty_plugins() {
        use crate::gatekeeper::DenyAllPrompter;
        let extractors = ExtractorRegistry::with_builtins();
        let orchestrator = CapabilityOrchestrator::new(&extractors);
        let mut required = RequiredMap::new();
        required.insert(
            "file".to_string(),
            vec![CapabilityInfo {
                capability: Capability::of(Kind::Fs, "read:/tmp/a"),
                plugin_name: "file".to_string(),
                is_profile_based: true,
                is_broad: false,
                profile_specific: None,
            }],
        );
        required.insert(
            "unused".to_string(),
            vec![CapabilityInfo {
                capability: Capability::of(Kind::Exec, "bash"),
                plugin_name: "unused".to_string(),
                is_profile_based: true,
                is_broad: true,
                profile_specific: None,
            }],
        );

        let gatekeeper = Gatekeeper::with_interactivity(SecurityLevel::Strict, false, DenyAllPrompter);
        let (granted, flat, _dirty) = orchestrator
            .grant_capabilities(&required, &gatekeeper, &Grant::new(), true)
            .unwrap();
        assert_eq!(flat.len(), 2);
        assert!(granted.contains_key("file"));
        assert!(granted.contains_key("unused"));
    }

    #[test]
    fn trust_all_scenario_grants_required_set() {
        use crate::gatekeeper::DenyAllPrompter;
        let extractors = ExtractorRegistry::with_builtins();
        let orchestrator = CapabilityOrchestrator::new(&extractors);
        let mut required = RequiredMap::new();
        required.insert(
            "file".to_string(),
            vec![CapabilityInfo {
                capability: Capability::of(Kind::Fs, "read:/tmp/a"),
                plugin_name: "file".to_string(),
                is_profile_based: true,
                is_broad: false,
                profile_specific: None,
            }],
        );
        let gatekeeper = Gatekeeper::with_interactivity(SecurityLevel::Strict, false, DenyAllPrompter);
        let (granted, flat, _) = orchestrator
            .grant_capabilities(&required, &gatekeeper, &Grant::new(), true)
            .unwrap();
        assert!(flat.iter().all(|c| granted.get("file").unwrap().contains(c)));
    }
}
