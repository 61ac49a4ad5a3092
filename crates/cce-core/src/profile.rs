//! The profile-reading contract.
//!
//! Profile YAML parsing and filter-expression compilation are external
//! collaborators (out of scope for this crate, per the engine
//! specification); this module defines only the shape a compiled
//! profile must expose to the orchestrator and the engine.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::Result;

/// A single observation within a control: a named plugin invocation
/// with an untyped configuration mapping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservationDefinition {
    /// Name of the plugin to invoke.
    pub plugin: String,

    /// Untyped configuration passed to the plugin's `observe`.
    #[serde(default)]
    pub config: HashMap<String, serde_json::Value>,
}

/// A control groups one or more observations under an identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Control {
    /// Stable identifier referenced by filter expressions.
    pub id: String,

    /// Human-readable title.
    pub name: String,

    /// Observations that make up this control.
    pub observations: Vec<ObservationDefinition>,
}

/// A plugin declaration as it appears in the profile's `plugins:` list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginDeclaration {
    /// The plugin's declared name.
    pub name: String,

    /// Version constraint or pin, as written in the profile.
    #[serde(default)]
    pub version: Option<String>,
}

/// The external contract the orchestrator and engine consume. Profile
/// YAML parsing and filter-expression compilation live outside this
/// crate; any type implementing this trait can stand in for a loaded
/// profile.
pub trait ProfileReader {
    /// Return the plugins declared by the profile.
    fn get_plugins(&self) -> Result<Vec<PluginDeclaration>>;

    /// Return every control defined by the profile, irrespective of
    /// any filter the caller will later apply.
    fn get_all_controls(&self) -> Result<Vec<Control>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StaticProfile {
        plugins: Vec<PluginDeclaration>,
        controls: Vec<Control>,
    }

    impl ProfileReader for StaticProfile {
        fn get_plugins(&self) -> Result<Vec<PluginDeclaration>> {
            Ok(self.plugins.clone())
        }

        fn get_all_controls(&self) -> Result<Vec<Control>> {
            Ok(self.controls.clone())
        }
    }

    #[test]
    fn profile_reader_trait_object_is_usable() {
        let profile = StaticProfile {
            plugins: vec![PluginDeclaration {
                name: "file".to_string(),
                version: None,
            }],
            controls: vec![Control {
                id: "c1".to_string(),
                name: "check something".to_string(),
                observations: vec![ObservationDefinition {
                    plugin: "file".to_string(),
                    config: HashMap::new(),
                }],
            }],
        };

        let reader: &dyn ProfileReader = &profile;
        assert_eq!(reader.get_plugins().unwrap().len(), 1);
        assert_eq!(reader.get_all_controls().unwrap().len(), 1);
    }
}
