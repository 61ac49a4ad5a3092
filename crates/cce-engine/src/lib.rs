//! # CCE Engine
//!
//! The orchestrating use case: loads a compiled profile, resolves its
//! declared plugins, stages them into a sandbox directory, collects
//! and grants the capabilities they need, and runs their observations
//! to produce a summarized result.

pub mod error;
pub mod evidence;
pub mod filter;
pub mod local_resolver;
pub mod lockfile_store;
pub mod plugin_dir;
pub mod plugin_host;
pub mod staging;
pub mod summary;
pub mod usecase;

pub use error::{Error, Result};
pub use evidence::{Evidence, ObservationState, Outcome};
pub use filter::ControlFilter;
pub use local_resolver::LocalDirResolver;
pub use lockfile_store::LockfileStore;
pub use plugin_host::PluginHost;
pub use staging::StagedPlugins;
pub use summary::{control_outcome, ControlResult, ExecutionSummary, ObservationResult};
pub use usecase::{Engine, EngineConfig, EngineOutcome};
