//! CLI argument definitions.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

/// The compliance-check engine: loads a profile, resolves its
/// plugins, and runs their observations under a capability-mediated
/// sandbox.
#[derive(Parser, Debug)]
#[command(name = "cce")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to the compiled profile YAML file.
    #[arg(short = 'p', long, env = "CCE_PROFILE")]
    pub profile: PathBuf,

    /// Directory holding locally available plugin bytecode, bypassing
    /// auto-detection.
    #[arg(long, env = "CCE_PLUGIN_DIR")]
    pub plugin_dir: Option<PathBuf>,

    /// Path to a layered configuration file.
    #[arg(short = 'c', long, env = "CCE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Path to the per-user capability grant store, overriding the
    /// OS-appropriate default.
    #[arg(long, env = "CCE_CAPABILITY_STORE")]
    pub capability_store: Option<PathBuf>,

    /// Path to the lockfile, overriding `<profile-dir>/<product>.lock`.
    #[arg(long, env = "CCE_LOCKFILE")]
    pub lockfile: Option<PathBuf>,

    /// Security level governing how missing capabilities are
    /// reconciled: `strict`, `standard`, or `permissive`. Falls back to
    /// the config file's `security_level`, then `standard`, when unset.
    #[arg(long, env = "CCE_SECURITY_LEVEL")]
    pub security_level: Option<String>,

    /// Grant every required capability without consulting the store
    /// or prompting. Required for non-interactive runs.
    #[arg(long, env = "CCE_TRUST")]
    pub trust: bool,

    /// Per-observation memory ceiling in megabytes. Unset means
    /// unlimited.
    #[arg(long, env = "CCE_MEMORY_LIMIT_MB")]
    pub memory_limit_mb: Option<u64>,

    /// Per-observation wall-clock deadline in seconds.
    #[arg(long, env = "CCE_TIME_LIMIT_SECS", default_value = "30")]
    pub time_limit_secs: u64,

    /// Per-observation host-call budget.
    #[arg(long, env = "CCE_MAX_CALLS", default_value = "10000")]
    pub max_calls: u64,

    /// Per-observation wasmtime fuel budget.
    #[arg(long, env = "CCE_FUEL", default_value = "1000000000")]
    pub fuel: u64,

    /// Restrict execution to controls matching one of these glob
    /// patterns or literal ids. May be passed more than once.
    #[arg(long = "filter", env = "CCE_FILTER", value_delimiter = ',')]
    pub filters: Vec<String>,

    /// Bound on observations executed concurrently within one
    /// control. `0` means unbounded.
    #[arg(long, env = "CCE_MAX_CONCURRENT_OBSERVATIONS", default_value = "4")]
    pub max_concurrent_observations: usize,

    /// Bound on controls executed concurrently. `0` means unbounded.
    #[arg(long, env = "CCE_MAX_CONCURRENT_CONTROLS", default_value = "4")]
    pub max_concurrent_controls: usize,

    /// Run capability collection and granting, then stop before any
    /// observation actually executes.
    #[arg(long, env = "CCE_DRY_RUN")]
    pub dry_run: bool,

    /// How to render the execution summary.
    #[arg(long, value_enum, env = "CCE_OUTPUT", default_value = "text")]
    pub output: OutputFormat,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, env = "CCE_LOG", default_value = "info")]
    pub log_level: String,

    /// Log format (pretty, json, compact).
    #[arg(long, env = "CCE_LOG_FORMAT", default_value = "pretty")]
    pub log_format: String,

    /// Log file path. Defaults to stderr when unset.
    #[arg(long, env = "CCE_LOG_FILE")]
    pub log_file: Option<PathBuf>,

    /// Subcommand. Defaults to `check` when omitted.
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// How the execution summary should be rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// A human-readable control-by-control report.
    Text,
    /// The `ExecutionSummary` serialized as JSON.
    Json,
}

/// Available subcommands. A bare invocation with no subcommand runs
/// `check`.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the profile's controls and print a summary (the default).
    Check,

    /// Run capability collection and print what would be granted,
    /// without executing any observation. Equivalent to `--dry-run`.
    Plan,

    /// Capability-grant store management.
    Grants {
        #[command(subcommand)]
        action: GrantCommands,
    },
}

/// Grant-store inspection and maintenance commands.
#[derive(Subcommand, Debug)]
pub enum GrantCommands {
    /// List every capability currently persisted.
    List,

    /// Delete the persisted grant store, forcing every capability to
    /// be re-prompted or re-trusted on the next run.
    Clear,
}
