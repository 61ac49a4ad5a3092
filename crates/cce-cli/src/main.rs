//! Entry point: parses CLI flags, assembles a run configuration, and
//! drives one `cce_engine::Engine::run` invocation.

mod cli;
mod config;
mod error;
mod logging;
mod output;
mod profile;
mod prompt;
mod registry;

use std::io::Write;
use std::process::ExitCode;
use std::sync::Arc;

use cce_capability::{CapabilityStore, Gatekeeper};
use cce_plugin::resolver::{CacheResolver, EmbeddedResolver, RegistryResolver, ResolverChain};
use cce_plugin::{CacheRepository, RejectAllVerifier};
use clap::Parser;
use tracing::{info, warn};

use cli::{Cli, Commands, GrantCommands};
use config::Config;
use error::{Error, Result};
use profile::YamlProfile;
use prompt::TerminalPrompter;
use registry::{HttpRegistryClient, NullRegistryClient};

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => code,
        Err(e) => {
            let _ = writeln!(std::io::stderr(), "error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<ExitCode> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let config = Config::from_cli(&cli)?;
    config.log.init()?;

    match cli.command.as_ref().unwrap_or(&Commands::Check) {
        Commands::Grants { action } => run_grants(&config, action),
        Commands::Check | Commands::Plan => run_check(&cli, config).await,
    }
}

fn run_grants(config: &Config, action: &GrantCommands) -> Result<ExitCode> {
    let store = CapabilityStore::at_path(&config.capability_store_path);
    match action {
        GrantCommands::List => {
            let grant = store.load()?;
            let stdout = std::io::stdout();
            let mut out = stdout.lock();
            for cap in grant.iter() {
                writeln!(out, "{} {}", cap.kind, cap.pattern)?;
            }
            Ok(ExitCode::SUCCESS)
        }
        GrantCommands::Clear => {
            store.save(&cce_capability::Grant::new())?;
            info!(path = %config.capability_store_path.display(), "cleared capability store");
            Ok(ExitCode::SUCCESS)
        }
    }
}

async fn run_check(cli: &Cli, mut config: Config) -> Result<ExitCode> {
    let profile = YamlProfile::load(&cli.profile)?;
    config.engine.product = profile.product().to_string();
    if cli.command.as_ref().is_some_and(|c| matches!(c, Commands::Plan)) {
        config.engine.dry_run = true;
    }

    let cache_dir = cache_directory()?;
    let cache_repository = Arc::new(CacheRepository::new(cache_dir));
    let registry_client: Arc<dyn cce_plugin::resolver::RegistryClient> = match &config.registry_url {
        Some(url) => Arc::new(HttpRegistryClient::new(url)),
        None => Arc::new(NullRegistryClient),
    };
    let resolver_chain = ResolverChain::standard(
        EmbeddedResolver::new(std::collections::HashMap::new()),
        CacheResolver::new(cache_repository.clone()),
        RegistryResolver::new(registry_client, cache_repository, Arc::new(RejectAllVerifier), false),
    );

    let store = CapabilityStore::at_path(&config.capability_store_path);
    let persisted = store.load()?;

    let gatekeeper = Gatekeeper::new(config.security_level, TerminalPrompter);

    let engine = cce_engine::Engine::new(config.engine);
    let outcome = engine.run(&profile, &profile.dir(), &resolver_chain, &gatekeeper, &persisted)?;

    if outcome.granted_store_dirty {
        store.save(&outcome.granted)?;
        warn!(path = %config.capability_store_path.display(), "capability store updated");
    }

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    output::render(&mut out, cli.output, &outcome.summary)?;

    let exit = if outcome.summary.errored > 0 || outcome.summary.failed > 0 {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    };
    Ok(exit)
}

fn cache_directory() -> Result<std::path::PathBuf> {
    let dirs = directories::ProjectDirs::from("", "", "cce")
        .ok_or_else(|| Error::configuration("could not determine a user cache directory"))?;
    Ok(dirs.cache_dir().join("plugins"))
}
