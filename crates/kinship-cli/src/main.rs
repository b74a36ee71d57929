//! Kinship CLI - keeps relationships between contact documents consistent

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod commands;
mod config;
mod output;

use commands::{completions, curate, graph, sync, watch};
use config::Config;
use kinship_store::VaultStore;
use kinship_sync::{ProcessorRegistry, Settings, SyncEngine, SyncOptions};
use output::OutputFormat;

#[derive(Parser)]
#[command(name = "kinship")]
#[command(author, version, about = "Relationship consistency for markdown contact vaults")]
pub struct Cli {
    /// Vault directory (overrides the config file)
    #[arg(long, global = true, env = "KINSHIP_VAULT")]
    pub vault: Option<PathBuf>,

    /// Config file
    #[arg(short, long, global = true, env = "KINSHIP_CONFIG")]
    pub config: Option<PathBuf>,

    /// Output format: table, json
    #[arg(short, long, default_value = "table", global = true)]
    pub format: String,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    pub fn config_path(&self) -> PathBuf {
        self.config.clone().unwrap_or_else(config::config_file_path)
    }

    pub fn output(&self) -> OutputFormat {
        OutputFormat::from(self.format.as_str())
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Sync one document (and its peers) or the whole vault
    Sync(sync::SyncArgs),
    /// Report missing reciprocals, duplicates and orphaned edges
    Check,
    /// Check, then repair what the check found
    Fix,
    /// Run the curator pipeline
    Curate(curate::CurateArgs),
    /// Watch the vault and keep it consistent
    Watch(watch::WatchArgs),
    /// Print relationship edges
    Graph(graph::GraphArgs),
    /// Manage configuration
    Config(commands::config::ConfigArgs),
    /// Generate shell completions
    Completions(completions::CompletionsArgs),
}

/// Application context: config, vault store and sealed processor registry
pub struct AppContext {
    pub config: Config,
    pub store: Arc<VaultStore>,
    pub registry: Arc<ProcessorRegistry>,
    pub settings: Settings,
}

impl AppContext {
    pub fn new(cli: &Cli, config: Config) -> anyhow::Result<Self> {
        let vault = cli.vault.clone().unwrap_or_else(|| config.vault.clone());
        if !vault.is_dir() {
            anyhow::bail!("Vault not found at {}", vault.display());
        }
        // watcher events carry absolute paths
        let vault = vault.canonicalize()?;
        tracing::debug!("Using vault at: {:?}", vault);

        // a registry that fails to build is fatal
        let registry = ProcessorRegistry::standard()?;
        let settings = registry.settings(&config.processors)?;

        Ok(Self {
            config,
            store: Arc::new(VaultStore::new(vault)),
            registry: Arc::new(registry),
            settings,
        })
    }

    pub fn options(&self) -> SyncOptions {
        SyncOptions::default().with_prefer_stable_id(self.config.prefer_stable_id)
    }

    pub async fn engine(&self) -> anyhow::Result<SyncEngine> {
        let engine = SyncEngine::open(self.store.clone(), &self.config.heading, self.options()).await?;
        Ok(engine)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 if cli.quiet => "error",
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()))
        .init();

    tracing::debug!("Starting kinship CLI");

    match &cli.command {
        Commands::Config(args) => return commands::config::run(args, &cli.config_path()),
        Commands::Completions(args) => return completions::run(args),
        _ => {}
    }

    let config = Config::load_from(&cli.config_path())?;
    let ctx = AppContext::new(&cli, config)?;

    match &cli.command {
        Commands::Sync(args) => sync::run(args, &cli, &ctx).await?,
        Commands::Check => sync::run_check(&cli, &ctx).await?,
        Commands::Fix => sync::run_fix(&cli, &ctx).await?,
        Commands::Curate(args) => curate::run(args, &cli, &ctx).await?,
        Commands::Watch(args) => watch::run(args, &ctx).await?,
        Commands::Graph(args) => graph::run(args, &cli, &ctx).await?,
        Commands::Config(_) | Commands::Completions(_) => {}
    }

    Ok(())
}
