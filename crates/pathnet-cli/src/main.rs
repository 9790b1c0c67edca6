//! Pathnet CLI - serve and query entity paths and networks

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod commands;
mod config;
mod output;

use commands::{completions, config as config_cmd, query, serve};
use config::{config_file_path, Config};
use pathnet_core::{EntityGraphService, ResolutionEngine, ServerInfo};
use pathnet_engine::MemoryEngine;

#[derive(Parser)]
#[command(name = "pathnet")]
#[command(author, version, about = "Entity path and network queries over a resolution engine")]
pub struct Cli {
    /// Config file
    #[arg(short, long, global = true, env = "PATHNET_CONFIG")]
    pub config: Option<PathBuf>,

    /// Graph fixture for the in-memory engine (overrides the config file)
    #[arg(long, global = true, env = "PATHNET_FIXTURE")]
    pub fixture: Option<PathBuf>,

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
    /// Config file in use
    pub fn config_path(&self) -> PathBuf {
        self.config.clone().unwrap_or_else(config_file_path)
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP server
    Serve(serve::ServeArgs),
    /// Find the shortest path between two entities
    Path(query::PathArgs),
    /// Find the network around a set of entities
    Network(query::NetworkArgs),
    /// Manage configuration
    Config(config_cmd::ConfigArgs),
    /// Generate shell completions
    Completions(completions::CompletionsArgs),
}

/// Application context: effective configuration and the query service
pub struct AppContext {
    pub config: Config,
    pub service: EntityGraphService<dyn ResolutionEngine>,
}

impl AppContext {
    pub fn new(cli: &Cli, config: Config) -> anyhow::Result<Self> {
        let fixture = cli
            .fixture
            .clone()
            .or_else(|| config.engine.fixture.clone())
            .context("No graph fixture configured; pass --fixture or set [engine] fixture")?;
        tracing::debug!("Using fixture at: {:?}", fixture);

        let engine = MemoryEngine::from_path(&fixture)
            .with_context(|| format!("Failed to load fixture {}", fixture.display()))?;

        let data_sources = engine
            .data_sources()
            .iter()
            .chain(config.data_sources.iter())
            .cloned()
            .collect::<Vec<_>>();
        let server = ServerInfo::new(data_sources)
            .with_native_api(engine.native_api_info())
            .with_class_overrides(config.features.clone());

        let engine: Arc<dyn ResolutionEngine> = Arc::new(engine);
        Ok(Self {
            service: EntityGraphService::new(engine, Arc::new(server)),
            config,
        })
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

    tracing::debug!("Starting pathnet CLI");

    match &cli.command {
        Commands::Config(args) => return config_cmd::run(args, &cli),
        Commands::Completions(args) => return completions::run(args),
        _ => {}
    }

    let config = Config::load_from(&cli.config_path())?;
    let ctx = AppContext::new(&cli, config)?;

    match &cli.command {
        Commands::Serve(args) => serve::run(args, &ctx).await?,
        Commands::Path(args) => query::run_path(args, &ctx)?,
        Commands::Network(args) => query::run_network(args, &ctx)?,
        Commands::Config(_) | Commands::Completions(_) => {}
    }

    Ok(())
}
