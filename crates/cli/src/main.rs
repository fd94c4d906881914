//! edeXa Names command line interface
//!
//! Claims `.edx` names through a JSON-RPC endpoint that can sign for the
//! connected account, or against an in-process simulated chain.

mod commands;
mod config;

use crate::config::{AppConfig, LogFormat};
use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "edx-names")]
#[command(about = "Check and claim .edx names on the edeXa network", long_about = None)]
#[command(version)]
struct Cli {
    /// JSON-RPC endpoint URL (overrides config)
    #[arg(long, alias = "rpc", global = true)]
    rpc_url: Option<String>,

    /// Configuration file (TOML, YAML or JSON)
    #[arg(long, short = 'c', value_name = "PATH", global = true)]
    config: Option<PathBuf>,

    /// Log filter, e.g. `info` or `edx_registrar=debug`
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[arg(long, value_enum, global = true)]
    log_format: Option<LogFormat>,

    /// Use an in-process simulated chain instead of an RPC endpoint
    #[arg(long, global = true)]
    simulate: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Validate a name locally without touching the chain
    Validate {
        name: String,
    },
    /// List the networks with known deployments
    Networks,
    /// Show the connected account, network and primary name
    Whoami,
    /// Look up who owns a name
    Check {
        name: String,
    },
    /// Commit to a name, wait out the reveal delay, then register it
    Claim {
        name: String,
    },
}

fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    match config.log_format {
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init(),
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init(),
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();

    let mut config = AppConfig::load(cli.config.as_deref())?;
    if let Some(rpc_url) = cli.rpc_url {
        config.rpc_url = rpc_url;
    }
    if let Some(level) = cli.log_level {
        config.log_level = level;
    }
    if let Some(format) = cli.log_format {
        config.log_format = format;
    }
    init_logging(&config);

    match cli.command {
        Commands::Validate { name } => commands::validate(&config, &name),
        Commands::Networks => {
            commands::networks(&config);
            Ok(())
        }
        Commands::Whoami => commands::whoami(&commands::backend(&config, cli.simulate)?).await,
        Commands::Check { name } => {
            commands::check(&commands::backend(&config, cli.simulate)?, &name).await
        }
        Commands::Claim { name } => {
            commands::claim(&commands::backend(&config, cli.simulate)?, &name).await
        }
    }
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("Error: {err:#}");
        std::process::exit(1);
    }
}
