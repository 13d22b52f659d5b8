//! tsview CLI - Command-line interface
//!
//! Maintenance commands for the tilt-series preview cache: warm it up from
//! the preview service, refresh it, inspect and clear it.

mod commands;
mod error;
mod runner;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use commands::cache::CacheAction;
use commands::config::ConfigCommands;
use commands::get::GetArgs;
use commands::warm::BulkArgs;
use error::CliError;
use runner::{resolve_config_path, CliRunner};

#[derive(Parser)]
#[command(name = "tsview")]
#[command(version = tsview::VERSION)]
#[command(about = "Preview cache for tilt-series viewing", long_about = None)]
struct Cli {
    /// Use this config file instead of ~/.tsview/config.ini
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Mirror all log output to stderr
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage the preview cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },

    /// Cache every frame that is not cached yet
    Warm(BulkArgs),

    /// Clear the cache, then fetch every frame again
    Refresh(BulkArgs),

    /// Fetch one preview through the cache and save it
    Get(GetArgs),

    /// View or create the configuration file
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        e.exit();
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let Cli {
        config,
        verbose,
        command,
    } = cli;
    let runner = || CliRunner::new(config.as_deref(), verbose);

    match command {
        Commands::Cache { action } => commands::cache::run(&runner()?, action).await,
        Commands::Warm(args) => commands::warm::run_warm(&runner()?, args).await,
        Commands::Refresh(args) => commands::warm::run_refresh(&runner()?, args).await,
        Commands::Get(args) => commands::get::run(&runner()?, args).await,
        Commands::Config { command } => {
            commands::config::run(command, &resolve_config_path(config.as_deref()))
        }
    }
}
