//! Cache management CLI commands.

use clap::Subcommand;
use tsview::config::format_size;

use crate::error::CliError;
use crate::runner::CliRunner;

/// Cache action subcommands.
#[derive(Debug, Subcommand)]
pub enum CacheAction {
    /// Remove cached previews from both tiers
    Clear {
        /// Only remove previews of this tilt series
        #[arg(long)]
        series: Option<String>,
    },
    /// Show cache statistics
    Stats,
}

/// Run a cache subcommand.
pub async fn run(runner: &CliRunner, action: CacheAction) -> Result<(), CliError> {
    let (cache, _) = runner.open_cache().await?;
    let directory = &cache.config().durable.directory;

    match action {
        CacheAction::Clear { series: Some(series) } => {
            let before = cache.sizes().durable_bytes;
            cache.clear_for_series(&series).await?;
            let freed = before.saturating_sub(cache.sizes().durable_bytes);
            println!("Cleared previews of '{}', freed {}", series, format_size(freed));
            Ok(())
        }
        CacheAction::Clear { series: None } => {
            println!("Clearing preview cache at: {}", directory.display());
            let entries = cache.durable().entry_count();
            let bytes = cache.sizes().durable_bytes;
            cache.clear().await;
            println!("Deleted {} previews, freed {}", entries, format_size(bytes));
            Ok(())
        }
        CacheAction::Stats => {
            println!("Preview cache: {}", directory.display());
            println!(
                "  Limits: memory {}, disk {}",
                format_size(cache.memory().max_size_bytes()),
                format_size(cache.durable().max_size_bytes())
            );
            println!(
                "  Disk usage: {} ({})",
                format_size(cache.sizes().durable_bytes),
                cache.durable_usage()
            );
            println!();
            print!("{}", cache.stats().format());
            Ok(())
        }
    }
}
