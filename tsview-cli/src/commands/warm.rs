//! Bulk warm-up and refresh commands.
//!
//! Both ask the preview service for its tilt series and then run every frame
//! through the cache, a few at a time.

use clap::Args;
use tracing::info;

use super::common::{finish_bulk, print_progress, select_series, PreviewArgs};
use crate::error::CliError;
use crate::runner::CliRunner;

/// Arguments shared by `warm` and `refresh`.
#[derive(Debug, Args)]
pub struct BulkArgs {
    /// Limit to this tilt series (repeatable); all series when omitted
    #[arg(long = "series")]
    pub series: Vec<String>,

    #[command(flatten)]
    pub preview: PreviewArgs,
}

/// Cache every frame that is not cached yet.
pub async fn run_warm(runner: &CliRunner, args: BulkArgs) -> Result<(), CliError> {
    let (cache, fetcher) = runner.open_cache().await?;
    let (bin, quality) = args.preview.resolve(runner.config());

    let series = select_series(fetcher.list_series().await?, &args.series)?;
    info!(series = series.len(), bin, quality, "Warming preview cache");

    let report = cache
        .bulk_cache_all(&series, bin, quality, |p| print_progress("Caching", p))
        .await;
    finish_bulk(report)
}

/// Drop everything cached and fetch every frame again.
pub async fn run_refresh(runner: &CliRunner, args: BulkArgs) -> Result<(), CliError> {
    let (cache, fetcher) = runner.open_cache().await?;
    let (bin, quality) = args.preview.resolve(runner.config());

    // List first so an unreachable service leaves the cache untouched
    let series = select_series(fetcher.list_series().await?, &args.series)?;
    info!(series = series.len(), bin, quality, "Refreshing preview cache");

    let report = cache
        .refresh_all(&series, bin, quality, |p| print_progress("Refreshing", p))
        .await;
    finish_bulk(report)
}
