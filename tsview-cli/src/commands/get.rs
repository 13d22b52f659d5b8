//! Fetch a single preview through the cache.

use std::path::PathBuf;

use clap::Args;
use tsview::cache::PreviewKey;
use tsview::config::format_size;

use super::common::PreviewArgs;
use crate::error::CliError;
use crate::runner::CliRunner;

/// Arguments for `get`.
#[derive(Debug, Args)]
pub struct GetArgs {
    /// Tilt series identifier
    pub series: String,

    /// Frame index within the series
    pub frame: u32,

    /// Where to write the PNG
    #[arg(long, short)]
    pub output: PathBuf,

    #[command(flatten)]
    pub preview: PreviewArgs,
}

/// Load one preview, from cache when possible, and write it to disk.
pub async fn run(runner: &CliRunner, args: GetArgs) -> Result<(), CliError> {
    let (bin, quality) = args.preview.resolve(runner.config());
    let key = PreviewKey::new(args.series, args.frame, bin, quality)?;

    let (cache, _) = runner.open_cache().await?;
    let cached = cache.memory().contains(&key) || cache.durable().contains(&key);
    let data = cache.load(&key).await?;

    std::fs::write(&args.output, &data).map_err(|error| CliError::FileWrite {
        path: args.output.display().to_string(),
        error,
    })?;

    println!(
        "{} -> {} ({}, {})",
        key,
        args.output.display(),
        format_size(data.len() as u64),
        if cached { "cached" } else { "fetched" }
    );
    Ok(())
}
