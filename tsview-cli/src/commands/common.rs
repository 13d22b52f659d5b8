//! Common types and utilities shared across CLI commands.

use std::io::Write;

use clap::Args;
use tsview::cache::{BulkProgress, BulkReport};
use tsview::config::ConfigFile;
use tsview::fetch::SeriesFrames;

use crate::error::CliError;

/// Preview rendering parameters shared by commands that fetch previews.
#[derive(Debug, Clone, Default, Args)]
pub struct PreviewArgs {
    /// Bin factor (1, 2, 4 or 8); defaults to preview.bin from config.ini
    #[arg(long)]
    pub bin: Option<u8>,

    /// Encoder quality (1-100); defaults to preview.quality from config.ini
    #[arg(long)]
    pub quality: Option<u8>,
}

impl PreviewArgs {
    /// Resolve bin and quality: CLI takes precedence, then config.
    pub fn resolve(&self, config: &ConfigFile) -> (u8, u8) {
        (
            self.bin.unwrap_or(config.preview.bin),
            self.quality.unwrap_or(config.preview.quality),
        )
    }
}

/// Keep only the requested series, in upstream order.
///
/// An empty selection keeps everything. Naming a series the upstream does
/// not list is an error.
pub fn select_series(
    all: Vec<SeriesFrames>,
    wanted: &[String],
) -> Result<Vec<SeriesFrames>, CliError> {
    if wanted.is_empty() {
        return Ok(all);
    }

    if let Some(missing) = wanted
        .iter()
        .find(|id| !all.iter().any(|s| &s.series_id == *id))
    {
        return Err(CliError::Config(format!(
            "Unknown tilt series '{}'",
            missing
        )));
    }

    Ok(all
        .into_iter()
        .filter(|s| wanted.contains(&s.series_id))
        .collect())
}

/// Print a single-line progress indicator to stderr.
pub fn print_progress(label: &str, progress: &BulkProgress) {
    eprint!(
        "\r{}: {}/{} ({:.0}%) {} failed",
        label,
        progress.completed,
        progress.total,
        progress.percent(),
        progress.failed
    );
    let _ = std::io::stderr().flush();
    if progress.completed == progress.total {
        eprintln!();
    }
}

/// Turn a bulk report into the command result.
pub fn finish_bulk(report: BulkReport) -> Result<(), CliError> {
    println!(
        "{} frames cached, {} failed, {} total",
        report.success, report.failed, report.total
    );
    if report.failed > 0 {
        return Err(CliError::Incomplete {
            failed: report.failed,
            total: report.total,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn series(id: &str, frames: u32) -> SeriesFrames {
        SeriesFrames::new(id, (0..frames).collect())
    }

    #[test]
    fn test_preview_args_prefer_cli() {
        let config = ConfigFile::default();
        let args = PreviewArgs {
            bin: Some(2),
            quality: None,
        };
        assert_eq!(args.resolve(&config), (2, config.preview.quality));
    }

    #[test]
    fn test_select_all_when_empty() {
        let all = vec![series("A", 2), series("B", 3)];
        assert_eq!(select_series(all.clone(), &[]).unwrap(), all);
    }

    #[test]
    fn test_select_subset() {
        let all = vec![series("A", 2), series("B", 3), series("C", 1)];
        let picked = select_series(all, &["C".to_string(), "A".to_string()]).unwrap();
        let ids: Vec<_> = picked.iter().map(|s| s.series_id.as_str()).collect();
        assert_eq!(ids, vec!["A", "C"]);
    }

    #[test]
    fn test_select_unknown_series() {
        let all = vec![series("A", 2)];
        assert!(matches!(
            select_series(all, &["Z".to_string()]),
            Err(CliError::Config(_))
        ));
    }

    #[test]
    fn test_finish_bulk_with_failures() {
        let report = BulkReport {
            success: 3,
            failed: 1,
            total: 4,
        };
        assert!(matches!(
            finish_bulk(report),
            Err(CliError::Incomplete { failed: 1, total: 4 })
        ));
    }
}
