//! CLI runner for common setup and operations.
//!
//! Encapsulates config loading, logging initialization, and construction of
//! the preview cache so command handlers stay small.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::info;
use tsview::cache::PreviewCache;
use tsview::config::{config_file_path, ConfigFile};
use tsview::fetch::HttpPreviewFetcher;
use tsview::logging::{init_logging, LoggingGuard};

use crate::error::CliError;

/// Runner that manages CLI lifecycle and common operations.
pub struct CliRunner {
    /// Keeps logging active while the runner exists
    #[allow(dead_code)]
    logging_guard: LoggingGuard,
    config: ConfigFile,
}

impl CliRunner {
    /// Load config and initialize logging.
    ///
    /// `config_path` overrides `~/.tsview/config.ini`.
    pub fn new(config_path: Option<&Path>, verbose: bool) -> Result<Self, CliError> {
        let config_path = resolve_config_path(config_path);
        let config = ConfigFile::load_from(&config_path)?;

        let logging_guard = init_logging(&config.logging.file, verbose)
            .map_err(|e| CliError::LoggingInit(e.to_string()))?;

        info!(
            version = tsview::VERSION,
            config = %config_path.display(),
            log = %logging_guard.log_file().display(),
            "tsview started"
        );

        Ok(Self {
            logging_guard,
            config,
        })
    }

    pub fn config(&self) -> &ConfigFile {
        &self.config
    }

    /// Create an HTTP client for the configured preview service.
    pub fn fetcher(&self) -> Result<HttpPreviewFetcher, CliError> {
        Ok(HttpPreviewFetcher::new(
            &self.config.upstream.base_url,
            self.config.upstream_timeout(),
        )?)
    }

    /// Open the preview cache described by the config.
    ///
    /// Periodic statistics logging is disabled; commands are short-lived.
    pub async fn open_cache(&self) -> Result<(PreviewCache, Arc<HttpPreviewFetcher>), CliError> {
        let fetcher = Arc::new(self.fetcher()?);
        let config = self.config.cache_config().with_stats_interval(0);
        let cache = PreviewCache::open(config, fetcher.clone()).await?;
        Ok((cache, fetcher))
    }
}

/// The config file to use: the override if given, else the default.
pub fn resolve_config_path(config_path: Option<&Path>) -> PathBuf {
    config_path
        .map(Path::to_path_buf)
        .unwrap_or_else(config_file_path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_config_path_override() {
        let path = resolve_config_path(Some(Path::new("/etc/tsview.ini")));
        assert_eq!(path, PathBuf::from("/etc/tsview.ini"));
    }

    #[test]
    fn test_resolve_config_path_default() {
        assert_eq!(resolve_config_path(None), config_file_path());
    }
}
