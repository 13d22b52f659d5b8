//! Core types for the preview cache: errors and configuration.

use std::path::PathBuf;
use thiserror::Error;

use crate::fetch::FetchError;

/// Default memory tier capacity (2 GB).
pub const DEFAULT_MEMORY_CAPACITY: u64 = 2 * 1024 * 1024 * 1024;

/// Default durable tier capacity (10 GB).
pub const DEFAULT_DURABLE_CAPACITY: u64 = 10 * 1024 * 1024 * 1024;

/// Default number of simultaneous fetches during bulk operations.
pub const DEFAULT_BULK_CONCURRENCY: usize = 4;

/// Default interval between periodic statistics log lines.
pub const DEFAULT_STATS_INTERVAL_SECS: u64 = 60;

/// Cache-related errors.
#[derive(Debug, Error)]
pub enum CacheError {
    /// I/O error in the durable tier
    #[error("Cache I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Series identifier unusable as a key segment
    #[error("Invalid series identifier '{series_id}': {reason}")]
    InvalidSeries {
        series_id: String,
        reason: &'static str,
    },

    /// Bin factor outside the supported set
    #[error("Unsupported bin factor {0} - must be one of 1, 2, 4, 8")]
    InvalidBin(u8),

    /// Quality outside 1..=100
    #[error("Invalid quality {0} - must be between 1 and 100")]
    InvalidQuality(u8),

    /// Upstream preview fetch failed
    #[error("Preview fetch failed: {0}")]
    Fetch(#[from] FetchError),

    /// The task performing a deduplicated fetch ended without a result
    #[error("Preview fetch for {0} ended without a result")]
    FetchAbandoned(String),

    /// Blocking or spawned task failure
    #[error("Background task failed: {0}")]
    Task(String),

    /// Invalid cache configuration
    #[error("Invalid cache configuration: {0}")]
    InvalidConfig(String),
}

/// Memory tier configuration.
#[derive(Debug, Clone)]
pub struct MemoryTierConfig {
    /// Maximum resident bytes (default: 2 GB)
    pub max_size_bytes: u64,
}

impl Default for MemoryTierConfig {
    fn default() -> Self {
        Self {
            max_size_bytes: DEFAULT_MEMORY_CAPACITY,
        }
    }
}

/// Durable tier configuration.
#[derive(Debug, Clone)]
pub struct DurableTierConfig {
    /// Root directory of the on-disk store
    pub directory: PathBuf,
    /// Maximum resident bytes (default: 10 GB)
    pub max_size_bytes: u64,
}

impl Default for DurableTierConfig {
    fn default() -> Self {
        Self {
            directory: default_cache_directory(),
            max_size_bytes: DEFAULT_DURABLE_CAPACITY,
        }
    }
}

/// Complete preview cache configuration.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Memory tier settings
    pub memory: MemoryTierConfig,
    /// Durable tier settings
    pub durable: DurableTierConfig,
    /// Simultaneous fetches per bulk batch
    pub bulk_concurrency: usize,
    /// Seconds between statistics log lines (0 disables)
    pub stats_interval_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            memory: MemoryTierConfig::default(),
            durable: DurableTierConfig::default(),
            bulk_concurrency: DEFAULT_BULK_CONCURRENCY,
            stats_interval_secs: DEFAULT_STATS_INTERVAL_SECS,
        }
    }
}

impl CacheConfig {
    /// Create a configuration rooted at the given directory.
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            durable: DurableTierConfig {
                directory: directory.into(),
                ..DurableTierConfig::default()
            },
            ..Self::default()
        }
    }

    /// Set memory tier capacity in bytes.
    pub fn with_memory_size(mut self, size: u64) -> Self {
        self.memory.max_size_bytes = size;
        self
    }

    /// Set durable tier capacity in bytes.
    pub fn with_durable_size(mut self, size: u64) -> Self {
        self.durable.max_size_bytes = size;
        self
    }

    /// Set the bulk batch width.
    pub fn with_bulk_concurrency(mut self, width: usize) -> Self {
        self.bulk_concurrency = width;
        self
    }

    /// Set the statistics logging interval in seconds (0 disables).
    pub fn with_stats_interval(mut self, secs: u64) -> Self {
        self.stats_interval_secs = secs;
        self
    }

    /// Reject configurations the cache cannot run with.
    pub fn validate(&self) -> Result<(), CacheError> {
        if self.bulk_concurrency == 0 {
            return Err(CacheError::InvalidConfig(
                "bulk_concurrency must be at least 1".to_string(),
            ));
        }
        if self.durable.directory.as_os_str().is_empty() {
            return Err(CacheError::InvalidConfig(
                "durable cache directory must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Platform cache directory for previews (`~/.cache/tsview/previews` on Linux).
pub fn default_cache_directory() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("tsview")
        .join("previews")
}
