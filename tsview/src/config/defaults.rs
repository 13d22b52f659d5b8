//! Default values and constants for all configuration settings.

use std::path::PathBuf;

use super::settings::*;
use crate::cache::{
    default_cache_directory, DEFAULT_BIN, DEFAULT_BULK_CONCURRENCY, DEFAULT_DURABLE_CAPACITY,
    DEFAULT_MEMORY_CAPACITY, DEFAULT_QUALITY,
};
use crate::fetch::{DEFAULT_BASE_URL, DEFAULT_TIMEOUT_SECS};

/// Default memory tier size (2GB).
pub const DEFAULT_MEMORY_CACHE_SIZE: u64 = DEFAULT_MEMORY_CAPACITY;

/// Default durable tier size (10GB).
pub const DEFAULT_DISK_CACHE_SIZE: u64 = DEFAULT_DURABLE_CAPACITY;

/// Default upstream request timeout in seconds.
pub const DEFAULT_UPSTREAM_TIMEOUT_SECS: u64 = DEFAULT_TIMEOUT_SECS;

/// Default log file name, placed in the config directory.
pub const DEFAULT_LOG_FILE_NAME: &str = "tsview.log";

/// Default log file path (~/.tsview/tsview.log).
pub fn default_log_file() -> PathBuf {
    super::file::config_directory().join(DEFAULT_LOG_FILE_NAME)
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            cache: CacheSettings {
                directory: default_cache_directory(),
                memory_size: DEFAULT_MEMORY_CACHE_SIZE,
                disk_size: DEFAULT_DISK_CACHE_SIZE,
                bulk_concurrency: DEFAULT_BULK_CONCURRENCY,
            },
            upstream: UpstreamSettings {
                base_url: DEFAULT_BASE_URL.to_string(),
                timeout: DEFAULT_UPSTREAM_TIMEOUT_SECS,
            },
            preview: PreviewSettings {
                bin: DEFAULT_BIN,
                quality: DEFAULT_QUALITY,
            },
            logging: LoggingSettings {
                file: default_log_file(),
            },
        }
    }
}
