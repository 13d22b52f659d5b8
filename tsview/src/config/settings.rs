//! Settings structs for all configuration sections.
//!
//! Each struct represents one `[section]` of the INI config file.
//! These are pure data types with no parsing or serialization logic.

use std::path::PathBuf;

/// Complete application configuration loaded from config.ini.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigFile {
    /// Preview cache settings
    pub cache: CacheSettings,
    /// Upstream preview service settings
    pub upstream: UpstreamSettings,
    /// Default preview rendering parameters
    pub preview: PreviewSettings,
    /// Logging settings
    pub logging: LoggingSettings,
}

/// Cache configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheSettings {
    /// Durable tier directory
    pub directory: PathBuf,
    /// Memory tier size in bytes
    pub memory_size: u64,
    /// Durable tier size in bytes
    pub disk_size: u64,
    /// Simultaneous fetches during bulk warm-up and refresh
    pub bulk_concurrency: usize,
}

/// Upstream preview service configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct UpstreamSettings {
    /// Base URL of the preview service
    pub base_url: String,
    /// Request timeout in seconds
    pub timeout: u64,
}

/// Preview rendering defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct PreviewSettings {
    /// Bin factor: 1, 2, 4 or 8
    pub bin: u8,
    /// Encoder quality, 1-100
    pub quality: u8,
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct LoggingSettings {
    /// Log file path
    pub file: PathBuf,
}
