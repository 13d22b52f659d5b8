//! User configuration for tsview.
//!
//! Configuration lives in an INI file (`~/.tsview/config.ini` by default).
//! A missing file yields defaults; every present value is validated and a
//! bad one is reported with its section and key.
//!
//! # Example
//!
//! ```
//! use tsview::config::ConfigFile;
//!
//! let config = ConfigFile::default();
//! let cache = config.cache_config();
//! assert_eq!(cache.bulk_concurrency, 4);
//! ```

mod defaults;
mod file;
mod parser;
mod settings;
mod size;
mod writer;

pub use defaults::{
    default_log_file, DEFAULT_DISK_CACHE_SIZE, DEFAULT_LOG_FILE_NAME, DEFAULT_MEMORY_CACHE_SIZE,
    DEFAULT_UPSTREAM_TIMEOUT_SECS,
};
pub use file::{config_directory, config_file_path, ConfigFileError};
pub use settings::{CacheSettings, ConfigFile, LoggingSettings, PreviewSettings, UpstreamSettings};
pub use size::{format_size, parse_size, Size, SizeParseError};
