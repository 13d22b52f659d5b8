//! Configuration file handling for ~/.tsview/config.ini.
//!
//! Settings structs live in [`super::settings`], constants in [`super::defaults`],
//! parsing in [`super::parser`], and serialization in [`super::writer`].

use std::path::{Path, PathBuf};
use std::time::Duration;

use ini::Ini;
use thiserror::Error;

use super::settings::ConfigFile;
use crate::cache::CacheConfig;

/// Configuration file errors.
#[derive(Debug, Error)]
pub enum ConfigFileError {
    /// Failed to read config file
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] ini::Error),

    /// Failed to write config file
    #[error("Failed to write config file: {0}")]
    WriteError(String),

    /// Invalid configuration value
    #[error("Invalid configuration: {section}.{key} = '{value}' - {reason}")]
    InvalidValue {
        section: String,
        key: String,
        value: String,
        reason: String,
    },

    /// Failed to create config directory
    #[error("Failed to create config directory: {0}")]
    DirectoryError(std::io::Error),
}

impl ConfigFile {
    /// Load configuration from the default path (~/.tsview/config.ini).
    pub fn load() -> Result<Self, ConfigFileError> {
        Self::load_from(&config_file_path())
    }

    /// Load configuration from a specific path.
    ///
    /// If the file doesn't exist, returns defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigFileError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let ini = Ini::load_from_file(path)?;
        super::parser::parse_ini(&ini)
    }

    /// Save configuration to a specific path.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigFileError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(ConfigFileError::DirectoryError)?;
        }

        let content = super::writer::to_config_string(self);
        std::fs::write(path, content).map_err(|e| ConfigFileError::WriteError(e.to_string()))
    }

    /// Render the configuration as INI text, in the same form `save_to` writes.
    pub fn to_ini_string(&self) -> String {
        super::writer::to_config_string(self)
    }

    /// Write a default config file at `path` unless one exists.
    ///
    /// Returns whether a file was created.
    pub fn ensure_exists_at(path: &Path) -> Result<bool, ConfigFileError> {
        if path.exists() {
            return Ok(false);
        }
        Self::default().save_to(path)?;
        Ok(true)
    }

    /// Cache configuration described by the `[cache]` section.
    pub fn cache_config(&self) -> CacheConfig {
        CacheConfig::new(&self.cache.directory)
            .with_memory_size(self.cache.memory_size)
            .with_durable_size(self.cache.disk_size)
            .with_bulk_concurrency(self.cache.bulk_concurrency)
    }

    /// Upstream request timeout.
    pub fn upstream_timeout(&self) -> Duration {
        Duration::from_secs(self.upstream.timeout)
    }
}

/// Get the path to the config directory (~/.tsview).
pub fn config_directory() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".tsview")
}

/// Get the path to the config file (~/.tsview/config.ini).
pub fn config_file_path() -> PathBuf {
    config_directory().join("config.ini")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::defaults::*;

    #[test]
    fn test_default_config() {
        let config = ConfigFile::default();

        assert_eq!(config.cache.memory_size, DEFAULT_MEMORY_CACHE_SIZE);
        assert_eq!(config.cache.disk_size, DEFAULT_DISK_CACHE_SIZE);
        assert_eq!(config.cache.bulk_concurrency, 4);
        assert_eq!(config.upstream.base_url, "http://127.0.0.1:8000");
        assert_eq!(config.upstream.timeout, 60);
        assert_eq!(config.preview.bin, 8);
        assert_eq!(config.preview.quality, 90);
    }

    #[test]
    fn test_load_nonexistent_returns_defaults() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let config = ConfigFile::load_from(&temp_dir.path().join("nonexistent.ini")).unwrap();
        assert_eq!(config, ConfigFile::default());
    }

    #[test]
    fn test_save_and_load() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("config.ini");

        let mut config = ConfigFile::default();
        config.cache.disk_size = 3 * 1024 * 1024 * 1024;
        config.preview.quality = 50;
        config.save_to(&path).unwrap();

        assert_eq!(ConfigFile::load_from(&path).unwrap(), config);
    }

    #[test]
    fn test_ensure_exists_at_does_not_overwrite() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let path = temp_dir.path().join("config.ini");

        assert!(ConfigFile::ensure_exists_at(&path).unwrap());
        std::fs::write(&path, "[preview]\nbin = 2\n").unwrap();
        assert!(!ConfigFile::ensure_exists_at(&path).unwrap());

        assert_eq!(ConfigFile::load_from(&path).unwrap().preview.bin, 2);
    }

    #[test]
    fn test_cache_config_conversion() {
        let mut config = ConfigFile::default();
        config.cache.directory = "/data/previews".into();
        config.cache.memory_size = 1000;
        config.cache.disk_size = 5000;
        config.cache.bulk_concurrency = 2;

        let cache = config.cache_config();
        assert_eq!(cache.durable.directory, PathBuf::from("/data/previews"));
        assert_eq!(cache.memory.max_size_bytes, 1000);
        assert_eq!(cache.durable.max_size_bytes, 5000);
        assert_eq!(cache.bulk_concurrency, 2);
    }
}
