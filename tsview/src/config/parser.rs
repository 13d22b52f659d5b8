//! INI parsing logic for converting `Ini` → `ConfigFile`.
//!
//! This module is the single place where INI key names are mapped to struct
//! fields.

use std::path::PathBuf;
use std::str::FromStr;

use ini::{Ini, Properties};

use super::file::ConfigFileError;
use super::settings::ConfigFile;
use super::size::parse_size;
use crate::cache::{MAX_QUALITY, MIN_QUALITY, SUPPORTED_BINS};

/// Parse an `Ini` object into a `ConfigFile`.
///
/// Starts from `ConfigFile::default()` and overlays any values found in the INI.
pub(super) fn parse_ini(ini: &Ini) -> Result<ConfigFile, ConfigFileError> {
    let mut config = ConfigFile::default();

    // [cache] section
    if let Some(section) = ini.section(Some("cache")) {
        if let Some(v) = non_empty(section, "directory") {
            config.cache.directory = expand_tilde(v);
        }
        if let Some(v) = section.get("memory_size") {
            config.cache.memory_size = parse_size(v).map_err(|_| {
                invalid("cache", "memory_size", v, "expected format like '2GB', '500MB', or '1024KB'")
            })?;
        }
        if let Some(v) = section.get("disk_size") {
            config.cache.disk_size = parse_size(v).map_err(|_| {
                invalid("cache", "disk_size", v, "expected format like '10GB', '500MB', or '1024KB'")
            })?;
        }
        if let Some(v) = section.get("bulk_concurrency") {
            let width: usize = parse_number("cache", "bulk_concurrency", v)?;
            if width == 0 {
                return Err(invalid("cache", "bulk_concurrency", v, "must be at least 1"));
            }
            config.cache.bulk_concurrency = width;
        }
    }

    // [upstream] section
    if let Some(section) = ini.section(Some("upstream")) {
        if let Some(v) = non_empty(section, "base_url") {
            if !v.starts_with("http://") && !v.starts_with("https://") {
                return Err(invalid("upstream", "base_url", v, "must start with http:// or https://"));
            }
            config.upstream.base_url = v.to_string();
        }
        if let Some(v) = section.get("timeout") {
            let timeout: u64 = parse_number("upstream", "timeout", v)?;
            if timeout == 0 {
                return Err(invalid("upstream", "timeout", v, "must be at least 1 second"));
            }
            config.upstream.timeout = timeout;
        }
    }

    // [preview] section
    if let Some(section) = ini.section(Some("preview")) {
        if let Some(v) = section.get("bin") {
            let bin: u8 = parse_number("preview", "bin", v)?;
            if !SUPPORTED_BINS.contains(&bin) {
                return Err(invalid("preview", "bin", v, "must be one of 1, 2, 4, 8"));
            }
            config.preview.bin = bin;
        }
        if let Some(v) = section.get("quality") {
            let quality: u8 = parse_number("preview", "quality", v)?;
            if !(MIN_QUALITY..=MAX_QUALITY).contains(&quality) {
                return Err(invalid("preview", "quality", v, "must be between 1 and 100"));
            }
            config.preview.quality = quality;
        }
    }

    // [logging] section
    if let Some(section) = ini.section(Some("logging")) {
        if let Some(v) = non_empty(section, "file") {
            config.logging.file = expand_tilde(v);
        }
    }

    Ok(config)
}

fn non_empty<'a>(section: &'a Properties, key: &str) -> Option<&'a str> {
    section.get(key).map(str::trim).filter(|v| !v.is_empty())
}

fn parse_number<T: FromStr>(section: &str, key: &str, value: &str) -> Result<T, ConfigFileError> {
    value
        .trim()
        .parse()
        .map_err(|_| invalid(section, key, value, "must be a positive integer"))
}

fn invalid(section: &str, key: &str, value: &str, reason: &str) -> ConfigFileError {
    ConfigFileError::InvalidValue {
        section: section.to_string(),
        key: key.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

/// Expand a leading `~` to the home directory.
pub(super) fn expand_tilde(path: &str) -> PathBuf {
    if path == "~" {
        return dirs::home_dir().unwrap_or_else(|| PathBuf::from(path));
    }
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}
