//! INI serialization logic for converting `ConfigFile` → INI string.

use std::path::Path;

use super::settings::ConfigFile;
use super::size::format_size;

/// Convert a `ConfigFile` to a commented INI string for saving.
pub(super) fn to_config_string(config: &ConfigFile) -> String {
    format!(
        r#"[cache]
; Directory of the durable preview tier. Previews are stored as
; <directory>/<series>/bin<bin>/frame_<frame>_q<quality>.png
directory = {}
; Memory tier size (default: 2GB)
; Supports: KB, MB, GB suffixes (e.g., 500MB, 2GB)
memory_size = {}
; Durable tier size (default: 10GB)
disk_size = {}
; Simultaneous fetches during warm-up and refresh (default: 4)
bulk_concurrency = {}

[upstream]
; Preview rendering service
base_url = {}
; Request timeout in seconds (default: 60)
timeout = {}

[preview]
; Bin factor: 1, 2, 4 or 8 (default: 8)
bin = {}
; Encoder quality, 1-100 (default: 90)
quality = {}

[logging]
; Log file path
file = {}
"#,
        path_to_string(&config.cache.directory),
        format_size(config.cache.memory_size),
        format_size(config.cache.disk_size),
        config.cache.bulk_concurrency,
        config.upstream.base_url,
        config.upstream.timeout,
        config.preview.bin,
        config.preview.quality,
        path_to_string(&config.logging.file),
    )
}

fn path_to_string(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ini::Ini;

    #[test]
    fn test_written_config_parses_back() {
        let mut config = ConfigFile::default();
        config.cache.directory = "/data/previews".into();
        config.cache.memory_size = 512 * 1024 * 1024;
        config.upstream.base_url = "http://scope:9000".to_string();
        config.preview.bin = 2;

        let text = to_config_string(&config);
        let ini = Ini::load_from_str(&text).unwrap();
        let parsed = super::super::parser::parse_ini(&ini).unwrap();

        assert_eq!(parsed, config);
    }

    #[test]
    fn test_contains_every_section() {
        let text = to_config_string(&ConfigFile::default());
        for section in ["[cache]", "[upstream]", "[preview]", "[logging]"] {
            assert!(text.contains(section), "missing {}", section);
        }
    }
}
