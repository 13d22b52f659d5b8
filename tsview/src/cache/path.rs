//! On-disk layout of the durable preview store.
//!
//! ```text
//! <root>/<series>/bin<bin>/frame_<frame:04>_q<quality>.png
//! ```

use std::path::{Component, Path, PathBuf};

use crate::cache::key::PreviewKey;

/// Extension of stored previews.
pub const PREVIEW_EXTENSION: &str = "png";

/// Extension of in-progress writes.
pub const TEMP_EXTENSION: &str = "tmp";

/// Construct the full path for a stored preview.
///
/// # Example
///
/// ```
/// use std::path::PathBuf;
/// use tsview::cache::{preview_path, PreviewKey};
///
/// let key = PreviewKey::new("TS_01", 7, 4, 85).unwrap();
/// let path = preview_path(&PathBuf::from("/cache"), &key);
///
/// assert_eq!(path, PathBuf::from("/cache/TS_01/bin4/frame_0007_q85.png"));
/// ```
pub fn preview_path(root: &Path, key: &PreviewKey) -> PathBuf {
    root.join(key.series_id())
        .join(format!("bin{}", key.bin()))
        .join(preview_filename(key))
}

/// Directory holding every preview of a series.
pub fn series_directory(root: &Path, series_id: &str) -> PathBuf {
    root.join(series_id)
}

/// Sibling path used while a preview is being written.
pub fn temp_path(path: &Path) -> PathBuf {
    path.with_extension(TEMP_EXTENSION)
}

fn preview_filename(key: &PreviewKey) -> String {
    format!(
        "frame_{:04}_q{}.{}",
        key.frame(),
        key.quality(),
        PREVIEW_EXTENSION
    )
}

/// Recover the key of a stored preview from its path.
///
/// Returns `None` for anything that is not a preview written by this store,
/// including temporary files and keys that no longer validate.
pub fn parse_preview_path(root: &Path, path: &Path) -> Option<PreviewKey> {
    let relative = path.strip_prefix(root).ok()?;
    let parts: Vec<&str> = relative
        .components()
        .map(|c| match c {
            Component::Normal(part) => part.to_str(),
            _ => None,
        })
        .collect::<Option<_>>()?;

    let [series_id, bin_dir, filename] = parts.as_slice() else {
        return None;
    };

    let bin: u8 = bin_dir.strip_prefix("bin")?.parse().ok()?;

    // frame_0007_q85.png
    let stem = filename.strip_suffix(&format!(".{}", PREVIEW_EXTENSION))?;
    let rest = stem.strip_prefix("frame_")?;
    let (frame, quality) = rest.split_once("_q")?;
    let frame: u32 = frame.parse().ok()?;
    let quality: u8 = quality.parse().ok()?;

    let key = PreviewKey::new(*series_id, frame, bin, quality).ok()?;

    // Only the canonical spelling maps to a key; `frame_1_q90.png` or
    // `bin08` would alias a stored preview
    (preview_path(root, &key) == path).then_some(key)
}
