//! Canonical preview keys.
//!
//! A preview is identified by the tilt series it belongs to, the frame's
//! z-index within that series, and the two rendering parameters the preview
//! service accepts (bin factor and encoder quality).

use std::fmt;

use crate::cache::types::CacheError;

/// Bin factors the preview service can render.
pub const SUPPORTED_BINS: [u8; 4] = [1, 2, 4, 8];

/// Bin factor used when the caller does not ask for one.
pub const DEFAULT_BIN: u8 = 8;

/// Encoder quality used when the caller does not ask for one.
pub const DEFAULT_QUALITY: u8 = 90;

/// Lowest accepted encoder quality.
pub const MIN_QUALITY: u8 = 1;

/// Highest accepted encoder quality.
pub const MAX_QUALITY: u8 = 100;

/// Key identifying one rendered preview.
///
/// Construction validates every component, so a `PreviewKey` always maps to
/// a well-formed canonical string and a well-formed on-disk path.
///
/// The canonical form is `{series}/{frame}/bin{bin}/q{quality}`. The series
/// identifier is always the leading `/`-delimited segment, which is what
/// per-series invalidation matches on.
///
/// Ordering is by series, then frame, bin and quality.
///
/// # Example
///
/// ```
/// use tsview::cache::PreviewKey;
///
/// let key = PreviewKey::new("TS_01.mdoc", 12, 8, 90).unwrap();
/// assert_eq!(key.to_string(), "TS_01.mdoc/12/bin8/q90");
/// assert!(key.belongs_to("TS_01.mdoc"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PreviewKey {
    series_id: String,
    frame: u32,
    bin: u8,
    quality: u8,
}

impl PreviewKey {
    /// Build a key, validating every component.
    pub fn new(
        series_id: impl Into<String>,
        frame: u32,
        bin: u8,
        quality: u8,
    ) -> Result<Self, CacheError> {
        let series_id = series_id.into();
        validate_series_id(&series_id)?;

        if !SUPPORTED_BINS.contains(&bin) {
            return Err(CacheError::InvalidBin(bin));
        }
        if !(MIN_QUALITY..=MAX_QUALITY).contains(&quality) {
            return Err(CacheError::InvalidQuality(quality));
        }

        Ok(Self {
            series_id,
            frame,
            bin,
            quality,
        })
    }

    /// Build a key with the default bin factor and quality.
    pub fn with_defaults(series_id: impl Into<String>, frame: u32) -> Result<Self, CacheError> {
        Self::new(series_id, frame, DEFAULT_BIN, DEFAULT_QUALITY)
    }

    pub fn series_id(&self) -> &str {
        &self.series_id
    }

    pub fn frame(&self) -> u32 {
        self.frame
    }

    pub fn bin(&self) -> u8 {
        self.bin
    }

    pub fn quality(&self) -> u8 {
        self.quality
    }

    /// Whether this key encodes the given series.
    pub fn belongs_to(&self, series_id: &str) -> bool {
        self.series_id == series_id
    }

    /// Canonical key prefix shared by every preview of a series.
    pub fn series_prefix(series_id: &str) -> String {
        format!("{}/", series_id)
    }
}

impl fmt::Display for PreviewKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/bin{}/q{}",
            self.series_id, self.frame, self.bin, self.quality
        )
    }
}

/// Check that a series identifier can serve as a leading key segment and as
/// a single directory name.
pub fn validate_series_id(series_id: &str) -> Result<(), CacheError> {
    let reason = if series_id.is_empty() {
        Some("must not be empty")
    } else if series_id == "." || series_id == ".." {
        Some("must not be a relative path component")
    } else if series_id.contains(['/', '\\', '\0']) {
        Some("must not contain path separators or NUL")
    } else {
        None
    };

    match reason {
        Some(reason) => Err(CacheError::InvalidSeries {
            series_id: series_id.to_string(),
            reason,
        }),
        None => Ok(()),
    }
}
