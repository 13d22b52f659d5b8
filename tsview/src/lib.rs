//! tsview - preview caching for tilt-series image viewing
//!
//! Rendering a preview of a tilt-series frame is expensive, so this library
//! keeps rendered previews in a bounded two-tier cache: a fast in-process
//! LRU tier backed by a larger on-disk tier that survives restarts.
//!
//! ```no_run
//! use std::sync::Arc;
//! use tsview::cache::{PreviewCache, PreviewKey};
//! use tsview::config::ConfigFile;
//! use tsview::fetch::HttpPreviewFetcher;
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ConfigFile::load()?;
//! let fetcher = HttpPreviewFetcher::new(&config.upstream.base_url, config.upstream_timeout())?;
//! let cache = PreviewCache::open(config.cache_config(), Arc::new(fetcher)).await?;
//!
//! let png = cache.load(&PreviewKey::with_defaults("TS_01.mdoc", 0)?).await?;
//!
//! // After saving new frame selections for a series
//! cache.invalidate_series("TS_01.mdoc").await?;
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod config;
pub mod fetch;
pub mod logging;

/// Version of the tsview library and CLI.
///
/// The version is defined in `Cargo.toml` and injected at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
