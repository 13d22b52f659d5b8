//! Upstream preview rendering service.
//!
//! The cache never renders previews itself. It asks a [`PreviewFetcher`] for
//! the bytes of a missing preview and treats every failure the same way: the
//! error reaches every caller waiting on that preview and nothing is stored.

mod http;

pub use http::{HttpPreviewFetcher, DEFAULT_BASE_URL, DEFAULT_TIMEOUT_SECS};

use bytes::Bytes;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::cache::PreviewKey;

/// Errors from the upstream service.
///
/// `Clone` so a single failure can be delivered to every coalesced waiter.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// Upstream answered with a non-success status
    #[error("HTTP {status} from {url}")]
    Status { status: u16, url: String },

    /// Connection, timeout or body read failure
    #[error("Request failed: {0}")]
    Transport(String),

    /// Upstream answered successfully with no bytes
    #[error("Empty preview body from {0}")]
    EmptyBody(String),

    /// Response body could not be decoded
    #[error("Invalid response from {url}: {reason}")]
    Decode { url: String, reason: String },

    /// Request could not be built
    #[error("Invalid upstream URL: {0}")]
    InvalidUrl(String),
}

/// Source of rendered preview bytes.
///
/// The returned future must not borrow `self` so it can run in its own task.
pub trait PreviewFetcher: Send + Sync {
    fn fetch(&self, key: &PreviewKey) -> BoxFuture<'static, Result<Bytes, FetchError>>;
}

/// Frames of one tilt series, as work for bulk operations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeriesFrames {
    pub series_id: String,
    /// Frame z-indices
    pub frames: Vec<u32>,
}

impl SeriesFrames {
    pub fn new(series_id: impl Into<String>, frames: Vec<u32>) -> Self {
        Self {
            series_id: series_id.into(),
            frames,
        }
    }
}
