//! Storage abstraction behind the durable tier.

use bytes::Bytes;
use futures::future::BoxFuture;

use crate::cache::key::PreviewKey;
use crate::cache::types::CacheError;

/// Keyed blob storage used by the durable tier.
///
/// Implementations only move bytes; capacity accounting and eviction
/// decisions live in [`DurableTier`](crate::cache::DurableTier). All
/// operations are asynchronous and may fail with I/O errors, which the
/// durable tier absorbs.
pub trait BlobStore: Send + Sync {
    /// List every stored preview with its size in bytes.
    fn scan(&self) -> BoxFuture<'_, Result<Vec<(PreviewKey, u64)>, CacheError>>;

    /// Read a preview. `Ok(None)` means it is not stored.
    fn read(&self, key: &PreviewKey) -> BoxFuture<'_, Result<Option<Bytes>, CacheError>>;

    /// Store a preview, replacing any previous copy.
    ///
    /// A failed write must not leave a partial preview readable.
    fn write(&self, key: &PreviewKey, data: Bytes) -> BoxFuture<'_, Result<(), CacheError>>;

    /// Remove a preview. Returns whether it existed.
    fn remove(&self, key: &PreviewKey) -> BoxFuture<'_, Result<bool, CacheError>>;

    /// Remove every preview of a series.
    fn remove_series(&self, series_id: &str) -> BoxFuture<'_, Result<(), CacheError>>;

    /// Remove every stored preview.
    fn remove_all(&self) -> BoxFuture<'_, Result<(), CacheError>>;
}
