//! Two-tier preview cache.
//!
//! Provides a bounded memory tier with LRU eviction, a quota-bounded durable
//! tier on disk, coalescing of concurrent upstream fetches, and per-series
//! invalidation.

mod bulk;
mod coalesce;
mod disk;
mod durable;
mod key;
mod memory;
mod path;
mod quota;
mod size;
mod stats;
mod store;
mod system;
mod types;

pub use bulk::{BulkProgress, BulkReport};
pub use coalesce::{CoalescerStats, FetchCoalescer, FetchResult};
pub use disk::DiskStore;
pub use durable::DurableTier;
pub use key::{
    validate_series_id, PreviewKey, DEFAULT_BIN, DEFAULT_QUALITY, MAX_QUALITY, MIN_QUALITY,
    SUPPORTED_BINS,
};
pub use memory::MemoryTier;
pub use quota::QuotaEvictor;
pub use size::{SizeTracker, TierSizes, UsageLevel, CRITICAL_THRESHOLD, WARNING_THRESHOLD};
pub use stats::{shared_stats, CacheStatistics, CacheStats, SharedStats};
pub use store::BlobStore;
pub use system::PreviewCache;
pub use types::{
    default_cache_directory, CacheConfig, CacheError, DurableTierConfig, MemoryTierConfig,
    DEFAULT_BULK_CONCURRENCY, DEFAULT_DURABLE_CAPACITY, DEFAULT_MEMORY_CAPACITY,
    DEFAULT_STATS_INTERVAL_SECS,
};

// Re-export path utilities for convenience
pub use path::{parse_preview_path, preview_path, series_directory};
