//! Two-tier preview cache coordinator.
//!
//! Reads go memory -> durable -> upstream, promoting durable hits into
//! memory. Writes update memory synchronously and are mirrored to the durable
//! tier before returning. Upstream loads are coalesced per key.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::cache::bulk::{frame_keys, run_batched, BulkProgress, BulkReport};
use crate::cache::coalesce::FetchCoalescer;
use crate::cache::disk::DiskStore;
use crate::cache::durable::DurableTier;
use crate::cache::key::{validate_series_id, PreviewKey};
use crate::cache::memory::MemoryTier;
use crate::cache::size::{SizeTracker, TierSizes, UsageLevel};
use crate::cache::stats::{shared_stats, CacheStatistics, SharedStats};
use crate::cache::store::BlobStore;
use crate::cache::types::{CacheConfig, CacheError};
use crate::config::format_size;
use crate::fetch::{FetchError, PreviewFetcher, SeriesFrames};

struct Inner {
    memory: MemoryTier,
    durable: DurableTier,
    coalescer: Arc<FetchCoalescer>,
    fetcher: Arc<dyn PreviewFetcher>,
    sizes: SizeTracker,
    stats: SharedStats,
    /// Bumped by every invalidation; loads started under an older value
    /// are not stored
    generation: AtomicU64,
    config: CacheConfig,
    shutdown: CancellationToken,
}

impl Drop for Inner {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

/// Two-tier preview cache.
///
/// Cheap to clone; clones share all state.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use std::time::Duration;
/// use tsview::cache::{CacheConfig, PreviewCache, PreviewKey};
/// use tsview::fetch::HttpPreviewFetcher;
///
/// # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
/// let fetcher = HttpPreviewFetcher::new("http://127.0.0.1:8000", Duration::from_secs(60))?;
/// let cache = PreviewCache::open(CacheConfig::default(), Arc::new(fetcher)).await?;
///
/// let key = PreviewKey::with_defaults("TS_01.mdoc", 0)?;
/// let png = cache.load(&key).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct PreviewCache {
    inner: Arc<Inner>,
}

impl PreviewCache {
    /// Open a cache whose durable tier lives in `config.durable.directory`.
    pub async fn open(
        config: CacheConfig,
        fetcher: Arc<dyn PreviewFetcher>,
    ) -> Result<Self, CacheError> {
        config.validate()?;
        let store = DiskStore::open(&config.durable.directory)?;
        Self::with_store(config, Arc::new(store), fetcher).await
    }

    /// Open a cache over an arbitrary durable store.
    pub async fn with_store(
        config: CacheConfig,
        store: Arc<dyn BlobStore>,
        fetcher: Arc<dyn PreviewFetcher>,
    ) -> Result<Self, CacheError> {
        config.validate()?;

        let sizes = SizeTracker::new();
        let stats = shared_stats();
        let memory = MemoryTier::new(config.memory.max_size_bytes, sizes.clone(), stats.clone());
        let durable = DurableTier::open(
            store,
            config.durable.max_size_bytes,
            sizes.clone(),
            stats.clone(),
        )
        .await;

        info!(
            memory_size = %format_size(config.memory.max_size_bytes),
            durable_size = %format_size(config.durable.max_size_bytes),
            directory = %config.durable.directory.display(),
            "Preview cache opened"
        );

        let cache = Self {
            inner: Arc::new(Inner {
                memory,
                durable,
                coalescer: Arc::new(FetchCoalescer::new()),
                fetcher,
                sizes,
                stats,
                generation: AtomicU64::new(0),
                config,
                shutdown: CancellationToken::new(),
            }),
        };

        if cache.inner.config.stats_interval_secs > 0 {
            cache.spawn_stats_reporter(Duration::from_secs(cache.inner.config.stats_interval_secs));
        }
        Ok(cache)
    }

    /// Look up a preview in either tier without fetching.
    ///
    /// A durable hit is promoted into memory.
    pub async fn get(&self, key: &PreviewKey) -> Option<Bytes> {
        if let Some(data) = self.inner.memory.get(key) {
            return Some(data);
        }

        let generation = self.generation();
        let data = self.inner.durable.get(key).await?;
        self.promote(key, &data, generation);
        Some(data)
    }

    /// Copy a durable hit into memory unless an invalidation ran since
    /// `generation` was read.
    fn promote(&self, key: &PreviewKey, data: &Bytes, generation: u64) {
        if self.generation() != generation {
            debug!(key = %key, "Cache invalidated during durable read, not promoting");
            return;
        }

        self.inner.memory.put(key.clone(), data.clone());
        // An invalidation may have swept memory between the check and the insert
        if self.generation() != generation {
            self.inner.memory.remove(key);
            return;
        }
        debug!(key = %key, "Promoted preview from durable tier");
    }

    /// Store a preview in both tiers.
    ///
    /// Returns once the durable copy is written. A durable failure is logged
    /// and leaves the memory copy in place.
    pub async fn put(&self, key: PreviewKey, data: Bytes) {
        self.inner.memory.put(key.clone(), data.clone());

        if let Err(e) = self
            .inner
            .durable
            .put(&key, data, &self.inner.memory)
            .await
        {
            warn!(key = %key, error = %e, "Durable tier write failed, keeping memory copy only");
        }
    }

    /// Return a preview, fetching it upstream on a miss in both tiers.
    ///
    /// Concurrent loads of the same key share one fetch and one result.
    pub async fn load(&self, key: &PreviewKey) -> Result<Bytes, CacheError> {
        let cache = self.clone();
        let owned = key.clone();

        self.inner
            .coalescer
            .run(key, async move {
                let generation = cache.generation();
                if let Some(data) = cache.get(&owned).await {
                    return Ok(data);
                }

                let data = cache.fetch_upstream(&owned).await?;
                cache.store_if_current(owned, data.clone(), generation).await;
                Ok(data)
            })
            .await
    }

    /// Store a fetched preview in both tiers unless an invalidation ran
    /// since `generation` was read.
    ///
    /// The durable tier re-checks under its admission lock, which every
    /// invalidation also takes after bumping the generation, so a stale write
    /// either is skipped or lands before the invalidation removes it.
    async fn store_if_current(&self, key: PreviewKey, data: Bytes, generation: u64) {
        let current = || self.generation() == generation;
        if !current() {
            debug!(key = %key, "Cache invalidated during fetch, not storing");
            return;
        }

        self.inner.memory.put(key.clone(), data.clone());

        if let Err(e) = self
            .inner
            .durable
            .put_if(&key, data, &self.inner.memory, current)
            .await
        {
            warn!(key = %key, error = %e, "Durable tier write failed, keeping memory copy only");
        }

        if !current() {
            self.inner.memory.remove(&key);
            debug!(key = %key, "Cache invalidated during fetch, dropped stored copy");
        }
    }

    async fn fetch_upstream(&self, key: &PreviewKey) -> Result<Bytes, FetchError> {
        match self.inner.fetcher.fetch(key).await {
            Ok(data) => {
                self.inner.stats.lock().record_fetch(data.len() as u64);
                Ok(data)
            }
            Err(e) => {
                self.inner.stats.lock().record_fetch_failure();
                warn!(key = %key, error = %e, "Preview fetch failed");
                Err(e)
            }
        }
    }

    fn generation(&self) -> u64 {
        self.inner.generation.load(Ordering::SeqCst)
    }

    fn bump_generation(&self) {
        self.inner.generation.fetch_add(1, Ordering::SeqCst);
    }

    /// Remove every preview from both tiers.
    pub async fn clear(&self) {
        self.bump_generation();
        self.inner.memory.clear();
        if let Err(e) = self.inner.durable.clear().await {
            warn!(error = %e, "Durable tier clear failed");
        }
        info!("Preview cache cleared");
    }

    /// Remove every preview of one series from both tiers.
    pub async fn clear_for_series(&self, series_id: &str) -> Result<(), CacheError> {
        validate_series_id(series_id)?;
        self.bump_generation();

        let removed = self.inner.memory.remove_series(series_id);
        if let Err(e) = self.inner.durable.remove_series(series_id).await {
            warn!(series = series_id, error = %e, "Durable tier series removal failed");
        }

        debug!(series = series_id, memory_removed = removed, "Series previews cleared");
        Ok(())
    }

    /// Drop cached previews of a series whose data has just changed.
    pub async fn invalidate_series(&self, series_id: &str) -> Result<(), CacheError> {
        self.clear_for_series(series_id).await?;
        info!(series = series_id, "Series invalidated");
        Ok(())
    }

    /// Make sure every frame of `series` is cached.
    ///
    /// Frames are loaded through the coalescer, `bulk_concurrency` at a time.
    pub async fn bulk_cache_all<P>(
        &self,
        series: &[SeriesFrames],
        bin: u8,
        quality: u8,
        on_progress: P,
    ) -> BulkReport
    where
        P: FnMut(&BulkProgress),
    {
        let keys = frame_keys(series, bin, quality);
        info!(series = series.len(), frames = keys.len(), "Bulk caching started");

        let report = run_batched(
            keys,
            self.inner.config.bulk_concurrency,
            |key| {
                let cache = self.clone();
                async move { cache.load(&key).await.map(|_| ()) }
            },
            on_progress,
        )
        .await;

        info!(
            success = report.success,
            failed = report.failed,
            total = report.total,
            "Bulk caching finished"
        );
        report
    }

    /// Clear everything, then fetch and store every frame of `series` again.
    ///
    /// Neither tier is consulted, so regenerated previews replace old ones
    /// even when nothing looks stale.
    pub async fn refresh_all<P>(
        &self,
        series: &[SeriesFrames],
        bin: u8,
        quality: u8,
        on_progress: P,
    ) -> BulkReport
    where
        P: FnMut(&BulkProgress),
    {
        self.clear().await;

        let keys = frame_keys(series, bin, quality);
        info!(series = series.len(), frames = keys.len(), "Refresh started");

        let report = run_batched(
            keys,
            self.inner.config.bulk_concurrency,
            |key| {
                let cache = self.clone();
                async move {
                    let data = cache.fetch_upstream(&key).await?;
                    cache.put(key, data).await;
                    Ok(())
                }
            },
            on_progress,
        )
        .await;

        info!(
            success = report.success,
            failed = report.failed,
            total = report.total,
            "Refresh finished"
        );
        report
    }

    /// Current byte totals of both tiers.
    pub fn sizes(&self) -> TierSizes {
        self.inner.sizes.snapshot()
    }

    /// Be notified whenever a tier total changes.
    pub fn subscribe_sizes(&self) -> watch::Receiver<TierSizes> {
        self.inner.sizes.subscribe()
    }

    pub fn memory_usage(&self) -> UsageLevel {
        UsageLevel::classify(self.sizes().memory_bytes, self.inner.memory.max_size_bytes())
    }

    pub fn durable_usage(&self) -> UsageLevel {
        UsageLevel::classify(
            self.sizes().durable_bytes,
            self.inner.durable.max_size_bytes(),
        )
    }

    pub fn memory(&self) -> &MemoryTier {
        &self.inner.memory
    }

    pub fn durable(&self) -> &DurableTier {
        &self.inner.durable
    }

    pub fn config(&self) -> &CacheConfig {
        &self.inner.config
    }

    /// Number of upstream loads currently in flight.
    pub fn in_flight_count(&self) -> usize {
        self.inner.coalescer.in_flight_count()
    }

    /// Statistics snapshot for both tiers and the upstream.
    pub fn stats(&self) -> CacheStatistics {
        let mut stats = self.inner.stats.lock().clone();
        stats.coalesced_requests = self.inner.coalescer.stats().coalesced_requests;
        CacheStatistics::from_stats(&stats)
    }

    /// Log a one-line statistics summary.
    pub fn log_stats(&self) {
        log_snapshot(&self.stats(), self.memory_usage(), self.durable_usage());
        self.inner.coalescer.log_stats();
    }

    /// Log statistics every `interval` until the last clone is dropped.
    fn spawn_stats_reporter(&self, interval: Duration) -> JoinHandle<()> {
        let weak: Weak<Inner> = Arc::downgrade(&self.inner);
        let shutdown = self.inner.shutdown.clone();

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // First tick completes immediately
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = ticker.tick() => {
                        let Some(inner) = weak.upgrade() else { break };
                        PreviewCache { inner }.log_stats();
                    }
                }
            }
            debug!("Cache stats reporter stopped");
        })
    }
}

fn log_snapshot(snapshot: &CacheStatistics, memory: UsageLevel, durable: UsageLevel) {
    let stats = &snapshot.stats;
    info!(
        entries = stats.memory_entry_count,
        size = %format_size(stats.memory_size_bytes),
        hit_rate = format!("{:.1}%", snapshot.memory_hit_rate_percent),
        usage = %memory,
        "Memory tier"
    );
    info!(
        entries = stats.durable_entry_count,
        size = %format_size(stats.durable_size_bytes),
        hit_rate = format!("{:.1}%", snapshot.durable_hit_rate_percent),
        write_failures = stats.durable_write_failures,
        usage = %durable,
        "Durable tier"
    );
    info!(
        fetches = stats.fetches,
        failures = stats.fetch_failures,
        bytes = %format_size(stats.bytes_fetched),
        coalesced = stats.coalesced_requests,
        "Upstream"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::future::BoxFuture;
    use parking_lot::Mutex;
    use tempfile::TempDir;

    /// Serves `frame_<n>` bytes and remembers what it was asked for.
    #[derive(Default)]
    struct RecordingFetcher {
        calls: Mutex<Vec<String>>,
    }

    impl PreviewFetcher for RecordingFetcher {
        fn fetch(&self, key: &PreviewKey) -> BoxFuture<'static, Result<Bytes, FetchError>> {
            self.calls.lock().push(key.to_string());
            let body = Bytes::from(format!("frame_{}", key.frame()));
            Box::pin(async move { Ok(body) })
        }
    }

    async fn create_test_cache() -> (PreviewCache, Arc<RecordingFetcher>, TempDir) {
        let temp = TempDir::new().unwrap();
        let fetcher = Arc::new(RecordingFetcher::default());
        let config = CacheConfig::new(temp.path())
            .with_memory_size(1024)
            .with_durable_size(4096)
            .with_stats_interval(0);
        let cache = PreviewCache::open(config, fetcher.clone()).await.unwrap();
        (cache, fetcher, temp)
    }

    fn key(series: &str, frame: u32) -> PreviewKey {
        PreviewKey::with_defaults(series, frame).unwrap()
    }

    #[tokio::test]
    async fn test_miss_returns_none() {
        let (cache, fetcher, _temp) = create_test_cache().await;
        assert_eq!(cache.get(&key("S", 0)).await, None);
        assert!(fetcher.calls.lock().is_empty());
    }

    #[tokio::test]
    async fn test_put_reaches_both_tiers() {
        let (cache, _, _temp) = create_test_cache().await;
        cache.put(key("S", 0), Bytes::from_static(b"abc")).await;

        assert!(cache.memory().contains(&key("S", 0)));
        assert!(cache.durable().contains(&key("S", 0)));
        assert_eq!(
            cache.sizes(),
            TierSizes {
                memory_bytes: 3,
                durable_bytes: 3
            }
        );
    }

    #[tokio::test]
    async fn test_durable_hit_is_promoted() {
        let (cache, _, _temp) = create_test_cache().await;
        cache.put(key("S", 0), Bytes::from_static(b"abc")).await;
        cache.memory().clear();

        assert_eq!(cache.get(&key("S", 0)).await, Some(Bytes::from_static(b"abc")));
        assert!(cache.memory().contains(&key("S", 0)));

        let stats = cache.stats();
        assert_eq!(stats.stats.durable_hits, 1);
    }

    #[tokio::test]
    async fn test_load_fetches_once_then_hits() {
        let (cache, fetcher, _temp) = create_test_cache().await;

        let first = cache.load(&key("S", 4)).await.unwrap();
        let second = cache.load(&key("S", 4)).await.unwrap();

        assert_eq!(first, Bytes::from_static(b"frame_4"));
        assert_eq!(first, second);
        assert_eq!(fetcher.calls.lock().len(), 1);
        assert_eq!(cache.stats().stats.fetches, 1);
    }

    #[tokio::test]
    async fn test_clear_resets_totals() {
        let (cache, _, _temp) = create_test_cache().await;
        cache.load(&key("S", 1)).await.unwrap();
        cache.load(&key("T", 1)).await.unwrap();

        cache.clear().await;

        assert_eq!(cache.sizes(), TierSizes::default());
        assert_eq!(cache.durable().entry_count(), 0);
        assert_eq!(cache.memory().entry_count(), 0);
    }

    #[tokio::test]
    async fn test_clear_for_series_rejects_unsafe_ids() {
        let (cache, _, temp) = create_test_cache().await;
        std::fs::write(temp.path().join("keep.txt"), b"x").unwrap();

        for bad in ["", "..", "a/b"] {
            assert!(matches!(
                cache.clear_for_series(bad).await,
                Err(CacheError::InvalidSeries { .. })
            ));
        }
        assert!(temp.path().join("keep.txt").exists());
    }

    #[tokio::test]
    async fn test_store_with_stale_generation_is_dropped() {
        let (cache, _, _temp) = create_test_cache().await;
        let generation = cache.generation();
        cache.invalidate_series("S").await.unwrap();

        cache
            .store_if_current(key("S", 0), Bytes::from_static(b"stale"), generation)
            .await;

        assert!(!cache.memory().contains(&key("S", 0)));
        assert!(!cache.durable().contains(&key("S", 0)));
        assert_eq!(cache.sizes(), TierSizes::default());
    }

    #[tokio::test]
    async fn test_store_with_current_generation_reaches_both_tiers() {
        let (cache, _, _temp) = create_test_cache().await;

        cache
            .store_if_current(key("S", 0), Bytes::from_static(b"fresh"), cache.generation())
            .await;

        assert!(cache.memory().contains(&key("S", 0)));
        assert!(cache.durable().contains(&key("S", 0)));
    }

    #[tokio::test]
    async fn test_promotion_skipped_after_invalidation() {
        let (cache, _, _temp) = create_test_cache().await;
        let generation = cache.generation();
        cache.clear().await;

        cache.promote(&key("S", 0), &Bytes::from_static(b"old"), generation);

        assert!(!cache.memory().contains(&key("S", 0)));
        assert_eq!(cache.sizes().memory_bytes, 0);
    }

    #[tokio::test]
    async fn test_clear_keeps_unrelated_files() {
        let (cache, _, temp) = create_test_cache().await;
        std::fs::write(temp.path().join("keep.txt"), b"x").unwrap();
        cache.load(&key("S", 0)).await.unwrap();

        cache.clear().await;

        assert!(temp.path().join("keep.txt").is_file());
        assert!(!temp.path().join("S").exists());
    }

    #[tokio::test]
    async fn test_bulk_cache_all_skips_cached_frames() {
        let (cache, fetcher, _temp) = create_test_cache().await;
        cache.load(&key("S", 0)).await.unwrap();

        let series = vec![SeriesFrames::new("S", vec![0, 1, 2])];
        let report = cache.bulk_cache_all(&series, 8, 90, |_| {}).await;

        assert_eq!(
            report,
            BulkReport {
                success: 3,
                failed: 0,
                total: 3
            }
        );
        assert_eq!(fetcher.calls.lock().len(), 3);
    }

    #[tokio::test]
    async fn test_bulk_counts_invalid_parameters_as_failed() {
        let (cache, fetcher, _temp) = create_test_cache().await;
        let series = vec![SeriesFrames::new("S", vec![0, 1])];

        let report = cache.bulk_cache_all(&series, 3, 90, |_| {}).await;

        assert_eq!(report.failed, 2);
        assert_eq!(report.success, 0);
        assert!(fetcher.calls.lock().is_empty());
    }

    #[tokio::test]
    async fn test_usage_levels() {
        let (cache, _, _temp) = create_test_cache().await;
        assert_eq!(cache.memory_usage(), UsageLevel::Normal);

        cache.put(key("S", 0), Bytes::from(vec![0u8; 1000])).await;
        assert_eq!(cache.memory_usage(), UsageLevel::Critical);
        assert_eq!(cache.durable_usage(), UsageLevel::Normal);
    }

    #[tokio::test]
    async fn test_stats_reporter_stops_with_cache() {
        let temp = TempDir::new().unwrap();
        let config = CacheConfig::new(temp.path()).with_stats_interval(0);
        let cache = PreviewCache::open(config, Arc::new(RecordingFetcher::default()))
            .await
            .unwrap();

        let handle = cache.spawn_stats_reporter(Duration::from_millis(5));
        tokio::time::sleep(Duration::from_millis(20)).await;
        drop(cache);

        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
