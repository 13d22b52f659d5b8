//! Durable preview tier: quota accounting over a [`BlobStore`].
//!
//! The tier keeps an index of stored keys and their sizes. The published
//! byte total is always recomputed from that index after a change rather
//! than adjusted incrementally, so a failed write or removal can never skew
//! it.
//!
//! Storage failures never escape as read failures: a failed read is a miss,
//! and a failed write or removal is logged, counted, and reported to the
//! caller without touching the index.

use std::collections::BTreeMap;
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::cache::key::PreviewKey;
use crate::cache::memory::MemoryTier;
use crate::cache::quota::QuotaEvictor;
use crate::cache::size::SizeTracker;
use crate::cache::stats::SharedStats;
use crate::cache::store::BlobStore;
use crate::cache::types::CacheError;

/// Larger, persistent, quota-bounded preview store.
pub struct DurableTier {
    store: Arc<dyn BlobStore>,
    index: Mutex<BTreeMap<PreviewKey, u64>>,
    evictor: QuotaEvictor,
    sizes: SizeTracker,
    stats: SharedStats,
    /// Serializes every sequence that writes or removes stored previews
    admission: tokio::sync::Mutex<()>,
}

impl DurableTier {
    /// Open the tier and index whatever the store already holds.
    ///
    /// A store that cannot be scanned starts out empty.
    pub async fn open(
        store: Arc<dyn BlobStore>,
        max_size_bytes: u64,
        sizes: SizeTracker,
        stats: SharedStats,
    ) -> Self {
        let index = match store.scan().await {
            Ok(entries) => entries.into_iter().collect(),
            Err(e) => {
                warn!(error = %e, "Durable tier scan failed, starting empty");
                BTreeMap::new()
            }
        };

        let tier = Self {
            store,
            index: Mutex::new(index),
            evictor: QuotaEvictor::new(max_size_bytes),
            sizes,
            stats,
            admission: tokio::sync::Mutex::new(()),
        };
        tier.resync_size();

        info!(
            entries = tier.entry_count(),
            bytes = tier.size_bytes(),
            max_bytes = max_size_bytes,
            "Durable tier opened"
        );
        tier
    }

    /// Read a preview. Any failure is reported as a miss.
    pub async fn get(&self, key: &PreviewKey) -> Option<Bytes> {
        if !self.contains(key) {
            self.stats.lock().record_durable_miss();
            return None;
        }

        match self.store.read(key).await {
            Ok(Some(data)) => {
                self.stats.lock().record_durable_hit();
                Some(data)
            }
            Ok(None) => {
                debug!(key = %key, "Indexed preview vanished from store");
                self.index.lock().remove(key);
                self.resync_size();
                self.stats.lock().record_durable_miss();
                None
            }
            Err(e) => {
                warn!(key = %key, error = %e, "Durable tier read failed");
                let mut stats = self.stats.lock();
                stats.record_durable_read_failure();
                stats.record_durable_miss();
                None
            }
        }
    }

    /// Store a preview, evicting entries first if it would not fit.
    ///
    /// `memory` supplies residency and recency for victim selection. On
    /// failure nothing about the stored preview changes in the index.
    pub async fn put(
        &self,
        key: &PreviewKey,
        data: Bytes,
        memory: &MemoryTier,
    ) -> Result<(), CacheError> {
        self.put_if(key, data, memory, || true).await.map(|_| ())
    }

    /// Store a preview only if `still_wanted` holds once writers are
    /// serialized.
    ///
    /// `still_wanted` runs with the admission lock held, so a removal that
    /// queues behind this call always observes the write, and one that ran
    /// before it is observed by the predicate. Returns whether the preview
    /// was written.
    pub async fn put_if<F>(
        &self,
        key: &PreviewKey,
        data: Bytes,
        memory: &MemoryTier,
        still_wanted: F,
    ) -> Result<bool, CacheError>
    where
        F: Fn() -> bool,
    {
        let size = data.len() as u64;
        let _admission = self.admission.lock().await;

        if !still_wanted() {
            debug!(key = %key, "Durable write no longer wanted, skipping");
            return Ok(false);
        }

        self.make_room(key, size, memory).await;

        if let Err(e) = self.store.write(key, data).await {
            self.stats.lock().record_durable_write_failure();
            return Err(e);
        }

        self.index.lock().insert(key.clone(), size);
        self.stats.lock().record_durable_write();
        self.resync_size();
        Ok(true)
    }

    async fn make_room(&self, key: &PreviewKey, size: u64, memory: &MemoryTier) {
        let plan = {
            let index = self.index.lock();
            let current = Self::total_excluding(&index, key);
            self.evictor
                .plan(&index, &memory.recency_order(), key, current, size)
        };
        if plan.is_empty() {
            return;
        }

        let mut evicted = 0u64;
        for (victim, _) in plan {
            // Earlier removals may already have freed enough
            let needed = {
                let index = self.index.lock();
                self.evictor
                    .space_needed(Self::total_excluding(&index, key), size)
            };
            if needed == 0 {
                break;
            }

            match self.store.remove(&victim).await {
                Ok(_) => {
                    self.index.lock().remove(&victim);
                    evicted += 1;
                    debug!(key = %victim, "Evicted preview from durable tier");
                }
                Err(e) => {
                    warn!(key = %victim, error = %e, "Durable tier eviction failed");
                }
            }
        }

        self.stats.lock().record_durable_eviction(evicted);
        self.resync_size();
    }

    fn total_excluding(index: &BTreeMap<PreviewKey, u64>, key: &PreviewKey) -> u64 {
        index
            .iter()
            .filter(|(k, _)| *k != key)
            .map(|(_, size)| size)
            .sum()
    }

    /// Remove one preview.
    pub async fn remove(&self, key: &PreviewKey) -> Result<(), CacheError> {
        let _admission = self.admission.lock().await;
        self.store.remove(key).await?;
        self.index.lock().remove(key);
        self.resync_size();
        Ok(())
    }

    /// Remove every preview of a series.
    ///
    /// Index entries are dropped even when the store reports a failure, so
    /// the series is never served from this tier afterwards.
    pub async fn remove_series(&self, series_id: &str) -> Result<(), CacheError> {
        let _admission = self.admission.lock().await;
        let result = self.store.remove_series(series_id).await;

        self.index.lock().retain(|key, _| !key.belongs_to(series_id));
        self.resync_size();
        result
    }

    /// Remove everything and reset the published total to zero.
    pub async fn clear(&self) -> Result<(), CacheError> {
        let _admission = self.admission.lock().await;
        let result = self.store.remove_all().await;

        self.index.lock().clear();
        self.resync_size();
        result
    }

    /// Recompute and publish the resident byte total from the index.
    pub fn resync_size(&self) -> u64 {
        let index = self.index.lock();
        let total: u64 = index.values().sum();
        self.sizes.set_durable(total);
        self.stats.lock().update_durable_size(total, index.len());
        total
    }

    pub fn contains(&self, key: &PreviewKey) -> bool {
        self.index.lock().contains_key(key)
    }

    pub fn entry_count(&self) -> usize {
        self.index.lock().len()
    }

    pub fn size_bytes(&self) -> u64 {
        self.index.lock().values().sum()
    }

    pub fn max_size_bytes(&self) -> u64 {
        self.evictor.capacity()
    }

    /// Stored keys in key order.
    pub fn keys(&self) -> Vec<PreviewKey> {
        self.index.lock().keys().cloned().collect()
    }
}
