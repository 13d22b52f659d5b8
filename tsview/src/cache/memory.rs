//! In-memory preview tier with LRU eviction.

use std::collections::{BTreeMap, HashMap};

use bytes::Bytes;
use parking_lot::Mutex;
use tracing::trace;

use crate::cache::key::PreviewKey;
use crate::cache::size::SizeTracker;
use crate::cache::stats::SharedStats;

/// Entry in the memory tier.
#[derive(Debug, Clone)]
struct MemoryEntry {
    data: Bytes,
    size: u64,
    /// Logical clock value of the last `get` or `put`
    last_access: u64,
}

#[derive(Debug, Default)]
struct Inner {
    entries: HashMap<PreviewKey, MemoryEntry>,
    /// Access tick -> key, oldest first
    recency: BTreeMap<u64, PreviewKey>,
    total: u64,
    clock: u64,
}

impl Inner {
    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    fn remove(&mut self, key: &PreviewKey) -> Option<MemoryEntry> {
        let entry = self.entries.remove(key)?;
        self.recency.remove(&entry.last_access);
        self.total -= entry.size;
        Some(entry)
    }

    fn evict_oldest(&mut self) -> Option<PreviewKey> {
        let (_, key) = self.recency.pop_first()?;
        if let Some(entry) = self.entries.remove(&key) {
            self.total -= entry.size;
        }
        Some(key)
    }
}

/// Bounded, least-recently-used preview store.
///
/// Every mutation publishes the new resident total to the [`SizeTracker`]
/// while the tier's lock is still held, so observers never see a total that
/// disagrees with the resident entries.
pub struct MemoryTier {
    inner: Mutex<Inner>,
    max_size_bytes: u64,
    sizes: SizeTracker,
    stats: SharedStats,
}

impl MemoryTier {
    /// Create a memory tier holding at most `max_size_bytes`.
    pub fn new(max_size_bytes: u64, sizes: SizeTracker, stats: SharedStats) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            max_size_bytes,
            sizes,
            stats,
        }
    }

    /// Look up a preview, marking it most recently used on a hit.
    pub fn get(&self, key: &PreviewKey) -> Option<Bytes> {
        let mut inner = self.inner.lock();
        let now = inner.tick();

        let Some(entry) = inner.entries.get_mut(key) else {
            self.stats.lock().record_memory_miss();
            return None;
        };
        let previous = entry.last_access;
        entry.last_access = now;
        let data = entry.data.clone();

        inner.recency.remove(&previous);
        inner.recency.insert(now, key.clone());
        self.stats.lock().record_memory_hit();

        Some(data)
    }

    /// Insert a preview, evicting least recently used entries until it fits.
    ///
    /// An entry larger than the whole tier is still accepted once everything
    /// else has been evicted. Returns the number of entries evicted.
    pub fn put(&self, key: PreviewKey, data: Bytes) -> usize {
        let size = data.len() as u64;
        let mut inner = self.inner.lock();

        inner.remove(&key);

        let mut evicted = 0;
        while inner.total + size > self.max_size_bytes && !inner.entries.is_empty() {
            match inner.evict_oldest() {
                Some(victim) => {
                    trace!(key = %victim, "Evicted preview from memory tier");
                    evicted += 1;
                }
                None => break,
            }
        }

        let now = inner.tick();
        inner.recency.insert(now, key.clone());
        inner.entries.insert(
            key,
            MemoryEntry {
                data,
                size,
                last_access: now,
            },
        );
        inner.total += size;

        self.publish(&inner);
        if evicted > 0 {
            self.stats.lock().record_memory_eviction(evicted as u64);
        }
        evicted
    }

    /// Whether a preview is resident, without touching its recency.
    pub fn contains(&self, key: &PreviewKey) -> bool {
        self.inner.lock().entries.contains_key(key)
    }

    /// Remove a single preview. Returns whether it was resident.
    pub fn remove(&self, key: &PreviewKey) -> bool {
        let mut inner = self.inner.lock();
        let removed = inner.remove(key).is_some();
        if removed {
            self.publish(&inner);
        }
        removed
    }

    /// Remove every preview of a series. Returns the number removed.
    pub fn remove_series(&self, series_id: &str) -> usize {
        let mut inner = self.inner.lock();
        let doomed: Vec<PreviewKey> = inner
            .entries
            .keys()
            .filter(|key| key.belongs_to(series_id))
            .cloned()
            .collect();

        for key in &doomed {
            inner.remove(key);
        }
        self.publish(&inner);
        doomed.len()
    }

    /// Remove everything.
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.entries.clear();
        inner.recency.clear();
        inner.total = 0;
        self.publish(&inner);
    }

    /// Resident keys, least recently used first.
    pub fn recency_order(&self) -> Vec<PreviewKey> {
        self.inner.lock().recency.values().cloned().collect()
    }

    pub fn entry_count(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn size_bytes(&self) -> u64 {
        self.inner.lock().total
    }

    pub fn max_size_bytes(&self) -> u64 {
        self.max_size_bytes
    }

    fn publish(&self, inner: &Inner) {
        self.sizes.set_memory(inner.total);
        self.stats
            .lock()
            .update_memory_size(inner.total, inner.entries.len());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::stats::shared_stats;
    use proptest::prelude::*;

    fn tier(max: u64) -> (MemoryTier, SizeTracker) {
        let sizes = SizeTracker::new();
        (MemoryTier::new(max, sizes.clone(), shared_stats()), sizes)
    }

    fn key(series: &str, frame: u32) -> PreviewKey {
        PreviewKey::with_defaults(series, frame).unwrap()
    }

    fn blob(len: usize) -> Bytes {
        Bytes::from(vec![0u8; len])
    }

    #[test]
    fn test_put_and_get() {
        let (tier, _) = tier(1000);
        tier.put(key("TS_01", 0), Bytes::from_static(b"png"));

        assert_eq!(tier.get(&key("TS_01", 0)), Some(Bytes::from_static(b"png")));
        assert_eq!(tier.get(&key("TS_01", 1)), None);
    }

    #[test]
    fn test_oldest_evicted_first() {
        let (tier, sizes) = tier(300);
        let (a, b, c) = (key("S", 0), key("S", 1), key("S", 2));

        tier.put(a.clone(), blob(100));
        tier.put(b.clone(), blob(100));
        let evicted = tier.put(c.clone(), blob(150));

        assert_eq!(evicted, 1);
        assert!(!tier.contains(&a));
        assert!(tier.contains(&b));
        assert!(tier.contains(&c));
        assert_eq!(tier.size_bytes(), 250);
        assert_eq!(sizes.snapshot().memory_bytes, 250);
    }

    #[test]
    fn test_get_refreshes_recency() {
        let (tier, _) = tier(300);
        let (a, b, c) = (key("S", 0), key("S", 1), key("S", 2));

        tier.put(a.clone(), blob(100));
        tier.put(b.clone(), blob(100));
        tier.get(&a);
        tier.put(c.clone(), blob(150));

        assert!(tier.contains(&a));
        assert!(!tier.contains(&b));
        assert_eq!(tier.recency_order(), vec![a, c]);
    }

    #[test]
    fn test_replace_does_not_double_count() {
        let (tier, _) = tier(1000);
        let a = key("S", 0);

        tier.put(a.clone(), blob(400));
        tier.put(a.clone(), blob(300));

        assert_eq!(tier.entry_count(), 1);
        assert_eq!(tier.size_bytes(), 300);
    }

    #[test]
    fn test_replace_does_not_evict_itself_needlessly() {
        let (tier, _) = tier(500);
        let (a, b) = (key("S", 0), key("S", 1));

        tier.put(a.clone(), blob(200));
        tier.put(b.clone(), blob(300));
        // Replacing b with a same-size blob fits once the old copy is gone
        let evicted = tier.put(b.clone(), blob(300));

        assert_eq!(evicted, 0);
        assert!(tier.contains(&a));
    }

    #[test]
    fn test_oversized_entry_accepted() {
        let (tier, _) = tier(100);
        tier.put(key("S", 0), blob(50));
        tier.put(key("S", 1), blob(500));

        assert_eq!(tier.entry_count(), 1);
        assert!(tier.contains(&key("S", 1)));
        assert_eq!(tier.size_bytes(), 500);
    }

    #[test]
    fn test_remove_series_leaves_others() {
        let (tier, sizes) = tier(10_000);
        tier.put(key("TS_1", 0), blob(10));
        tier.put(key("TS_1", 1), blob(10));
        tier.put(key("TS_10", 0), blob(20));

        assert_eq!(tier.remove_series("TS_1"), 2);
        assert_eq!(tier.entry_count(), 1);
        assert!(tier.contains(&key("TS_10", 0)));
        assert_eq!(sizes.snapshot().memory_bytes, 20);
    }

    #[test]
    fn test_remove_and_clear() {
        let (tier, sizes) = tier(10_000);
        tier.put(key("S", 0), blob(10));
        tier.put(key("S", 1), blob(10));

        assert!(tier.remove(&key("S", 0)));
        assert!(!tier.remove(&key("S", 0)));
        assert_eq!(tier.size_bytes(), 10);

        tier.clear();
        assert_eq!(tier.entry_count(), 0);
        assert_eq!(tier.size_bytes(), 0);
        assert_eq!(sizes.snapshot().memory_bytes, 0);
        assert!(tier.recency_order().is_empty());
    }

    #[test]
    fn test_records_stats() {
        let sizes = SizeTracker::new();
        let stats = shared_stats();
        let tier = MemoryTier::new(100, sizes, stats.clone());

        tier.put(key("S", 0), blob(60));
        tier.get(&key("S", 0));
        tier.get(&key("S", 9));
        tier.put(key("S", 1), blob(60));

        let stats = stats.lock();
        assert_eq!(stats.memory_hits, 1);
        assert_eq!(stats.memory_misses, 1);
        assert_eq!(stats.memory_evictions, 1);
        assert_eq!(stats.memory_entry_count, 1);
    }

    #[derive(Debug, Clone)]
    enum Op {
        Put(u32, usize),
        Get(u32),
        Remove(u32),
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            (0u32..16, 0usize..400).prop_map(|(f, len)| Op::Put(f, len)),
            (0u32..16).prop_map(Op::Get),
            (0u32..16).prop_map(Op::Remove),
        ]
    }

    proptest! {
        #[test]
        fn prop_total_matches_resident_entries(
            capacity in 1u64..1_000,
            ops in proptest::collection::vec(op(), 1..64),
        ) {
            let (tier, sizes) = tier(capacity);
            let mut last_put: Option<(u32, u64)> = None;

            for op in ops {
                match op {
                    Op::Put(frame, len) => {
                        tier.put(key("S", frame), blob(len));
                        last_put = Some((frame, len as u64));
                    }
                    Op::Get(frame) => {
                        tier.get(&key("S", frame));
                    }
                    Op::Remove(frame) => {
                        tier.remove(&key("S", frame));
                        if matches!(last_put, Some((f, _)) if f == frame) {
                            last_put = None;
                        }
                    }
                }

                let inner = tier.inner.lock();
                let sum: u64 = inner.entries.values().map(|e| e.data.len() as u64).sum();
                prop_assert_eq!(inner.total, sum);
                prop_assert_eq!(inner.recency.len(), inner.entries.len());
                drop(inner);

                prop_assert_eq!(sizes.snapshot().memory_bytes, tier.size_bytes());

                // Only a lone oversized entry may exceed capacity
                if tier.size_bytes() > capacity {
                    prop_assert_eq!(tier.entry_count(), 1);
                    let (frame, len) = last_put.unwrap();
                    prop_assert!(tier.contains(&key("S", frame)));
                    prop_assert!(len > capacity);
                }
            }
        }
    }
}
