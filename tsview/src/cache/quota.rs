//! Quota planning for the durable tier.
//!
//! Victims are chosen in two phases:
//!
//! 1. previews that are not resident in the memory tier, in key order
//! 2. previews that are resident, oldest memory access first
//!
//! Planning stops as soon as enough bytes are covered, even part way through
//! a phase.

use std::collections::{BTreeMap, HashSet};

use crate::cache::key::PreviewKey;

/// Decides which durable entries to evict before admitting a write.
#[derive(Debug, Clone, Copy)]
pub struct QuotaEvictor {
    capacity: u64,
}

impl QuotaEvictor {
    pub fn new(capacity: u64) -> Self {
        Self { capacity }
    }

    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    /// Bytes that must be freed so `incoming` fits next to `current`.
    pub fn space_needed(&self, current: u64, incoming: u64) -> u64 {
        (current + incoming).saturating_sub(self.capacity)
    }

    /// Every eviction candidate in priority order.
    ///
    /// `index` is the durable tier's key -> size map and `memory_recency`
    /// lists memory-resident keys oldest first. `incoming` is never offered.
    pub fn candidates(
        index: &BTreeMap<PreviewKey, u64>,
        memory_recency: &[PreviewKey],
        incoming: &PreviewKey,
    ) -> Vec<(PreviewKey, u64)> {
        let resident: HashSet<&PreviewKey> = memory_recency.iter().collect();

        let cold = index
            .iter()
            .filter(|(key, _)| *key != incoming && !resident.contains(key))
            .map(|(key, size)| (key.clone(), *size));

        let warm = memory_recency.iter().filter_map(|key| {
            if key == incoming {
                return None;
            }
            index.get(key).map(|size| (key.clone(), *size))
        });

        cold.chain(warm).collect()
    }

    /// Shortest candidate prefix that frees enough space for `incoming_size`.
    ///
    /// `current` must already exclude any stored copy of `incoming`. If every
    /// candidate together is not enough, all of them are returned.
    pub fn plan(
        &self,
        index: &BTreeMap<PreviewKey, u64>,
        memory_recency: &[PreviewKey],
        incoming: &PreviewKey,
        current: u64,
        incoming_size: u64,
    ) -> Vec<(PreviewKey, u64)> {
        let mut needed = self.space_needed(current, incoming_size);
        if needed == 0 {
            return Vec::new();
        }

        let mut plan = Vec::new();
        for (key, size) in Self::candidates(index, memory_recency, incoming) {
            if needed == 0 {
                break;
            }
            needed = needed.saturating_sub(size);
            plan.push((key, size));
        }
        plan
    }
}
