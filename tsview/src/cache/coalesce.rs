//! Fetch coalescing for preview loads.
//!
//! When several callers ask for the same preview while it is still being
//! loaded (typically a bulk warm-up racing on-demand viewer requests), only
//! one load runs. Every caller receives a clone of its result, success or
//! failure.
//!
//! ```text
//! get(A) ─┐
//!         │                       one task
//! get(A) ─┼──► FetchCoalescer ──► check tiers ─► fetch ─► store
//!         │         │                                       │
//! get(A) ─┘         ▼                                       │
//!             [all callers receive the same result] ◄───────┘
//! ```
//!
//! The load runs in its own task, so it settles even if every caller stops
//! waiting. Its registry entry is removed exactly once, before the result is
//! broadcast, whether the load succeeds, fails, or panics. A call arriving
//! after that always starts a fresh load.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::sync::broadcast;
use tracing::{debug, info};

use crate::cache::key::PreviewKey;
use crate::cache::types::CacheError;
use crate::fetch::FetchError;

/// Result shared between coalesced callers.
pub type FetchResult = Result<Bytes, FetchError>;

/// Statistics for monitoring coalescing effectiveness.
#[derive(Debug, Default, Clone)]
pub struct CoalescerStats {
    /// Total loads requested
    pub total_requests: u64,
    /// Requests that joined a load already in flight
    pub coalesced_requests: u64,
    /// Requests that started a new load
    pub new_requests: u64,
}

impl CoalescerStats {
    /// Returns the coalescing ratio (0.0 to 1.0)
    pub fn coalescing_ratio(&self) -> f64 {
        if self.total_requests == 0 {
            0.0
        } else {
            self.coalesced_requests as f64 / self.total_requests as f64
        }
    }
}

/// Registry of in-flight preview loads.
pub struct FetchCoalescer {
    in_flight: DashMap<PreviewKey, broadcast::Sender<FetchResult>>,
    total_requests: AtomicU64,
    coalesced_requests: AtomicU64,
    new_requests: AtomicU64,
}

/// Removes a registry entry when the load that owns it ends.
struct InFlightGuard {
    coalescer: Arc<FetchCoalescer>,
    key: PreviewKey,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.coalescer.in_flight.remove(&self.key);
    }
}

impl FetchCoalescer {
    pub fn new() -> Self {
        Self {
            in_flight: DashMap::new(),
            total_requests: AtomicU64::new(0),
            coalesced_requests: AtomicU64::new(0),
            new_requests: AtomicU64::new(0),
        }
    }

    /// Run `load` for `key`, or join the load already running for it.
    ///
    /// `load` is only polled when no load for `key` is in flight; otherwise it
    /// is dropped unpolled and the caller waits for the existing one.
    pub async fn run<F>(self: &Arc<Self>, key: &PreviewKey, load: F) -> Result<Bytes, CacheError>
    where
        F: Future<Output = FetchResult> + Send + 'static,
    {
        self.total_requests.fetch_add(1, Ordering::Relaxed);

        // Entry API makes check-and-insert atomic
        let mut rx = match self.in_flight.entry(key.clone()) {
            Entry::Occupied(entry) => {
                let rx = entry.get().subscribe();
                self.coalesced_requests.fetch_add(1, Ordering::Relaxed);
                debug!(key = %key, "Coalescing request - waiting for in-flight load");
                rx
            }
            Entry::Vacant(entry) => {
                let (tx, rx) = broadcast::channel(1);
                entry.insert(tx.clone());
                self.new_requests.fetch_add(1, Ordering::Relaxed);
                debug!(
                    key = %key,
                    in_flight_count = self.in_flight.len(),
                    "New request - starting load"
                );
                self.spawn_load(key.clone(), tx, load);
                rx
            }
        };

        match rx.recv().await {
            Ok(result) => result.map_err(CacheError::from),
            Err(_) => Err(CacheError::FetchAbandoned(key.to_string())),
        }
    }

    fn spawn_load<F>(self: &Arc<Self>, key: PreviewKey, tx: broadcast::Sender<FetchResult>, load: F)
    where
        F: Future<Output = FetchResult> + Send + 'static,
    {
        let guard = InFlightGuard {
            coalescer: Arc::clone(self),
            key,
        };

        tokio::spawn(async move {
            let result = load.await;

            let key = guard.key.clone();
            drop(guard);

            let waiters = tx.receiver_count();
            // Waiters may all have gone away
            let _ = tx.send(result);
            debug!(key = %key, waiters, "Broadcast load result");
        });
    }

    /// Returns a snapshot of the current statistics.
    pub fn stats(&self) -> CoalescerStats {
        CoalescerStats {
            total_requests: self.total_requests.load(Ordering::Relaxed),
            coalesced_requests: self.coalesced_requests.load(Ordering::Relaxed),
            new_requests: self.new_requests.load(Ordering::Relaxed),
        }
    }

    /// Returns the number of loads currently in flight.
    pub fn in_flight_count(&self) -> usize {
        self.in_flight.len()
    }

    /// Whether a load for `key` is in flight.
    pub fn is_in_flight(&self, key: &PreviewKey) -> bool {
        self.in_flight.contains_key(key)
    }

    /// Logs current statistics.
    pub fn log_stats(&self) {
        let stats = self.stats();

        info!(
            total_requests = stats.total_requests,
            coalesced = stats.coalesced_requests,
            new_requests = stats.new_requests,
            in_flight = self.in_flight_count(),
            coalescing_ratio = format!("{:.1}%", stats.coalescing_ratio() * 100.0),
            "Fetch coalescing statistics"
        );
    }
}

impl Default for FetchCoalescer {
    fn default() -> Self {
        Self::new()
    }
}
