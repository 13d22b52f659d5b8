//! Cache statistics tracking and reporting.

use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;

use crate::config::format_size;

/// Statistics shared by every component of one cache instance.
pub type SharedStats = Arc<Mutex<CacheStats>>;

/// Create an empty shared statistics block.
pub fn shared_stats() -> SharedStats {
    Arc::new(Mutex::new(CacheStats::new()))
}

/// Cache statistics for monitoring and debugging.
#[derive(Debug, Clone)]
pub struct CacheStats {
    // Memory tier
    pub memory_hits: u64,
    pub memory_misses: u64,
    pub memory_size_bytes: u64,
    pub memory_entry_count: usize,
    pub memory_evictions: u64,

    // Durable tier
    pub durable_hits: u64,
    pub durable_misses: u64,
    pub durable_size_bytes: u64,
    pub durable_entry_count: usize,
    pub durable_evictions: u64,
    pub durable_writes: u64,
    pub durable_write_failures: u64,
    pub durable_read_failures: u64,

    // Upstream
    pub fetches: u64,
    pub fetch_failures: u64,
    pub bytes_fetched: u64,
    /// Filled in from the fetch coalescer when a snapshot is taken
    pub coalesced_requests: u64,

    pub created_at: Instant,
}

impl Default for CacheStats {
    fn default() -> Self {
        Self::new()
    }
}

impl CacheStats {
    pub fn new() -> Self {
        Self {
            memory_hits: 0,
            memory_misses: 0,
            memory_size_bytes: 0,
            memory_entry_count: 0,
            memory_evictions: 0,
            durable_hits: 0,
            durable_misses: 0,
            durable_size_bytes: 0,
            durable_entry_count: 0,
            durable_evictions: 0,
            durable_writes: 0,
            durable_write_failures: 0,
            durable_read_failures: 0,
            fetches: 0,
            fetch_failures: 0,
            bytes_fetched: 0,
            coalesced_requests: 0,
            created_at: Instant::now(),
        }
    }

    /// Memory tier hit rate (0.0 to 1.0).
    pub fn memory_hit_rate(&self) -> f64 {
        ratio(self.memory_hits, self.memory_hits + self.memory_misses)
    }

    /// Durable tier hit rate (0.0 to 1.0), over lookups that missed memory.
    pub fn durable_hit_rate(&self) -> f64 {
        ratio(self.durable_hits, self.durable_hits + self.durable_misses)
    }

    /// Fraction of lookups answered by either tier.
    pub fn overall_hit_rate(&self) -> f64 {
        let hits = self.memory_hits + self.durable_hits;
        ratio(hits, hits + self.durable_misses)
    }

    pub fn uptime(&self) -> std::time::Duration {
        self.created_at.elapsed()
    }

    pub fn record_memory_hit(&mut self) {
        self.memory_hits += 1;
    }

    pub fn record_memory_miss(&mut self) {
        self.memory_misses += 1;
    }

    pub fn record_memory_eviction(&mut self, count: u64) {
        self.memory_evictions += count;
    }

    pub fn record_durable_hit(&mut self) {
        self.durable_hits += 1;
    }

    pub fn record_durable_miss(&mut self) {
        self.durable_misses += 1;
    }

    pub fn record_durable_eviction(&mut self, count: u64) {
        self.durable_evictions += count;
    }

    pub fn record_durable_write(&mut self) {
        self.durable_writes += 1;
    }

    pub fn record_durable_write_failure(&mut self) {
        self.durable_write_failures += 1;
    }

    pub fn record_durable_read_failure(&mut self) {
        self.durable_read_failures += 1;
    }

    /// Record a successful upstream fetch.
    pub fn record_fetch(&mut self, bytes: u64) {
        self.fetches += 1;
        self.bytes_fetched += bytes;
    }

    pub fn record_fetch_failure(&mut self) {
        self.fetch_failures += 1;
    }

    pub fn update_memory_size(&mut self, size_bytes: u64, entry_count: usize) {
        self.memory_size_bytes = size_bytes;
        self.memory_entry_count = entry_count;
    }

    pub fn update_durable_size(&mut self, size_bytes: u64, entry_count: usize) {
        self.durable_size_bytes = size_bytes;
        self.durable_entry_count = entry_count;
    }
}

fn ratio(part: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 / total as f64
    }
}

/// Snapshot of cache statistics for reporting.
#[derive(Debug, Clone)]
pub struct CacheStatistics {
    pub stats: CacheStats,
    pub memory_hit_rate_percent: f64,
    pub durable_hit_rate_percent: f64,
    pub overall_hit_rate_percent: f64,
    pub uptime_secs: u64,
}

impl CacheStatistics {
    pub fn from_stats(stats: &CacheStats) -> Self {
        Self {
            stats: stats.clone(),
            memory_hit_rate_percent: stats.memory_hit_rate() * 100.0,
            durable_hit_rate_percent: stats.durable_hit_rate() * 100.0,
            overall_hit_rate_percent: stats.overall_hit_rate() * 100.0,
            uptime_secs: stats.uptime().as_secs(),
        }
    }

    /// Format statistics as a human-readable report.
    pub fn format(&self) -> String {
        let stats = &self.stats;

        format!(
            r#"tsview Preview Cache Statistics

MEMORY TIER
  Entries:     {}
  Size:        {}
  Hits:        {}
  Misses:      {}
  Hit Rate:    {:.1}%
  Evictions:   {}

DURABLE TIER
  Entries:     {}
  Size:        {}
  Hits:        {}
  Misses:      {}
  Hit Rate:    {:.1}%
  Writes:      {}
  Failures:    {} write / {} read
  Evictions:   {}

UPSTREAM
  Fetches:     {}
  Failures:    {}
  Bytes:       {}
  Coalesced:   {}

OVERALL
  Hit Rate:    {:.1}%
  Uptime:      {}s
"#,
            stats.memory_entry_count,
            format_size(stats.memory_size_bytes),
            stats.memory_hits,
            stats.memory_misses,
            self.memory_hit_rate_percent,
            stats.memory_evictions,
            stats.durable_entry_count,
            format_size(stats.durable_size_bytes),
            stats.durable_hits,
            stats.durable_misses,
            self.durable_hit_rate_percent,
            stats.durable_writes,
            stats.durable_write_failures,
            stats.durable_read_failures,
            stats.durable_evictions,
            stats.fetches,
            stats.fetch_failures,
            format_size(stats.bytes_fetched),
            stats.coalesced_requests,
            self.overall_hit_rate_percent,
            self.uptime_secs,
        )
    }
}
