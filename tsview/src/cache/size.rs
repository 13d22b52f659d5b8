//! Observable byte totals for both cache tiers.
//!
//! Each tier publishes its resident byte count here after every mutation.
//! Consumers (status displays, the CLI, warning thresholds) either take a
//! [`TierSizes`] snapshot or subscribe for change notifications.

use std::sync::Arc;

use tokio::sync::watch;

/// Fraction of capacity at which a tier is reported as [`UsageLevel::Warning`].
pub const WARNING_THRESHOLD: f64 = 0.80;

/// Fraction of capacity at which a tier is reported as [`UsageLevel::Critical`].
pub const CRITICAL_THRESHOLD: f64 = 0.95;

/// Bytes resident in each tier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TierSizes {
    pub memory_bytes: u64,
    pub durable_bytes: u64,
}

/// How full a tier is relative to its capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UsageLevel {
    Normal,
    Warning,
    Critical,
}

impl UsageLevel {
    /// Classify `used` bytes against `capacity`.
    ///
    /// A zero capacity is critical as soon as anything is resident.
    pub fn classify(used: u64, capacity: u64) -> Self {
        if capacity == 0 {
            return if used == 0 { Self::Normal } else { Self::Critical };
        }

        let ratio = used as f64 / capacity as f64;
        if ratio >= CRITICAL_THRESHOLD {
            Self::Critical
        } else if ratio >= WARNING_THRESHOLD {
            Self::Warning
        } else {
            Self::Normal
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::Warning => "warning",
            Self::Critical => "critical",
        }
    }
}

impl std::fmt::Display for UsageLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Shared publisher of tier byte totals.
///
/// Cloning is cheap; every clone publishes to the same channel.
#[derive(Debug, Clone)]
pub struct SizeTracker {
    sender: Arc<watch::Sender<TierSizes>>,
}

impl Default for SizeTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl SizeTracker {
    pub fn new() -> Self {
        let (sender, _) = watch::channel(TierSizes::default());
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Current totals.
    pub fn snapshot(&self) -> TierSizes {
        *self.sender.borrow()
    }

    /// Receive a notification whenever either total changes.
    pub fn subscribe(&self) -> watch::Receiver<TierSizes> {
        self.sender.subscribe()
    }

    pub fn set_memory(&self, bytes: u64) {
        self.sender.send_if_modified(|sizes| {
            let changed = sizes.memory_bytes != bytes;
            sizes.memory_bytes = bytes;
            changed
        });
    }

    pub fn set_durable(&self, bytes: u64) {
        self.sender.send_if_modified(|sizes| {
            let changed = sizes.durable_bytes != bytes;
            sizes.durable_bytes = bytes;
            changed
        });
    }
}
