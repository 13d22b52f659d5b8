//! Batched work over every frame of a set of tilt series.

use std::future::Future;

use futures::stream::{FuturesUnordered, StreamExt};
use tracing::{debug, warn};

use crate::cache::key::PreviewKey;
use crate::cache::types::CacheError;
use crate::fetch::SeriesFrames;

/// Progress of a bulk operation, reported after each frame settles.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BulkProgress {
    pub completed: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub total: usize,
}

impl BulkProgress {
    /// Completion as a percentage (0.0 to 100.0).
    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            100.0
        } else {
            self.completed as f64 * 100.0 / self.total as f64
        }
    }

    fn record(&mut self, ok: bool) {
        self.completed += 1;
        if ok {
            self.succeeded += 1;
        } else {
            self.failed += 1;
        }
    }
}

/// Final outcome of a bulk operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BulkReport {
    pub success: usize,
    pub failed: usize,
    pub total: usize,
}

impl From<BulkProgress> for BulkReport {
    fn from(progress: BulkProgress) -> Self {
        Self {
            success: progress.succeeded,
            failed: progress.failed,
            total: progress.total,
        }
    }
}

/// Expand series into one key per frame, keeping invalid keys as errors.
pub(crate) fn frame_keys(
    series: &[SeriesFrames],
    bin: u8,
    quality: u8,
) -> Vec<Result<PreviewKey, CacheError>> {
    series
        .iter()
        .flat_map(|s| {
            s.frames
                .iter()
                .map(move |&frame| PreviewKey::new(s.series_id.as_str(), frame, bin, quality))
        })
        .collect()
}

/// Run `op` for every key, `width` at a time.
///
/// Each batch is awaited to completion before the next starts. Keys that
/// failed validation count as failures without running `op`.
pub(crate) async fn run_batched<Op, Fut, P>(
    keys: Vec<Result<PreviewKey, CacheError>>,
    width: usize,
    op: Op,
    mut on_progress: P,
) -> BulkReport
where
    Op: Fn(PreviewKey) -> Fut,
    Fut: Future<Output = Result<(), CacheError>>,
    P: FnMut(&BulkProgress),
{
    let mut progress = BulkProgress {
        total: keys.len(),
        ..BulkProgress::default()
    };
    let mut keys = keys.into_iter().peekable();

    while keys.peek().is_some() {
        let mut pending = FuturesUnordered::new();

        for item in keys.by_ref().take(width.max(1)) {
            match item {
                Ok(key) => {
                    let fut = op(key.clone());
                    pending.push(async move { (key, fut.await) });
                }
                Err(e) => {
                    warn!(error = %e, "Skipping invalid frame");
                    progress.record(false);
                    on_progress(&progress);
                }
            }
        }

        while let Some((key, result)) = pending.next().await {
            match result {
                Ok(()) => progress.record(true),
                Err(e) => {
                    debug!(key = %key, error = %e, "Bulk frame failed");
                    progress.record(false);
                }
            }
            on_progress(&progress);
        }
    }

    progress.into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::FetchError;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn test_frame_keys_expands_series() {
        let series = vec![
            SeriesFrames::new("A", vec![0, 1]),
            SeriesFrames::new("", vec![5]),
            SeriesFrames::new("B", vec![2]),
        ];
        let keys = frame_keys(&series, 8, 90);

        assert_eq!(keys.len(), 4);
        assert_eq!(keys[0].as_ref().unwrap().to_string(), "A/0/bin8/q90");
        assert!(keys[2].is_err());
        assert_eq!(keys[3].as_ref().unwrap().to_string(), "B/2/bin8/q90");
    }

    #[test]
    fn test_progress_percent() {
        let progress = BulkProgress {
            completed: 1,
            succeeded: 1,
            failed: 0,
            total: 4,
        };
        assert_eq!(progress.percent(), 25.0);
        assert_eq!(BulkProgress::default().percent(), 100.0);
    }

    #[tokio::test]
    async fn test_counts_and_progress() {
        let series = vec![SeriesFrames::new("A", vec![0, 1, 2, 3, 4])];
        let mut seen = Vec::new();

        let report = run_batched(
            frame_keys(&series, 8, 90),
            2,
            |key| async move {
                if key.frame() % 2 == 0 {
                    Ok(())
                } else {
                    Err(CacheError::Fetch(FetchError::EmptyBody(key.to_string())))
                }
            },
            |p| seen.push(*p),
        )
        .await;

        assert_eq!(
            report,
            BulkReport {
                success: 3,
                failed: 2,
                total: 5
            }
        );
        assert_eq!(seen.len(), 5);
        assert_eq!(seen.iter().map(|p| p.completed).collect::<Vec<_>>(), vec![1, 2, 3, 4, 5]);
    }

    #[tokio::test]
    async fn test_width_bounds_concurrency() {
        let series = vec![SeriesFrames::new("A", (0..10).collect())];
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let report = run_batched(
            frame_keys(&series, 8, 90),
            3,
            |_| {
                let active = Arc::clone(&active);
                let peak = Arc::clone(&peak);
                async move {
                    let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(5)).await;
                    active.fetch_sub(1, Ordering::SeqCst);
                    Ok(())
                }
            },
            |_| {},
        )
        .await;

        assert_eq!(report.success, 10);
        assert_eq!(peak.load(Ordering::SeqCst), 3);
    }
}
