//! Background progress reporting for an enrichment pass

use crate::types::Event;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

/// Interval between progress emissions
pub(crate) const PROGRESS_UPDATE_INTERVAL: Duration = Duration::from_millis(500);

/// Shared counters updated by the merge loop and read by the reporter
#[derive(Clone, Debug, Default)]
pub(crate) struct ProgressCounters {
    /// Records handled so far, enriched or failed
    pub processed: Arc<AtomicU64>,
    /// Records that failed so far
    pub failed: Arc<AtomicU64>,
}

impl ProgressCounters {
    pub(crate) fn record_success(&self) {
        self.processed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_failure(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
        self.processed.fetch_add(1, Ordering::Relaxed);
    }

    /// Current progress as an event
    pub(crate) fn snapshot(&self, total: u64) -> Event {
        let processed = self.processed.load(Ordering::Relaxed);
        let failed = self.failed.load(Ordering::Relaxed);
        let percent = if total > 0 {
            (processed as f32 / total as f32) * 100.0
        } else {
            100.0
        };
        Event::Enriching {
            processed,
            total,
            failed: if failed > 0 { Some(failed) } else { None },
            percent,
        }
    }
}

/// Spawn a task emitting [`Event::Enriching`] every `interval` until `cancel_token` fires.
///
/// A final snapshot is sent on cancellation so subscribers always see the end state.
pub(crate) fn spawn_progress_reporter(
    counters: ProgressCounters,
    total: u64,
    interval: Duration,
    event_tx: broadcast::Sender<Event>,
    cancel_token: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        let mut last_reported = None;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let processed = counters.processed.load(Ordering::Relaxed);
                    if last_reported == Some(processed) {
                        continue;
                    }
                    last_reported = Some(processed);
                    tracing::debug!(processed, total, "Enrichment progress");
                    event_tx.send(counters.snapshot(total)).ok();
                }
                _ = cancel_token.cancelled() => {
                    event_tx.send(counters.snapshot(total)).ok();
                    break;
                }
            }
        }
    })
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_reports_failures_only_when_present() {
        let counters = ProgressCounters::default();
        counters.record_success();
        assert_eq!(
            counters.snapshot(4),
            Event::Enriching {
                processed: 1,
                total: 4,
                failed: None,
                percent: 25.0
            }
        );

        counters.record_failure();
        match counters.snapshot(4) {
            Event::Enriching {
                processed, failed, ..
            } => {
                assert_eq!(processed, 2);
                assert_eq!(failed, Some(1));
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn empty_pass_is_complete() {
        match ProgressCounters::default().snapshot(0) {
            Event::Enriching { percent, .. } => assert_eq!(percent, 100.0),
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[tokio::test]
    async fn reporter_sends_final_snapshot_on_cancel() {
        let (tx, mut rx) = broadcast::channel(16);
        let counters = ProgressCounters::default();
        let token = CancellationToken::new();
        let handle = spawn_progress_reporter(
            counters.clone(),
            2,
            Duration::from_secs(60),
            tx,
            token.clone(),
        );

        counters.record_success();
        counters.record_success();
        token.cancel();
        handle.await.unwrap();

        let mut last = None;
        while let Ok(event) = rx.try_recv() {
            last = Some(event);
        }
        assert!(matches!(
            last,
            Some(Event::Enriching { processed: 2, total: 2, .. })
        ));
    }
}
