// ── Threshold poller ──
//
// Periodic snapshot fetch across tracked hives. Fetches run
// concurrently, each bounded by a timeout, and the joined results are
// handed to the pipeline actor, which applies them in one serial pass.
// A failing hive never prevents the others from updating.

pub mod health;
pub mod threshold;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures_util::future::join_all;
use serde::Serialize;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::command::CommandResult;
use crate::error::CoreError;
use crate::model::{SensorSnapshot, TrackedHive};

use threshold::Breach;

/// Source of current sensor snapshots.
pub trait SnapshotSource: Send + Sync + 'static {
    /// `Ok(None)` when the hive has not reported yet. An unknown hive
    /// fails with [`CoreError::HiveNotFound`].
    fn fetch_snapshot(
        &self,
        hive_id: &str,
    ) -> impl Future<Output = Result<Option<SensorSnapshot>, CoreError>> + Send;
}

// ── Fetch ───────────────────────────────────────────────────────────

#[derive(Debug)]
pub struct FetchOutcome {
    pub hive_id: String,
    pub result: Result<Option<SensorSnapshot>, CoreError>,
}

/// Fetch every hive concurrently. Output order matches `hives`.
pub async fn fetch_all<S: SnapshotSource>(
    source: &S,
    hives: &[TrackedHive],
    timeout: Duration,
) -> Vec<FetchOutcome> {
    let fetches = hives.iter().map(|hive| async move {
        let result = match time::timeout(timeout, source.fetch_snapshot(&hive.id)).await {
            Ok(result) => result,
            Err(_) => Err(CoreError::SnapshotTimeout {
                hive_id: hive.id.clone(),
                timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
            }),
        };
        FetchOutcome {
            hive_id: hive.id.clone(),
            result,
        }
    });
    join_all(fetches).await
}

// ── Report ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HiveBreach {
    pub hive_id: String,
    #[serde(flatten)]
    pub breach: Breach,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HiveFailure {
    pub hive_id: String,
    pub error: String,
}

/// Outcome of one poll cycle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PollReport {
    pub started_at: DateTime<Utc>,
    pub polled: usize,
    /// Hives whose history and status were updated.
    pub updated: Vec<String>,
    /// Hives that had no reading yet.
    pub empty: Vec<String>,
    pub breaches: Vec<HiveBreach>,
    /// Notifications recorded for breaches.
    pub notifications: usize,
    pub failures: Vec<HiveFailure>,
}

impl PollReport {
    pub(crate) fn new(started_at: DateTime<Utc>, polled: usize) -> Self {
        Self {
            started_at,
            polled,
            updated: Vec::new(),
            empty: Vec::new(),
            breaches: Vec::new(),
            notifications: 0,
            failures: Vec::new(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.failures.is_empty()
    }

    /// The aggregate cycle error, if any hive failed.
    pub fn error(&self) -> Option<CoreError> {
        if self.failures.is_empty() {
            return None;
        }
        let detail = self
            .failures
            .iter()
            .map(|f| format!("{}: {}", f.hive_id, f.error))
            .collect::<Vec<_>>()
            .join("; ");
        Some(CoreError::SnapshotFetch {
            hive_id: format!("{} of {} hives", self.failures.len(), self.polled),
            reason: detail,
        })
    }
}

// ── Background task ─────────────────────────────────────────────────

/// Joined fetch results for one cycle, tagged with the poller generation
/// that produced them.
#[derive(Debug)]
pub(crate) struct PollDelivery {
    pub(crate) generation: Option<u64>,
    pub(crate) started_at: DateTime<Utc>,
    pub(crate) outcomes: Vec<FetchOutcome>,
    /// Set for manual polls awaiting a report.
    pub(crate) reply: Option<oneshot::Sender<Result<CommandResult, CoreError>>>,
}

pub(crate) struct PollerTask {
    pub(crate) generation: u64,
    cancel: CancellationToken,
    handle: tokio::task::JoinHandle<()>,
}

impl PollerTask {
    pub(crate) fn spawn<S: SnapshotSource>(
        generation: u64,
        source: Arc<S>,
        hives: watch::Receiver<Arc<Vec<TrackedHive>>>,
        tx: mpsc::UnboundedSender<PollDelivery>,
        period: Duration,
        fetch_timeout: Duration,
        parent: &CancellationToken,
    ) -> Self {
        let cancel = parent.child_token();
        let handle = tokio::spawn(poll_task(
            generation,
            source,
            hives,
            tx,
            period,
            fetch_timeout,
            cancel.clone(),
        ));
        Self {
            generation,
            cancel,
            handle,
        }
    }

    pub(crate) fn stop(self) {
        self.cancel.cancel();
        self.handle.abort();
    }
}

async fn poll_task<S: SnapshotSource>(
    generation: u64,
    source: Arc<S>,
    hives: watch::Receiver<Arc<Vec<TrackedHive>>>,
    tx: mpsc::UnboundedSender<PollDelivery>,
    period: Duration,
    fetch_timeout: Duration,
    cancel: CancellationToken,
) {
    let mut interval = time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval.tick().await; // consume immediate first tick

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = interval.tick() => {
                let targets = hives.borrow().clone();
                if targets.is_empty() {
                    debug!("no tracked hives, skipping poll cycle");
                    continue;
                }

                let started_at = Utc::now();
                let outcomes = tokio::select! {
                    biased;
                    () = cancel.cancelled() => break,
                    outcomes = fetch_all(&*source, &targets, fetch_timeout) => outcomes,
                };

                let delivery = PollDelivery {
                    generation: Some(generation),
                    started_at,
                    outcomes,
                    reply: None,
                };
                if tx.send(delivery).is_err() {
                    warn!("pipeline gone, stopping poller");
                    break;
                }
            }
        }
    }

    debug!(generation, "poller stopped");
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    struct FixedSource {
        readings: HashMap<String, f64>,
        slow: Option<String>,
    }

    impl SnapshotSource for FixedSource {
        async fn fetch_snapshot(&self, hive_id: &str) -> Result<Option<SensorSnapshot>, CoreError> {
            if self.slow.as_deref() == Some(hive_id) {
                time::sleep(Duration::from_secs(60)).await;
            }
            match self.readings.get(hive_id) {
                Some(t) => Ok(Some(SensorSnapshot::from_iter([("temperature", *t)]))),
                None => Err(CoreError::HiveNotFound {
                    hive_id: hive_id.to_owned(),
                }),
            }
        }
    }

    fn hives(ids: &[&str]) -> Vec<TrackedHive> {
        ids.iter().map(|id| TrackedHive::new(*id, *id)).collect()
    }

    #[tokio::test(start_paused = true)]
    async fn slow_hive_times_out_without_blocking_others() {
        let source = FixedSource {
            readings: HashMap::from([("a".to_owned(), 35.0), ("b".to_owned(), 36.0)]),
            slow: Some("b".into()),
        };

        let outcomes = fetch_all(&source, &hives(&["a", "b", "c"]), Duration::from_secs(10)).await;

        assert_eq!(outcomes.len(), 3);
        assert!(matches!(outcomes[0].result, Ok(Some(_))));
        assert!(matches!(
            outcomes[1].result,
            Err(CoreError::SnapshotTimeout { timeout_ms: 10_000, .. })
        ));
        assert!(matches!(outcomes[2].result, Err(CoreError::HiveNotFound { .. })));
    }

    #[test]
    fn report_aggregates_failures() {
        let mut report = PollReport::new(Utc::now(), 3);
        assert!(report.is_ok());
        assert!(report.error().is_none());

        report.failures.push(HiveFailure {
            hive_id: "c".into(),
            error: "not found".into(),
        });
        let err = report.error().unwrap();
        assert!(err.to_string().contains("1 of 3 hives"));
    }

    #[tokio::test(start_paused = true)]
    async fn task_delivers_each_period_until_stopped() {
        let source = Arc::new(FixedSource {
            readings: HashMap::from([("a".to_owned(), 35.0)]),
            slow: None,
        });
        let (_hives_tx, hives_rx) = watch::channel(Arc::new(hives(&["a"])));
        let (tx, mut rx) = mpsc::unbounded_channel();
        let root = CancellationToken::new();

        let task = PollerTask::spawn(
            4,
            source,
            hives_rx,
            tx,
            Duration::from_secs(30),
            Duration::from_secs(10),
            &root,
        );

        let first = rx.recv().await.unwrap();
        assert_eq!(first.generation, Some(4));
        assert_eq!(first.outcomes.len(), 1);
        let _second = rx.recv().await.unwrap();

        task.stop();
        assert!(rx.recv().await.is_none());
    }
}
