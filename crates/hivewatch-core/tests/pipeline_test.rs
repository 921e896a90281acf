#![allow(clippy::unwrap_used)]
// End-to-end tests for the alert pipeline actor, driven through a fake
// feed and a fake snapshot source.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use pretty_assertions::assert_eq;

use hivewatch_core::state::{StateStore, keys};
use hivewatch_core::{
    CoreError, EventFeed, FeedSink, FileStateStore, HiveStatus, LOG_CAPACITY, MemoryStateStore,
    Pipeline, PipelineConfig, RawEvent, SensorSnapshot, Severity, SnapshotSource,
    SubscriptionHandle, SubscriptionState, TrackedHive,
};

// ── Fakes ───────────────────────────────────────────────────────────

#[derive(Default)]
struct FeedState {
    sinks: Mutex<Vec<FeedSink>>,
    since: Mutex<Vec<i64>>,
    closed: Mutex<Vec<u64>>,
}

#[derive(Clone, Default)]
struct FakeFeed {
    state: Arc<FeedState>,
}

impl FakeFeed {
    /// Deliver through the most recent subscription.
    fn emit(&self, event: RawEvent) {
        let sinks = self.state.sinks.lock().unwrap();
        sinks.last().unwrap().deliver(event);
    }

    /// Deliver through the `index`-th subscription ever opened.
    fn emit_via(&self, index: usize, event: RawEvent) {
        let sinks = self.state.sinks.lock().unwrap();
        sinks[index].deliver(event);
    }

    fn since(&self) -> Vec<i64> {
        self.state.since.lock().unwrap().clone()
    }

    fn closed(&self) -> Vec<u64> {
        self.state.closed.lock().unwrap().clone()
    }
}

struct FakeHandle {
    generation: u64,
    state: Arc<FeedState>,
}

impl SubscriptionHandle for FakeHandle {
    fn close(&mut self) {
        self.state.closed.lock().unwrap().push(self.generation);
    }
}

impl EventFeed for FakeFeed {
    type Handle = FakeHandle;

    fn subscribe(&self, since: i64, sink: FeedSink) -> Result<FakeHandle, CoreError> {
        let generation = sink.generation();
        self.state.since.lock().unwrap().push(since);
        self.state.sinks.lock().unwrap().push(sink);
        Ok(FakeHandle {
            generation,
            state: Arc::clone(&self.state),
        })
    }
}

#[derive(Clone, Default)]
struct FakeSource {
    readings: Arc<Mutex<HashMap<String, SensorSnapshot>>>,
}

impl FakeSource {
    fn set(&self, hive_id: &str, metrics: &[(&str, f64)]) {
        let snapshot = metrics.iter().map(|(k, v)| (*k, *v)).collect();
        self.readings
            .lock()
            .unwrap()
            .insert(hive_id.to_owned(), snapshot);
    }
}

impl SnapshotSource for FakeSource {
    async fn fetch_snapshot(&self, hive_id: &str) -> Result<Option<SensorSnapshot>, CoreError> {
        let readings = self.readings.lock().unwrap().clone();
        readings
            .get(hive_id)
            .cloned()
            .map(Some)
            .ok_or_else(|| CoreError::HiveNotFound {
                hive_id: hive_id.to_owned(),
            })
    }
}

// ── Helpers ─────────────────────────────────────────────────────────

fn event(key: &str, hive: &str, event_type: &str, ts: i64) -> RawEvent {
    RawEvent {
        key: key.into(),
        hive_id: hive.into(),
        event_type: event_type.into(),
        timestamp: ts,
        payload: serde_json::Value::Null,
    }
}

fn quiet_config() -> PipelineConfig {
    PipelineConfig {
        background_sync: false,
        ..PipelineConfig::default()
    }
}

async fn wait_for(cond: impl Fn() -> bool) {
    for _ in 0..300 {
        if cond() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached");
}

async fn wait_for_log_len(pipeline: &Pipeline, len: usize) {
    wait_for(|| pipeline.notifications().latest().len() == len).await;
}

async fn started(
    config: PipelineConfig,
    store: Arc<dyn StateStore>,
    hives: &[(&str, &str)],
) -> (Pipeline, FakeFeed, FakeSource) {
    let feed = FakeFeed::default();
    let source = FakeSource::default();
    let pipeline = Pipeline::spawn(config, feed.clone(), source.clone(), store);
    pipeline.set_authenticated(true).await.unwrap();
    pipeline
        .set_tracked_hives(
            hives
                .iter()
                .map(|(id, name)| TrackedHive::new(*id, *name))
                .collect(),
        )
        .await
        .unwrap();
    (pipeline, feed, source)
}

// ── Feed path ───────────────────────────────────────────────────────

#[tokio::test]
async fn varroa_event_above_watermark_is_recorded() {
    let store = Arc::new(MemoryStateStore::new());
    store.save(keys::WATERMARK, "1000").unwrap();

    let (pipeline, feed, _) = started(quiet_config(), store, &[("h1", "Orchard")]).await;
    assert_eq!(feed.since(), vec![1001]);

    feed.emit(event("k1", "h1", "varroa", 1001));
    wait_for_log_len(&pipeline, 1).await;

    let log = pipeline.notifications().latest();
    let n = &log[0];
    assert_eq!(n.title, "Varroa Mite Outbreak!");
    assert_eq!(n.severity, Severity::High);
    assert_eq!(n.event_id.as_ref().unwrap().to_string(), "h1|varroa|1001");
    assert!(n.message.contains("Orchard"));
    assert_eq!(pipeline.watermark(), 1001);

    let popup = pipeline.popup().latest();
    assert!(popup.visible);
    assert_eq!(popup.current.unwrap().id, n.id);

    pipeline.shutdown().await;
}

#[tokio::test]
async fn watermark_tracks_max_regardless_of_order() {
    let store = Arc::new(MemoryStateStore::new());
    let (pipeline, feed, _) = started(quiet_config(), store.clone(), &[("h1", "A")]).await;

    for (key, ts) in [("a", 5), ("b", 3), ("c", 9), ("d", 7)] {
        feed.emit(event(key, "h1", "swarm", ts));
    }
    feed.emit(event("sentinel", "h1", "feeding", 12));
    wait_for_log_len(&pipeline, 3).await;

    assert_eq!(pipeline.watermark(), 12);
    assert_eq!(store.load(keys::WATERMARK).unwrap().as_deref(), Some("12"));

    let timestamps: Vec<_> = pipeline
        .notifications()
        .latest()
        .iter()
        .map(|n| n.event_timestamp.unwrap())
        .collect();
    assert_eq!(timestamps, vec![12, 9, 5]);

    pipeline.shutdown().await;
}

#[tokio::test]
async fn replay_across_resubscribe_records_once() {
    let store = Arc::new(MemoryStateStore::new());
    let (pipeline, feed, _) = started(quiet_config(), store, &[("h1", "A")]).await;

    feed.emit(event("k1", "h1", "swarm", 10));
    wait_for_log_len(&pipeline, 1).await;

    pipeline
        .set_tracked_hives(vec![TrackedHive::new("h1", "A"), TrackedHive::new("h2", "B")])
        .await
        .unwrap();
    assert_eq!(feed.since(), vec![1, 11]);
    assert_eq!(feed.closed(), vec![1]);

    // Same event again, under its original key and under a fresh one.
    feed.emit(event("k1", "h1", "swarm", 10));
    feed.emit(event("k1-replayed", "h1", "swarm", 10));
    // A late delivery through the closed subscription.
    feed.emit_via(0, event("late", "h2", "humidity", 30));
    feed.emit(event("sentinel", "h2", "feeding", 20));
    wait_for_log_len(&pipeline, 2).await;

    let log = pipeline.notifications().latest();
    let swarm = log.iter().filter(|n| n.event_type == "swarm").count();
    assert_eq!(swarm, 1);
    assert!(log.iter().all(|n| n.event_type != "humidity"));
    assert_eq!(pipeline.watermark(), 20);

    pipeline.shutdown().await;
}

#[tokio::test]
async fn unowned_events_never_reach_the_log() {
    let store = Arc::new(MemoryStateStore::new());
    let (pipeline, feed, _) = started(quiet_config(), store, &[("h1", "A")]).await;

    feed.emit(event("x1", "stranger", "swarm", 100));
    feed.emit(event("sentinel", "h1", "feeding", 50));
    wait_for_log_len(&pipeline, 1).await;

    let log = pipeline.notifications().latest();
    assert_eq!(log[0].hive_id, "h1");
    assert_eq!(pipeline.watermark(), 50);

    pipeline.shutdown().await;
}

#[tokio::test]
async fn unsaved_watermark_does_not_block_delivery() {
    let store = Arc::new(MemoryStateStore::new());
    let (pipeline, feed, _) = started(quiet_config(), store.clone(), &[("h1", "A")]).await;
    store.fail_next_saves(100);

    feed.emit(event("k1", "h1", "swarm", 10));
    wait_for_log_len(&pipeline, 1).await;

    assert_eq!(pipeline.watermark(), 10);
    assert!(pipeline.popup().latest().visible);

    pipeline.shutdown().await;
}

// ── Subscription lifecycle ──────────────────────────────────────────

#[tokio::test]
async fn logout_and_empty_hive_set_close_the_feed() {
    let store = Arc::new(MemoryStateStore::new());
    let (pipeline, feed, _) = started(quiet_config(), store, &[("h1", "A")]).await;
    assert!(matches!(
        pipeline.subscription_state().latest(),
        SubscriptionState::Subscribed { generation: 1, since: 1 }
    ));

    // Unchanged inputs do not churn the handle.
    pipeline.set_authenticated(true).await.unwrap();
    assert_eq!(feed.since().len(), 1);

    pipeline.set_authenticated(false).await.unwrap();
    assert_eq!(pipeline.subscription_state().latest(), SubscriptionState::Idle);
    assert_eq!(feed.closed(), vec![1]);

    pipeline.set_authenticated(true).await.unwrap();
    pipeline.set_tracked_hives(Vec::new()).await.unwrap();
    assert_eq!(pipeline.subscription_state().latest(), SubscriptionState::Idle);
    assert_eq!(feed.closed(), vec![1, 2]);

    pipeline.shutdown().await;
}

#[tokio::test]
async fn restart_resumes_from_persisted_state() {
    let dir = tempfile::tempdir().unwrap();
    let store: Arc<dyn StateStore> = Arc::new(FileStateStore::new(dir.path()));

    let (first, feed, _) = started(quiet_config(), Arc::clone(&store), &[("h1", "A")]).await;
    feed.emit(event("k1", "h1", "treatment", 500));
    wait_for_log_len(&first, 1).await;
    first.shutdown().await;
    assert_eq!(feed.closed(), vec![1]);

    let (second, feed, _) = started(quiet_config(), store, &[("h1", "A")]).await;
    assert_eq!(second.watermark(), 500);
    assert_eq!(feed.since(), vec![501]);
    assert_eq!(second.notifications().latest().len(), 1);
    assert!(!second.popup().latest().visible);

    feed.emit(event("k1-again", "h1", "treatment", 500));
    feed.emit(event("sentinel", "h1", "feeding", 501));
    wait_for_log_len(&second, 2).await;
    assert_eq!(second.notifications().latest()[1].event_type, "treatment");

    second.shutdown().await;
}

// ── Notification log & popup ────────────────────────────────────────

#[tokio::test]
async fn log_keeps_newest_fifty() {
    let store = Arc::new(MemoryStateStore::new());
    let pipeline = Pipeline::spawn(quiet_config(), FakeFeed::default(), FakeSource::default(), store);

    let mut ids = Vec::new();
    for i in 0..=LOG_CAPACITY {
        let n = pipeline
            .trigger_manual("feeding", &format!("h{i}"), "Hive")
            .await
            .unwrap();
        ids.push(n.id);
    }

    let log = pipeline.notifications().latest();
    assert_eq!(log.len(), LOG_CAPACITY);
    assert_eq!(log[0].id, ids[LOG_CAPACITY]);
    assert!(log.iter().all(|n| n.id != ids[0]));

    pipeline.shutdown().await;
}

#[tokio::test]
async fn newer_notification_supersedes_popup() {
    let store = Arc::new(MemoryStateStore::new());
    let pipeline = Pipeline::spawn(quiet_config(), FakeFeed::default(), FakeSource::default(), store);

    let a = pipeline.trigger_manual("swarm", "h1", "A").await.unwrap();
    assert!(pipeline.mark_read(&a.id).await.unwrap());
    let b = pipeline.trigger_manual("humidity", "h2", "B").await.unwrap();

    let popup = pipeline.popup().latest();
    assert_eq!(popup.current.unwrap().id, b.id);

    let log = pipeline.notifications().latest();
    assert_eq!(log.len(), 2);
    assert!(log.iter().find(|n| n.id == a.id).unwrap().read);
    assert!(!pipeline.mark_read("missing").await.unwrap());
    assert_eq!(pipeline.mark_all_read().await.unwrap(), 1);

    pipeline.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn auto_dismiss_keeps_entry_but_manual_dismiss_removes_it() {
    let store = Arc::new(MemoryStateStore::new());
    let pipeline = Pipeline::spawn(quiet_config(), FakeFeed::default(), FakeSource::default(), store);

    let n = pipeline.trigger_manual("swarm", "h1", "A").await.unwrap();
    tokio::time::sleep(Duration::from_secs(4)).await;
    assert!(pipeline.popup().latest().visible);

    tokio::time::sleep(Duration::from_secs(2)).await;
    let popup = pipeline.popup().latest();
    assert!(!popup.visible);
    assert_eq!(popup.current.unwrap().id, n.id);
    assert_eq!(pipeline.notifications().latest().len(), 1);

    let removed = pipeline.dismiss(None).await.unwrap().unwrap();
    assert_eq!(removed.id, n.id);
    assert!(pipeline.notifications().latest().is_empty());
    assert!(pipeline.popup().latest().current.is_none());

    pipeline.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn superseding_restarts_the_countdown() {
    let store = Arc::new(MemoryStateStore::new());
    let pipeline = Pipeline::spawn(quiet_config(), FakeFeed::default(), FakeSource::default(), store);

    pipeline.trigger_manual("swarm", "h1", "A").await.unwrap();
    tokio::time::sleep(Duration::from_secs(4)).await;
    let b = pipeline.trigger_manual("feeding", "h1", "A").await.unwrap();
    tokio::time::sleep(Duration::from_secs(4)).await;

    let popup = pipeline.popup().latest();
    assert!(popup.visible);
    assert_eq!(popup.current.unwrap().id, b.id);

    pipeline.shutdown().await;
}

#[tokio::test]
async fn clear_all_and_dismiss_by_id() {
    let store = Arc::new(MemoryStateStore::new());
    let pipeline =
        Pipeline::spawn(quiet_config(), FakeFeed::default(), FakeSource::default(), store.clone());

    let a = pipeline.trigger_manual("swarm", "h1", "A").await.unwrap();
    pipeline.trigger_manual("feeding", "h1", "A").await.unwrap();

    assert_eq!(pipeline.dismiss(Some(&a.id)).await.unwrap().unwrap().id, a.id);
    assert!(!pipeline.popup().latest().visible);
    assert_eq!(pipeline.notifications().latest().len(), 1);

    pipeline.clear_all().await.unwrap();
    assert!(pipeline.notifications().latest().is_empty());
    assert_eq!(store.load(keys::NOTIFICATIONS).unwrap().as_deref(), Some("[]"));

    pipeline.shutdown().await;
}

// ── Poll path ───────────────────────────────────────────────────────

#[tokio::test]
async fn identical_breaches_notify_every_cycle() {
    let store = Arc::new(MemoryStateStore::new());
    let (pipeline, _, source) = started(quiet_config(), store, &[("h1", "Orchard")]).await;
    source.set("h1", &[("temperature", 42.0)]);

    let report = pipeline.poll_now().await.unwrap();
    assert_eq!(report.notifications, 1);
    assert_eq!(report.breaches[0].breach.metric, "temperature");
    assert_eq!(report.updated, vec!["h1".to_owned()]);

    let log = pipeline.notifications().latest();
    assert_eq!(log.len(), 1);
    assert_eq!(log[0].title, "Temperature Spike");
    assert!(log[0].event_id.is_none());
    assert!(log[0].event_timestamp.is_none());

    pipeline.poll_now().await.unwrap();
    assert_eq!(pipeline.notifications().latest().len(), 2);

    let hive = pipeline.hive("h1").unwrap();
    assert_eq!(hive.status, Some(HiveStatus::Critical));
    assert_eq!(hive.history.series("temperature").unwrap().len(), 2);
    assert!(pipeline.last_poll().is_some());

    pipeline.shutdown().await;
}

#[tokio::test]
async fn one_failing_hive_does_not_abort_the_cycle() {
    let store = Arc::new(MemoryStateStore::new());
    let (pipeline, _, source) =
        started(quiet_config(), store, &[("h1", "A"), ("h2", "B")]).await;
    source.set("h1", &[("temperature", 35.0), ("humidity", 60.0)]);

    let report = pipeline.poll_now().await.unwrap();
    assert_eq!(report.polled, 2);
    assert_eq!(report.updated, vec!["h1".to_owned()]);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].hive_id, "h2");
    assert!(report.error().is_some());
    assert_eq!(report.notifications, 0);

    assert_eq!(pipeline.hive("h1").unwrap().status, Some(HiveStatus::Healthy));
    assert_eq!(pipeline.hive("h2").unwrap().status, None);

    pipeline.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn background_sync_polls_on_schedule() {
    let store = Arc::new(MemoryStateStore::new());
    let config = PipelineConfig {
        background_sync: true,
        ..PipelineConfig::default()
    };
    let (pipeline, _, source) = started(config, store.clone(), &[("h1", "A")]).await;
    source.set("h1", &[("varroa", 5.0)]);

    tokio::time::sleep(Duration::from_secs(31)).await;
    wait_for_log_len(&pipeline, 1).await;
    assert_eq!(pipeline.notifications().latest()[0].title, "Varroa Mite Outbreak!");

    pipeline.set_background_sync(false).await.unwrap();
    assert_eq!(store.load(keys::BACKGROUND_SYNC).unwrap().as_deref(), Some("false"));
    tokio::time::sleep(Duration::from_secs(120)).await;
    assert_eq!(pipeline.notifications().latest().len(), 1);

    pipeline.shutdown().await;
}

#[tokio::test]
async fn thresholds_are_persisted_and_applied() {
    let store = Arc::new(MemoryStateStore::new());
    let (pipeline, _, source) = started(quiet_config(), store.clone(), &[("h1", "A")]).await;
    source.set("h1", &[("temperature", 42.0)]);

    let mut thresholds = hivewatch_core::ThresholdConfig::empty();
    thresholds.set(
        "temperature",
        hivewatch_core::MetricBounds::new(None, Some(45.0)).unwrap(),
    );
    pipeline.set_thresholds(thresholds).await.unwrap();
    assert!(store.load(keys::THRESHOLDS).unwrap().unwrap().contains("45"));

    let report = pipeline.poll_now().await.unwrap();
    assert_eq!(report.notifications, 0);

    pipeline.shutdown().await;
}

// ── Lifecycle ───────────────────────────────────────────────────────

#[tokio::test]
async fn commands_fail_after_shutdown() {
    let store = Arc::new(MemoryStateStore::new());
    let (pipeline, feed, _) = started(quiet_config(), store, &[("h1", "A")]).await;
    let mut recorded = pipeline.recorded();

    feed.emit(event("k1", "h1", "swarm", 10));
    let n = recorded.recv().await.unwrap();
    assert_eq!(n.event_type, "swarm");

    pipeline.shutdown().await;
    assert!(!pipeline.is_running());
    assert_eq!(feed.closed(), vec![1]);
    assert!(matches!(
        pipeline.mark_all_read().await,
        Err(CoreError::PipelineStopped)
    ));
}
