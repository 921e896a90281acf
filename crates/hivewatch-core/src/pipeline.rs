// ── Alert pipeline ──
//
// A single actor task owns every piece of mutable pipeline state: the
// watermark, the notification log and popup, hive histories, the feed
// subscription, and the poller. Commands, feed deliveries, poll results,
// and the popup timer are all serialized through its select loop.
// `Pipeline` is the cheaply cloneable handle readers and writers use.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{Mutex, broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::classify::{self, Origin};
use crate::command::{Command, CommandEnvelope, CommandResult};
use crate::config::PipelineConfig;
use crate::dedup::{Deduplicator, Verdict};
use crate::error::CoreError;
use crate::model::{HiveView, Notification, RawEvent, TrackedHive};
use crate::notify::{NotificationCenter, PopupState};
use crate::poller::threshold::ThresholdConfig;
use crate::poller::{
    FetchOutcome, HiveBreach, HiveFailure, PollDelivery, PollReport, PollerTask, SnapshotSource,
    fetch_all, health,
};
use crate::state::{self, StateStore, keys};
use crate::store::PipelineStore;
use crate::stream::Projection;
use crate::subscription::{
    EventFeed, FeedEnvelope, FeedMessage, SubscriptionManager, SubscriptionState,
};
use crate::watermark::WatermarkStore;

const RECORDED_CAPACITY: usize = 64;

// ── Pipeline handle ──────────────────────────────────────────────────

/// Handle to a running alert pipeline.
///
/// Cheaply cloneable via `Arc<PipelineInner>`. Reads go straight to the
/// shared watch channels; every mutation is a [`Command`] applied by the
/// actor in arrival order.
#[derive(Clone)]
pub struct Pipeline {
    inner: Arc<PipelineInner>,
}

struct PipelineInner {
    store: Arc<PipelineStore>,
    command_tx: mpsc::Sender<CommandEnvelope>,
    recorded_tx: broadcast::Sender<Arc<Notification>>,
    cancel: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl Pipeline {
    /// Load persisted state and start the actor. Must be called from
    /// within a Tokio runtime.
    pub fn spawn<F, S>(
        config: PipelineConfig,
        feed: F,
        source: S,
        state: Arc<dyn StateStore>,
    ) -> Self
    where
        F: EventFeed,
        S: SnapshotSource,
    {
        let watermark = WatermarkStore::load(Arc::clone(&state));
        let notifications = load_or_default::<Vec<Notification>>(&*state, keys::NOTIFICATIONS)
            .unwrap_or_default();
        let thresholds = load_or_default::<ThresholdConfig>(&*state, keys::THRESHOLDS)
            .unwrap_or_else(|| config.thresholds.clone());
        let background_sync = load_or_default::<bool>(&*state, keys::BACKGROUND_SYNC)
            .unwrap_or(config.background_sync);

        let center = NotificationCenter::restore(notifications);
        let store = Arc::new(PipelineStore::new(center.log().to_vec(), watermark.get()));

        let (command_tx, command_rx) = mpsc::channel(config.command_buffer.max(1));
        let (feed_tx, feed_rx) = mpsc::unbounded_channel();
        let (poll_tx, poll_rx) = mpsc::unbounded_channel();
        let (recorded_tx, _) = broadcast::channel(RECORDED_CAPACITY);
        let (tracked_tx, _) = watch::channel(Arc::new(Vec::new()));
        let cancel = CancellationToken::new();

        info!(
            watermark = watermark.get(),
            notifications = center.log().len(),
            background_sync,
            "starting alert pipeline"
        );

        let actor = Actor {
            config,
            store: Arc::clone(&store),
            state,
            watermark,
            dedup: Deduplicator::new(),
            center,
            subscription: SubscriptionManager::new(Arc::new(feed), feed_tx),
            source: Arc::new(source),
            thresholds,
            background_sync,
            authenticated: false,
            owned: HashSet::new(),
            tracked_tx,
            poller: None,
            next_poller_generation: 1,
            poll_tx,
            recorded_tx: recorded_tx.clone(),
            cancel: cancel.clone(),
        };

        let task = tokio::spawn(actor.run(command_rx, feed_rx, poll_rx));

        Self {
            inner: Arc::new(PipelineInner {
                store,
                command_tx,
                recorded_tx,
                cancel,
                task: Mutex::new(Some(task)),
            }),
        }
    }

    /// Stop the actor, close the feed subscription, and stop polling.
    /// Waits for the actor to finish; later commands fail with
    /// [`CoreError::PipelineStopped`].
    pub async fn shutdown(&self) {
        self.inner.cancel.cancel();
        if let Some(task) = self.inner.task.lock().await.take() {
            let _ = task.await;
        }
        debug!("alert pipeline stopped");
    }

    pub fn is_running(&self) -> bool {
        !self.inner.cancel.is_cancelled()
    }

    // ── Command execution ────────────────────────────────────────────

    /// Enqueue a command and wait for the actor's answer.
    pub async fn execute(&self, cmd: Command) -> Result<CommandResult, CoreError> {
        if self.inner.cancel.is_cancelled() {
            return Err(CoreError::PipelineStopped);
        }

        let (tx, rx) = oneshot::channel();
        self.inner
            .command_tx
            .send(CommandEnvelope {
                command: cmd,
                response_tx: tx,
            })
            .await
            .map_err(|_| CoreError::PipelineStopped)?;

        rx.await.map_err(|_| CoreError::PipelineStopped)?
    }

    pub async fn set_authenticated(&self, authenticated: bool) -> Result<(), CoreError> {
        self.execute(Command::SetAuthenticated(authenticated))
            .await
            .map(drop)
    }

    pub async fn set_tracked_hives(&self, hives: Vec<TrackedHive>) -> Result<(), CoreError> {
        self.execute(Command::SetTrackedHives(hives)).await.map(drop)
    }

    pub async fn set_thresholds(&self, thresholds: ThresholdConfig) -> Result<(), CoreError> {
        self.execute(Command::SetThresholds(thresholds))
            .await
            .map(drop)
    }

    pub async fn set_background_sync(&self, enabled: bool) -> Result<(), CoreError> {
        self.execute(Command::SetBackgroundSync(enabled))
            .await
            .map(drop)
    }

    /// Returns `false` if no notification has this id.
    pub async fn mark_read(&self, id: &str) -> Result<bool, CoreError> {
        match self.execute(Command::MarkRead { id: id.to_owned() }).await? {
            CommandResult::Found(found) => Ok(found),
            other => Err(unexpected(&other)),
        }
    }

    /// Returns the number of notifications that were unread.
    pub async fn mark_all_read(&self) -> Result<usize, CoreError> {
        match self.execute(Command::MarkAllRead).await? {
            CommandResult::Count(n) => Ok(n),
            other => Err(unexpected(&other)),
        }
    }

    /// Remove `id`, or the current popup's notification when `None`.
    pub async fn dismiss(&self, id: Option<&str>) -> Result<Option<Notification>, CoreError> {
        let cmd = Command::Dismiss {
            id: id.map(str::to_owned),
        };
        match self.execute(cmd).await? {
            CommandResult::Dismissed(removed) => Ok(removed),
            other => Err(unexpected(&other)),
        }
    }

    pub async fn clear_all(&self) -> Result<(), CoreError> {
        self.execute(Command::ClearAll).await.map(drop)
    }

    /// Record an operator-initiated alert, bypassing the feed entirely.
    pub async fn trigger_manual(
        &self,
        event_type: &str,
        hive_id: &str,
        hive_name: &str,
    ) -> Result<Notification, CoreError> {
        let cmd = Command::TriggerManual {
            event_type: event_type.to_owned(),
            hive_id: hive_id.to_owned(),
            hive_name: hive_name.to_owned(),
        };
        match self.execute(cmd).await? {
            CommandResult::Notification(n) => Ok(*n),
            other => Err(unexpected(&other)),
        }
    }

    /// Run one poll cycle now, regardless of the background-sync setting.
    pub async fn poll_now(&self) -> Result<PollReport, CoreError> {
        match self.execute(Command::PollNow).await? {
            CommandResult::Poll(report) => Ok(*report),
            other => Err(unexpected(&other)),
        }
    }

    // ── Projections ──────────────────────────────────────────────────

    /// Notification log, newest first.
    pub fn notifications(&self) -> Projection<Arc<Vec<Notification>>> {
        Projection::new(self.inner.store.notifications.subscribe())
    }

    pub fn popup(&self) -> Projection<PopupState> {
        Projection::new(self.inner.store.popup.subscribe())
    }

    /// Per-hive status and rolling history, ordered by hive id.
    pub fn hives(&self) -> Projection<Arc<Vec<Arc<HiveView>>>> {
        Projection::new(self.inner.store.hives.subscribe())
    }

    pub fn hive(&self, hive_id: &str) -> Option<Arc<HiveView>> {
        self.inner.store.hives.get(hive_id)
    }

    pub fn subscription_state(&self) -> Projection<SubscriptionState> {
        Projection::new(self.inner.store.subscription.subscribe())
    }

    pub fn watermark(&self) -> i64 {
        *self.inner.store.watermark.borrow()
    }

    pub fn last_poll(&self) -> Option<chrono::DateTime<Utc>> {
        *self.inner.store.last_poll.borrow()
    }

    /// Every notification recorded from now on, whatever its origin.
    pub fn recorded(&self) -> broadcast::Receiver<Arc<Notification>> {
        self.inner.recorded_tx.subscribe()
    }
}

fn unexpected(result: &CommandResult) -> CoreError {
    CoreError::Internal(format!("unexpected command result: {result:?}"))
}

fn load_or_default<T: serde::de::DeserializeOwned>(store: &dyn StateStore, key: &str) -> Option<T> {
    match state::load_json(store, key) {
        Ok(value) => value,
        Err(e) => {
            warn!(key, error = %e, "ignoring unreadable state document");
            None
        }
    }
}

// ── Actor ────────────────────────────────────────────────────────────

struct Actor<F: EventFeed, S: SnapshotSource> {
    config: PipelineConfig,
    store: Arc<PipelineStore>,
    state: Arc<dyn StateStore>,
    watermark: WatermarkStore,
    dedup: Deduplicator,
    center: NotificationCenter,
    subscription: SubscriptionManager<F>,
    source: Arc<S>,
    thresholds: ThresholdConfig,
    background_sync: bool,
    authenticated: bool,
    owned: HashSet<String>,
    tracked_tx: watch::Sender<Arc<Vec<TrackedHive>>>,
    poller: Option<PollerTask>,
    next_poller_generation: u64,
    poll_tx: mpsc::UnboundedSender<PollDelivery>,
    recorded_tx: broadcast::Sender<Arc<Notification>>,
    cancel: CancellationToken,
}

impl<F: EventFeed, S: SnapshotSource> Actor<F, S> {
    async fn run(
        mut self,
        mut commands: mpsc::Receiver<CommandEnvelope>,
        mut feed_rx: mpsc::UnboundedReceiver<FeedEnvelope>,
        mut poll_rx: mpsc::UnboundedReceiver<PollDelivery>,
    ) {
        let cancel = self.cancel.clone();

        loop {
            let deadline = self.center.popup_deadline();
            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                envelope = commands.recv() => {
                    let Some(envelope) = envelope else { break };
                    self.handle_command(envelope);
                }
                Some(envelope) = feed_rx.recv() => self.on_feed(envelope),
                Some(delivery) = poll_rx.recv() => self.on_poll(delivery),
                () = time::sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    self.expire_popup();
                }
            }
        }

        self.subscription.close();
        if let Some(poller) = self.poller.take() {
            poller.stop();
        }
        self.store.subscription.send_replace(SubscriptionState::Idle);
        info!("alert pipeline actor exited");
    }

    // ── Commands ─────────────────────────────────────────────────────

    fn handle_command(&mut self, envelope: CommandEnvelope) {
        let CommandEnvelope {
            command,
            response_tx,
        } = envelope;

        let result = match command {
            Command::PollNow => {
                self.start_manual_poll(response_tx);
                return;
            }
            Command::SetAuthenticated(authenticated) => {
                self.authenticated = authenticated;
                self.reconcile_subscription(false);
                self.reconcile_poller();
                Ok(CommandResult::Ok)
            }
            Command::SetTrackedHives(hives) => {
                self.set_tracked_hives(hives);
                Ok(CommandResult::Ok)
            }
            Command::SetThresholds(thresholds) => {
                self.thresholds = thresholds;
                state::save_json_retrying(&*self.state, keys::THRESHOLDS, &self.thresholds)
                    .map(|()| CommandResult::Ok)
            }
            Command::SetBackgroundSync(enabled) => {
                self.background_sync = enabled;
                self.reconcile_poller();
                state::save_json_retrying(&*self.state, keys::BACKGROUND_SYNC, &enabled)
                    .map(|()| CommandResult::Ok)
            }
            Command::MarkRead { id } => {
                let found = self.center.mark_read(&id);
                if found {
                    self.notifications_changed();
                }
                Ok(CommandResult::Found(found))
            }
            Command::MarkAllRead => {
                let flipped = self.center.mark_all_read();
                self.notifications_changed();
                Ok(CommandResult::Count(flipped))
            }
            Command::Dismiss { id } => {
                let removed = self.center.dismiss(id.as_deref());
                self.notifications_changed();
                Ok(CommandResult::Dismissed(removed))
            }
            Command::ClearAll => {
                self.center.clear_all();
                self.notifications_changed();
                Ok(CommandResult::Ok)
            }
            Command::TriggerManual {
                event_type,
                hive_id,
                hive_name,
            } => {
                let n = classify::classify(
                    &event_type,
                    &hive_id,
                    &hive_name,
                    Origin::Manual,
                    Utc::now(),
                );
                self.record(n.clone());
                Ok(CommandResult::Notification(Box::new(n)))
            }
        };

        // Receiver may have given up waiting.
        let _ = response_tx.send(result);
    }

    fn set_tracked_hives(&mut self, hives: Vec<TrackedHive>) {
        let owned: HashSet<String> = hives.iter().map(|h| h.id.clone()).collect();
        let membership_changed = owned != self.owned;
        self.owned = owned;

        for hive in &hives {
            let renamed = self
                .store
                .hives
                .update(&hive.id, |view| view.name.clone_from(&hive.name));
            if !renamed {
                self.store.hives.upsert(hive.id.clone(), HiveView::new(hive));
            }
        }
        self.store.hives.retain_keys(&self.owned);

        debug!(count = hives.len(), membership_changed, "tracked hives updated");
        self.tracked_tx.send_replace(Arc::new(hives));
        self.reconcile_subscription(membership_changed);
    }

    // ── Subscription ─────────────────────────────────────────────────

    fn reconcile_subscription(&mut self, force: bool) {
        let has_hives = !self.owned.is_empty();
        let watermark = self.watermark.get();
        let result = if force {
            self.subscription
                .resubscribe(self.authenticated, has_hives, watermark)
        } else {
            self.subscription
                .reconcile(self.authenticated, has_hives, watermark)
        };
        // Failures are logged by the manager; the state is Idle either way.
        let state = result.unwrap_or(SubscriptionState::Idle);
        self.store.subscription.send_replace(state);
    }

    fn on_feed(&mut self, envelope: FeedEnvelope) {
        if !self.subscription.is_current(envelope.generation) {
            trace!(
                generation = envelope.generation,
                "dropping message from closed subscription"
            );
            return;
        }
        match envelope.message {
            FeedMessage::Event(event) => self.ingest(&event),
            FeedMessage::Error(reason) => warn!(%reason, "feed subscription error"),
        }
    }

    fn ingest(&mut self, event: &RawEvent) {
        let verdict = self
            .dedup
            .accept(event, &self.owned, &mut self.watermark, self.center.log());

        let accepted = match verdict {
            Verdict::Accepted(accepted) => accepted,
            Verdict::Rejected(reason) => {
                debug!(
                    key = %event.key,
                    hive_id = %event.hive_id,
                    timestamp = event.timestamp,
                    %reason,
                    "event rejected"
                );
                return;
            }
        };

        if let Some(e) = &accepted.persist_error {
            warn!(error = %e, "watermark advanced in memory only");
        }
        if accepted.watermark_advanced {
            self.store.watermark.send_replace(self.watermark.get());
        }
        if !classify::is_recognized(&event.event_type) {
            debug!(event_type = %event.event_type, "unrecognized event type, using generic alert");
        }

        let hive_name = self.hive_name(&event.hive_id);
        let n = classify::classify(
            &event.event_type,
            &event.hive_id,
            &hive_name,
            Origin::Feed(accepted.event_id),
            Utc::now(),
        );
        self.record(n);
    }

    // ── Polling ──────────────────────────────────────────────────────

    fn reconcile_poller(&mut self) {
        let wanted = self.background_sync && self.authenticated;
        if wanted && self.poller.is_none() {
            let generation = self.next_poller_generation;
            self.next_poller_generation += 1;
            self.poller = Some(PollerTask::spawn(
                generation,
                Arc::clone(&self.source),
                self.tracked_tx.subscribe(),
                self.poll_tx.clone(),
                self.config.poll_interval,
                self.config.fetch_timeout,
                &self.cancel,
            ));
            info!(
                generation,
                period_secs = self.config.poll_interval.as_secs(),
                "background polling started"
            );
        } else if !wanted {
            if let Some(poller) = self.poller.take() {
                let generation = poller.generation;
                poller.stop();
                info!(generation, "background polling stopped");
            }
        }
    }

    fn start_manual_poll(&self, reply: oneshot::Sender<Result<CommandResult, CoreError>>) {
        let hives = self.tracked_tx.borrow().clone();
        let source = Arc::clone(&self.source);
        let tx = self.poll_tx.clone();
        let timeout = self.config.fetch_timeout;
        let cancel = self.cancel.child_token();

        tokio::spawn(async move {
            let started_at = Utc::now();
            let outcomes = tokio::select! {
                biased;
                () = cancel.cancelled() => return,
                outcomes = fetch_all(&*source, &hives, timeout) => outcomes,
            };
            let _ = tx.send(PollDelivery {
                generation: None,
                started_at,
                outcomes,
                reply: Some(reply),
            });
        });
    }

    fn on_poll(&mut self, delivery: PollDelivery) {
        if let Some(generation) = delivery.generation {
            if self.poller.as_ref().map(|p| p.generation) != Some(generation) {
                trace!(generation, "dropping results from stopped poller");
                return;
            }
        }

        let report = self.apply_poll(delivery.started_at, delivery.outcomes);
        if let Some(reply) = delivery.reply {
            let _ = reply.send(Ok(CommandResult::Poll(Box::new(report))));
        }
    }

    fn apply_poll(
        &mut self,
        started_at: chrono::DateTime<Utc>,
        outcomes: Vec<FetchOutcome>,
    ) -> PollReport {
        let now = Utc::now();
        let mut report = PollReport::new(started_at, outcomes.len());

        for FetchOutcome { hive_id, result } in outcomes {
            if !self.owned.contains(&hive_id) {
                trace!(%hive_id, "hive untracked during fetch");
                continue;
            }
            match result {
                Ok(Some(snapshot)) => {
                    let status = health::classify(&snapshot);
                    let breaches = self.thresholds.evaluate(&snapshot);
                    self.store.hives.update(&hive_id, |view| {
                        view.history.record(&snapshot);
                        view.status = Some(status);
                        view.last_snapshot = Some(snapshot);
                        view.last_polled = Some(now);
                    });

                    let hive_name = self.hive_name(&hive_id);
                    for breach in breaches {
                        let n = classify::classify(
                            &breach.metric,
                            &hive_id,
                            &hive_name,
                            Origin::Threshold,
                            now,
                        );
                        self.record(n);
                        report.notifications += 1;
                        report.breaches.push(HiveBreach {
                            hive_id: hive_id.clone(),
                            breach,
                        });
                    }
                    report.updated.push(hive_id);
                }
                Ok(None) => {
                    self.store
                        .hives
                        .update(&hive_id, |view| view.last_polled = Some(now));
                    report.empty.push(hive_id);
                }
                Err(e) => {
                    warn!(%hive_id, error = %e, "snapshot fetch failed");
                    report.failures.push(HiveFailure {
                        hive_id,
                        error: e.to_string(),
                    });
                }
            }
        }

        self.store.last_poll.send_replace(Some(now));
        match report.error() {
            Some(e) => warn!(error = %e, "poll cycle finished with failures"),
            None => info!(
                updated = report.updated.len(),
                breaches = report.breaches.len(),
                "poll cycle complete"
            ),
        }
        report
    }

    // ── Notifications ────────────────────────────────────────────────

    fn record(&mut self, n: Notification) {
        info!(
            id = %n.id,
            hive_id = %n.hive_id,
            severity = %n.severity,
            title = %n.title,
            "notification recorded"
        );
        let shared = Arc::new(n.clone());
        if let Some(evicted) = self.center.record(n, Instant::now()) {
            debug!(id = %evicted.id, "evicted oldest notification");
        }
        self.notifications_changed();
        // No receivers is fine.
        let _ = self.recorded_tx.send(shared);
    }

    fn expire_popup(&mut self) {
        if self.center.expire_popup(Instant::now()) {
            trace!("popup auto-dismissed");
            self.store.popup.send_replace(self.center.popup().clone());
        }
    }

    /// Publish the log and popup, then persist the log. A failed save
    /// never rolls back what readers already see.
    fn notifications_changed(&self) {
        let entries = self.center.log().to_vec();
        if let Err(e) = state::save_json_retrying(&*self.state, keys::NOTIFICATIONS, &entries) {
            warn!(error = %e, "notification log not persisted");
        }
        self.store.notifications.send_replace(Arc::new(entries));
        self.store.popup.send_replace(self.center.popup().clone());
    }

    fn hive_name(&self, hive_id: &str) -> String {
        self.store
            .hives
            .get(hive_id)
            .map_or_else(|| hive_id.to_owned(), |view| view.name.clone())
    }
}
