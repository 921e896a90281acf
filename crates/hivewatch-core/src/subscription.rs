// ── Feed subscription lifecycle ──
//
// Owns at most one live feed handle. `reconcile` opens a handle when
// the session is authenticated and at least one hive is tracked, and
// the old handle is always torn down before a new one is created.
// Every handle is tagged with a generation; messages from a closed
// generation are dropped by the receiver.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::error::CoreError;
use crate::model::RawEvent;

// ── Collaborator traits ─────────────────────────────────────────────

/// A live subscription. Closing must stop all further deliveries.
pub trait SubscriptionHandle: Send + 'static {
    fn close(&mut self);
}

/// Remote append-only event feed.
pub trait EventFeed: Send + Sync + 'static {
    type Handle: SubscriptionHandle;

    /// Deliver every event with `timestamp >= since` into `sink`.
    fn subscribe(&self, since: i64, sink: FeedSink) -> Result<Self::Handle, CoreError>;
}

// ── Delivery plumbing ───────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum FeedMessage {
    Event(RawEvent),
    Error(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct FeedEnvelope {
    pub generation: u64,
    pub message: FeedMessage,
}

/// Callback target handed to [`EventFeed::subscribe`].
#[derive(Debug, Clone)]
pub struct FeedSink {
    generation: u64,
    tx: mpsc::UnboundedSender<FeedEnvelope>,
}

impl FeedSink {
    pub fn new(generation: u64, tx: mpsc::UnboundedSender<FeedEnvelope>) -> Self {
        Self { generation, tx }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Returns `false` once the pipeline has shut down.
    pub fn deliver(&self, event: RawEvent) -> bool {
        self.send(FeedMessage::Event(event))
    }

    pub fn fail(&self, reason: impl Into<String>) -> bool {
        self.send(FeedMessage::Error(reason.into()))
    }

    fn send(&self, message: FeedMessage) -> bool {
        self.tx
            .send(FeedEnvelope {
                generation: self.generation,
                message,
            })
            .is_ok()
    }
}

// ── State machine ───────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum SubscriptionState {
    #[default]
    Idle,
    Subscribed {
        generation: u64,
        since: i64,
    },
}

struct Active<H> {
    handle: H,
    generation: u64,
    since: i64,
}

pub struct SubscriptionManager<F: EventFeed> {
    feed: Arc<F>,
    tx: mpsc::UnboundedSender<FeedEnvelope>,
    active: Option<Active<F::Handle>>,
    inputs: Option<(bool, bool)>,
    next_generation: u64,
}

impl<F: EventFeed> SubscriptionManager<F> {
    pub fn new(feed: Arc<F>, tx: mpsc::UnboundedSender<FeedEnvelope>) -> Self {
        Self {
            feed,
            tx,
            active: None,
            inputs: None,
            next_generation: 1,
        }
    }

    pub fn state(&self) -> SubscriptionState {
        match &self.active {
            Some(active) => SubscriptionState::Subscribed {
                generation: active.generation,
                since: active.since,
            },
            None => SubscriptionState::Idle,
        }
    }

    /// Whether a message tagged `generation` belongs to the live handle.
    pub fn is_current(&self, generation: u64) -> bool {
        self.active
            .as_ref()
            .is_some_and(|a| a.generation == generation)
    }

    /// Bring the subscription in line with the session inputs.
    ///
    /// With unchanged inputs and a live handle this does nothing. Any
    /// other call behaves like [`resubscribe`](Self::resubscribe).
    pub fn reconcile(
        &mut self,
        authenticated: bool,
        has_hives: bool,
        watermark: i64,
    ) -> Result<SubscriptionState, CoreError> {
        if self.active.is_some() && self.inputs == Some((authenticated, has_hives)) {
            return Ok(self.state());
        }
        self.resubscribe(authenticated, has_hives, watermark)
    }

    /// Close the current handle and, if both inputs hold, open one new
    /// handle starting at `watermark + 1`.
    pub fn resubscribe(
        &mut self,
        authenticated: bool,
        has_hives: bool,
        watermark: i64,
    ) -> Result<SubscriptionState, CoreError> {
        self.inputs = Some((authenticated, has_hives));
        self.close();

        if !(authenticated && has_hives) {
            debug!(authenticated, has_hives, "feed subscription idle");
            return Ok(SubscriptionState::Idle);
        }

        self.open(watermark.saturating_add(1))
    }

    /// Tear down the live handle, if any.
    pub fn close(&mut self) {
        if let Some(mut active) = self.active.take() {
            active.handle.close();
            info!(generation = active.generation, "feed subscription closed");
        }
    }

    fn open(&mut self, since: i64) -> Result<SubscriptionState, CoreError> {
        let generation = self.next_generation;
        self.next_generation += 1;

        let sink = FeedSink::new(generation, self.tx.clone());
        match self.feed.subscribe(since, sink) {
            Ok(handle) => {
                self.active = Some(Active {
                    handle,
                    generation,
                    since,
                });
                info!(generation, since, "feed subscription opened");
                Ok(self.state())
            }
            Err(e) => {
                warn!(error = %e, "failed to open feed subscription");
                Err(e)
            }
        }
    }
}

impl<F: EventFeed> Drop for SubscriptionManager<F> {
    fn drop(&mut self) {
        self.close();
    }
}
