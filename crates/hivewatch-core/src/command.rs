// ── Command API ──
//
// Every mutation of pipeline state flows through `Command`. Handles
// enqueue an envelope; the actor applies commands one at a time and
// answers on the envelope's oneshot channel.

use crate::error::CoreError;
use crate::model::{Notification, TrackedHive};
use crate::poller::PollReport;
use crate::poller::threshold::ThresholdConfig;

pub(crate) struct CommandEnvelope {
    pub command: Command,
    pub response_tx: tokio::sync::oneshot::Sender<Result<CommandResult, CoreError>>,
}

#[derive(Debug, Clone)]
pub enum Command {
    // ── Session inputs ───────────────────────────────────────────────
    SetAuthenticated(bool),
    SetTrackedHives(Vec<TrackedHive>),

    // ── Preferences ──────────────────────────────────────────────────
    SetThresholds(ThresholdConfig),
    SetBackgroundSync(bool),

    // ── Notification log ─────────────────────────────────────────────
    MarkRead { id: String },
    MarkAllRead,
    Dismiss { id: Option<String> },
    ClearAll,
    TriggerManual {
        event_type: String,
        hive_id: String,
        hive_name: String,
    },

    // ── Polling ──────────────────────────────────────────────────────
    PollNow,
}

#[derive(Debug)]
pub enum CommandResult {
    Ok,
    /// Whether the targeted entry existed.
    Found(bool),
    Count(usize),
    Dismissed(Option<Notification>),
    Notification(Box<Notification>),
    Poll(Box<PollReport>),
}
