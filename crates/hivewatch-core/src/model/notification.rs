// ── Notification domain types ──

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::event::EventId;

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Severity {
    Low,
    Medium,
    High,
}

/// A user-facing alert derived from a feed event, a threshold breach,
/// or a manual trigger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: String,
    /// Present only for feed-derived notifications.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_id: Option<EventId>,
    pub title: String,
    pub message: String,
    pub severity: Severity,
    pub hive_id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    /// When the notification was created locally.
    pub timestamp: DateTime<Utc>,
    /// Timestamp of the originating feed event, in epoch milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_timestamp: Option<i64>,
    #[serde(default)]
    pub read: bool,
}

impl Notification {
    /// Whether this notification was produced by the event `id`.
    ///
    /// Matches on the stored event id, or on the hive/type/event-timestamp
    /// triple for entries that predate event ids.
    pub fn is_from_event(&self, id: &EventId) -> bool {
        if self.event_id.as_ref() == Some(id) {
            return true;
        }
        self.hive_id == id.hive_id()
            && self.event_type == id.event_type()
            && self.event_timestamp == Some(id.timestamp())
    }
}
