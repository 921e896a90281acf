// Wire types shared by the HTTP client and the realtime feed.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A single event delivered by the realtime hive feed.
///
/// `key` is assigned by the feed and unique per event. `timestamp` is
/// milliseconds since the epoch and increases monotonically per feed,
/// though delivery order is only approximately sorted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedEvent {
    pub key: String,
    pub hive_id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub timestamp: i64,
    #[serde(default)]
    pub payload: serde_json::Value,
}

/// A text frame from the feed: either a bare event or a batch.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum FeedFrame {
    Batch { events: Vec<FeedEvent> },
    Single(FeedEvent),
}

impl FeedFrame {
    pub(crate) fn into_events(self) -> Vec<FeedEvent> {
        match self {
            Self::Batch { events } => events,
            Self::Single(event) => vec![event],
        }
    }
}

/// Hive record as returned by the directory endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HiveRecord {
    pub id: String,
    pub name: String,
}

/// Latest sensor reading for one hive.
///
/// Only numeric fields survive parsing; strings, booleans, and nested
/// objects in the upstream document are dropped.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SensorReading {
    pub metrics: BTreeMap<String, f64>,
}

impl SensorReading {
    pub fn from_value(value: &serde_json::Value) -> Option<Self> {
        let object = value.as_object()?;
        let metrics = object
            .iter()
            .filter_map(|(name, v)| v.as_f64().map(|n| (name.clone(), n)))
            .collect();
        Some(Self { metrics })
    }
}
