// ── Hive domain types ──

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::history::RollingHistory;

/// A hive the current owner is entitled to receive alerts for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedHive {
    pub id: String,
    pub name: String,
}

impl TrackedHive {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// Latest metric values reported by one hive's sensors.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SensorSnapshot {
    pub metrics: BTreeMap<String, f64>,
}

impl SensorSnapshot {
    pub fn get(&self, metric: &str) -> Option<f64> {
        self.metrics.get(metric).copied()
    }
}

impl<K: Into<String>> FromIterator<(K, f64)> for SensorSnapshot {
    fn from_iter<I: IntoIterator<Item = (K, f64)>>(iter: I) -> Self {
        Self {
            metrics: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

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
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum HiveStatus {
    Healthy,
    Warning,
    Critical,
}

/// Per-hive view maintained by the poller.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HiveView {
    pub id: String,
    pub name: String,
    /// `None` until the first usable snapshot arrives.
    pub status: Option<HiveStatus>,
    pub last_snapshot: Option<SensorSnapshot>,
    pub last_polled: Option<DateTime<Utc>>,
    pub history: RollingHistory,
}

impl HiveView {
    pub fn new(hive: &TrackedHive) -> Self {
        Self {
            id: hive.id.clone(),
            name: hive.name.clone(),
            status: None,
            last_snapshot: None,
            last_polled: None,
            history: RollingHistory::new(),
        }
    }
}
