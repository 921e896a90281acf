// ── Rolling sensor history ──

use std::collections::{BTreeMap, VecDeque};

use serde::Serialize;

use super::hive::SensorSnapshot;

/// Samples retained per metric per hive.
pub const HISTORY_CAPACITY: usize = 30;

/// Fixed-length per-metric series, oldest sample first.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RollingHistory {
    series: BTreeMap<String, VecDeque<f64>>,
}

impl RollingHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one sample per metric present in `snapshot`.
    pub fn record(&mut self, snapshot: &SensorSnapshot) {
        for (metric, value) in &snapshot.metrics {
            self.push(metric, *value);
        }
    }

    pub fn push(&mut self, metric: &str, value: f64) {
        let series = self.series.entry(metric.to_owned()).or_default();
        if series.len() == HISTORY_CAPACITY {
            series.pop_front();
        }
        series.push_back(value);
    }

    pub fn series(&self, metric: &str) -> Option<&VecDeque<f64>> {
        self.series.get(metric)
    }

    pub fn latest(&self, metric: &str) -> Option<f64> {
        self.series.get(metric).and_then(|s| s.back().copied())
    }

    pub fn metrics(&self) -> impl Iterator<Item = &str> {
        self.series.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }
}
