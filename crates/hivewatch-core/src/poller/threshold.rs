// ── User-configurable alert thresholds ──

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::model::SensorSnapshot;

/// Inclusive bounds for one metric. A missing side is unbounded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricBounds {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
}

impl MetricBounds {
    pub fn new(min: Option<f64>, max: Option<f64>) -> Result<Self, CoreError> {
        if let (Some(lo), Some(hi)) = (min, max) {
            if lo > hi {
                return Err(CoreError::Config {
                    message: format!("threshold min {lo} is greater than max {hi}"),
                });
            }
        }
        if min.is_some_and(f64::is_nan) || max.is_some_and(f64::is_nan) {
            return Err(CoreError::Config {
                message: "threshold bounds must be numbers".into(),
            });
        }
        Ok(Self { min, max })
    }

    pub fn check(&self, value: f64) -> Option<(BreachKind, f64)> {
        if let Some(min) = self.min.filter(|min| value < *min) {
            return Some((BreachKind::BelowMin, min));
        }
        if let Some(max) = self.max.filter(|max| value > *max) {
            return Some((BreachKind::AboveMax, max));
        }
        None
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum BreachKind {
    BelowMin,
    AboveMax,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Breach {
    pub metric: String,
    pub value: f64,
    pub limit: f64,
    pub kind: BreachKind,
}

/// Per-metric alert bounds, persisted as `{ "metric": { "min": .., "max": .. } }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ThresholdConfig {
    metrics: BTreeMap<String, MetricBounds>,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        let metrics = BTreeMap::from([
            (
                "temperature".to_owned(),
                MetricBounds {
                    min: Some(30.0),
                    max: Some(38.0),
                },
            ),
            (
                "humidity".to_owned(),
                MetricBounds {
                    min: Some(40.0),
                    max: Some(80.0),
                },
            ),
            (
                "varroa".to_owned(),
                MetricBounds {
                    min: None,
                    max: Some(3.0),
                },
            ),
        ]);
        Self { metrics }
    }
}

impl ThresholdConfig {
    pub fn empty() -> Self {
        Self {
            metrics: BTreeMap::new(),
        }
    }

    pub fn get(&self, metric: &str) -> Option<&MetricBounds> {
        self.metrics.get(metric)
    }

    pub fn set(&mut self, metric: impl Into<String>, bounds: MetricBounds) {
        self.metrics.insert(metric.into(), bounds);
    }

    pub fn remove(&mut self, metric: &str) -> Option<MetricBounds> {
        self.metrics.remove(metric)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &MetricBounds)> {
        self.metrics.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty()
    }

    /// Every configured metric whose value in `snapshot` is out of bounds.
    /// Metrics missing from the snapshot are skipped.
    pub fn evaluate(&self, snapshot: &SensorSnapshot) -> Vec<Breach> {
        self.metrics
            .iter()
            .filter_map(|(metric, bounds)| {
                let value = snapshot.get(metric)?;
                let (kind, limit) = bounds.check(value)?;
                Some(Breach {
                    metric: metric.clone(),
                    value,
                    limit,
                    kind,
                })
            })
            .collect()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    #[test]
    fn hot_hive_breaches_temperature_max() {
        let config = ThresholdConfig::default();
        let snapshot = SensorSnapshot::from_iter([("temperature", 42.0)]);

        let breaches = config.evaluate(&snapshot);
        assert_eq!(
            breaches,
            vec![Breach {
                metric: "temperature".into(),
                value: 42.0,
                limit: 38.0,
                kind: BreachKind::AboveMax,
            }]
        );
    }

    #[test]
    fn bounds_are_inclusive() {
        let bounds = MetricBounds::new(Some(30.0), Some(38.0)).unwrap();
        assert!(bounds.check(30.0).is_none());
        assert!(bounds.check(38.0).is_none());
        assert_eq!(bounds.check(29.9).map(|(k, _)| k), Some(BreachKind::BelowMin));
    }

    #[test]
    fn missing_metrics_are_ignored() {
        let config = ThresholdConfig::default();
        let snapshot = SensorSnapshot::from_iter([("weight", 1.0)]);
        assert!(config.evaluate(&snapshot).is_empty());
    }

    #[test]
    fn inverted_bounds_are_rejected() {
        assert!(MetricBounds::new(Some(10.0), Some(5.0)).is_err());
        assert!(MetricBounds::new(None, Some(f64::NAN)).is_err());
    }

    #[test]
    fn persisted_shape() {
        let value = serde_json::to_value(ThresholdConfig::default()).unwrap();
        assert_eq!(value["varroa"], json!({ "max": 3.0 }));
        assert_eq!(value["humidity"], json!({ "min": 40.0, "max": 80.0 }));

        let parsed: ThresholdConfig =
            serde_json::from_value(json!({ "weight": { "min": 20 } })).unwrap();
        assert_eq!(parsed.get("weight").unwrap().min, Some(20.0));
        assert!(parsed.get("temperature").is_none());
    }
}
