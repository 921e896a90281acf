// ── Hive health classification ──
//
// Fixed bands used for status display only. These are independent of
// the user's alert thresholds and never produce notifications.

use crate::model::{HiveStatus, SensorSnapshot};

struct Band {
    metric: &'static str,
    healthy: (f64, f64),
    warning: (f64, f64),
}

const BANDS: &[Band] = &[
    Band {
        metric: "temperature",
        healthy: (32.0, 37.0),
        warning: (30.0, 39.0),
    },
    Band {
        metric: "humidity",
        healthy: (50.0, 70.0),
        warning: (40.0, 80.0),
    },
    Band {
        metric: "varroa",
        healthy: (f64::NEG_INFINITY, 2.0),
        warning: (f64::NEG_INFINITY, 3.0),
    },
];

fn within((lo, hi): (f64, f64), value: f64) -> bool {
    value >= lo && value <= hi
}

/// Status of a single metric, or `None` for metrics without a band.
pub fn metric_status(metric: &str, value: f64) -> Option<HiveStatus> {
    let band = BANDS.iter().find(|b| b.metric == metric)?;
    let status = if within(band.healthy, value) {
        HiveStatus::Healthy
    } else if within(band.warning, value) {
        HiveStatus::Warning
    } else {
        HiveStatus::Critical
    };
    Some(status)
}

/// Worst status across all banded metrics in the snapshot.
pub fn classify(snapshot: &SensorSnapshot) -> HiveStatus {
    snapshot
        .metrics
        .iter()
        .filter_map(|(metric, value)| metric_status(metric, *value))
        .max()
        .unwrap_or(HiveStatus::Healthy)
}
