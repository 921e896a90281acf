// ── Event classification ──
//
// Single taxonomy table mapping event types to a title, a message
// template, and a severity. Feed events, threshold breaches, and manual
// triggers all go through `classify`, so one type renders identically
// regardless of where it came from.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::model::{EventId, Notification, Severity};

/// One row of the taxonomy. `{hive}` in the template is replaced by the
/// hive's display name.
#[derive(Debug, PartialEq, Eq)]
pub struct Category {
    pub types: &'static [&'static str],
    pub title: &'static str,
    pub template: &'static str,
    pub severity: Severity,
}

impl Category {
    pub fn render(&self, hive_name: &str) -> String {
        self.template.replace("{hive}", hive_name)
    }
}

pub static TAXONOMY: &[Category] = &[
    Category {
        types: &["swarm"],
        title: "Swarm Alert!",
        template: "{hive} shows signs of swarming. Inspect the colony as soon as possible.",
        severity: Severity::High,
    },
    Category {
        types: &["varroa", "varroa_outbreak"],
        title: "Varroa Mite Outbreak!",
        template: "Mite levels in {hive} have crossed the treatment threshold.",
        severity: Severity::High,
    },
    Category {
        types: &["weight_loss", "weight"],
        title: "Sudden Weight Loss",
        template: "{hive} lost weight rapidly, which may mean a swarm or robbing.",
        severity: Severity::High,
    },
    Category {
        types: &["temperature", "temperature_spike"],
        title: "Temperature Spike",
        template: "{hive} is reporting a brood temperature outside the safe range.",
        severity: Severity::Medium,
    },
    Category {
        types: &["humidity"],
        title: "Humidity Alert",
        template: "Humidity in {hive} is outside the healthy range.",
        severity: Severity::Medium,
    },
    Category {
        types: &["treatment"],
        title: "Treatment Reminder",
        template: "{hive} is due for its scheduled treatment.",
        severity: Severity::Medium,
    },
    Category {
        types: &["honey_harvest"],
        title: "Honey Harvest",
        template: "{hive} has capped honey ready to harvest.",
        severity: Severity::Low,
    },
    Category {
        types: &["feeding"],
        title: "Feeding Reminder",
        template: "{hive} needs supplemental feeding.",
        severity: Severity::Low,
    },
];

pub static FALLBACK: Category = Category {
    types: &[],
    title: "Hive Alert",
    template: "New activity reported for {hive}.",
    severity: Severity::Low,
};

/// Taxonomy row for `event_type`, falling back to the generic alert.
pub fn category(event_type: &str) -> &'static Category {
    TAXONOMY
        .iter()
        .find(|c| c.types.iter().any(|t| t.eq_ignore_ascii_case(event_type)))
        .unwrap_or(&FALLBACK)
}

pub fn is_recognized(event_type: &str) -> bool {
    !std::ptr::eq(category(event_type), &FALLBACK)
}

/// Where a notification came from. Only feed events carry an identity.
#[derive(Debug, Clone)]
pub enum Origin {
    Feed(EventId),
    Threshold,
    Manual,
}

/// Build a notification for `event_type` on the given hive.
pub fn classify(
    event_type: &str,
    hive_id: &str,
    hive_name: &str,
    origin: Origin,
    now: DateTime<Utc>,
) -> Notification {
    let category = category(event_type);
    let (event_id, event_timestamp) = match origin {
        Origin::Feed(id) => {
            let ts = id.timestamp();
            (Some(id), Some(ts))
        }
        Origin::Threshold | Origin::Manual => (None, None),
    };

    Notification {
        id: notification_id(now),
        event_id,
        title: category.title.to_owned(),
        message: category.render(hive_name),
        severity: category.severity,
        hive_id: hive_id.to_owned(),
        event_type: event_type.to_owned(),
        timestamp: now,
        event_timestamp,
        read: false,
    }
}

fn notification_id(now: DateTime<Utc>) -> String {
    format!("{}-{}", now.timestamp_millis(), Uuid::new_v4().simple())
}
