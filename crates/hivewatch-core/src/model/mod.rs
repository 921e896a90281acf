// ── Pipeline domain model ──
//
// Types shared by the ingestion, polling, and notification paths.
// Consumers (the CLI, tests) depend on these, never on hivewatch-api
// wire types.

pub mod event;
pub mod hive;
pub mod history;
pub mod notification;

// ── Re-exports ──────────────────────────────────────────────────────

pub use event::{EventId, EventIdParseError, RawEvent};
pub use hive::{HiveStatus, HiveView, SensorSnapshot, TrackedHive};
pub use history::{HISTORY_CAPACITY, RollingHistory};
pub use notification::{Notification, Severity};
