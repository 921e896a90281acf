// hivewatch-core: realtime hive alert pipeline between hivewatch-api and consumers.

pub mod classify;
pub mod command;
pub mod config;
pub mod convert;
pub mod dedup;
pub mod directory;
pub mod error;
pub mod model;
pub mod notify;
pub mod pipeline;
pub mod poller;
pub mod state;
pub mod stream;
pub mod subscription;
pub mod watermark;

mod store;

// ── Primary re-exports ──────────────────────────────────────────────
pub use command::{Command, CommandResult};
pub use config::PipelineConfig;
pub use directory::{HiveDirectory, sync_owned_hives};
pub use error::CoreError;
pub use notify::{AUTO_DISMISS, LOG_CAPACITY, NotificationCenter, NotificationLog, PopupState};
pub use pipeline::Pipeline;
pub use poller::threshold::{Breach, BreachKind, MetricBounds, ThresholdConfig};
pub use poller::{PollReport, SnapshotSource};
pub use state::{FileStateStore, MemoryStateStore, StateStore};
pub use stream::Projection;
pub use subscription::{EventFeed, FeedSink, SubscriptionHandle, SubscriptionState};

pub use model::{
    EventId, HISTORY_CAPACITY, HiveStatus, HiveView, Notification, RawEvent, RollingHistory,
    SensorSnapshot, Severity, TrackedHive,
};
