//! Shared helpers for command handlers.

use std::io::IsTerminal;

use hivewatch_config::Config;
use hivewatch_core::{
    CoreError, EventFeed, FeedSink, Pipeline, PipelineConfig, SensorSnapshot, SnapshotSource,
    SubscriptionHandle,
};

use crate::cli::GlobalOpts;
use crate::config;
use crate::error::CliError;

/// Prompt for confirmation, auto-approving if `--yes` was passed.
pub fn confirm(message: &str, action: &str, yes_flag: bool) -> Result<bool, CliError> {
    if yes_flag {
        return Ok(true);
    }
    if !std::io::stdin().is_terminal() {
        return Err(CliError::NonInteractiveRequiresYes {
            action: action.into(),
        });
    }
    dialoguer::Confirm::new()
        .with_prompt(message)
        .default(false)
        .interact()
        .map_err(|e| CliError::Io(std::io::Error::other(e)))
}

// ── Offline pipeline ────────────────────────────────────────────────

/// Collaborator for commands that only touch persisted state. The
/// pipeline never authenticates, so neither side is ever called.
pub struct Offline;

pub struct NoHandle;

impl SubscriptionHandle for NoHandle {
    fn close(&mut self) {}
}

impl EventFeed for Offline {
    type Handle = NoHandle;

    fn subscribe(&self, _since: i64, _sink: FeedSink) -> Result<NoHandle, CoreError> {
        Err(CoreError::FeedSubscription {
            reason: "feed is not available to offline commands".into(),
        })
    }
}

impl SnapshotSource for Offline {
    async fn fetch_snapshot(&self, hive_id: &str) -> Result<Option<SensorSnapshot>, CoreError> {
        Err(CoreError::SnapshotFetch {
            hive_id: hive_id.into(),
            reason: "sensor API is not available to offline commands".into(),
        })
    }
}

/// A pipeline over the state directory, for edits that must follow the
/// same persistence rules as a live session.
pub fn offline_pipeline(global: &GlobalOpts, cfg: &Config) -> Pipeline {
    let state = config::open_state(config::state_dir(global, cfg));
    let pipeline_config = PipelineConfig {
        thresholds: cfg.thresholds.clone(),
        ..PipelineConfig::default()
    };
    Pipeline::spawn(pipeline_config, Offline, Offline, state)
}

pub fn format_time(ts: chrono::DateTime<chrono::Utc>) -> String {
    ts.format("%Y-%m-%d %H:%M:%S").to_string()
}
