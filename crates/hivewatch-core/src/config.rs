// ── Pipeline runtime configuration ──
//
// Tuning for the alert pipeline. Built by the CLI from the resolved
// profile and handed to `Pipeline::spawn`; core never reads config files.

use std::time::Duration;

use crate::poller::threshold::ThresholdConfig;

#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    /// Period between background poll cycles.
    pub poll_interval: Duration,
    /// Upper bound on a single hive's snapshot fetch.
    pub fetch_timeout: Duration,
    /// Initial background-sync preference. A persisted value wins.
    pub background_sync: bool,
    /// Initial alert thresholds. Persisted thresholds win.
    pub thresholds: ThresholdConfig,
    /// Capacity of the command queue between handles and the actor.
    pub command_buffer: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(30),
            fetch_timeout: Duration::from_secs(10),
            background_sync: true,
            thresholds: ThresholdConfig::default(),
            command_buffer: 64,
        }
    }
}
