//! A pipeline wired to the real feed and sensor API for one profile.

use hivewatch_api::{FeedClient, HiveApiClient};
use hivewatch_config::Settings;
use hivewatch_core::{Pipeline, PipelineConfig, sync_owned_hives};

use crate::config;
use crate::error::CliError;

pub struct Session {
    pub settings: Settings,
    pub api: HiveApiClient,
    pub pipeline: Pipeline,
}

impl Session {
    pub fn start(settings: Settings, pipeline_config: PipelineConfig) -> Result<Self, CliError> {
        let api = HiveApiClient::new(settings.api_url.clone(), &settings.transport)?;
        let feed = FeedClient::new(
            settings.feed_url.clone(),
            settings.owner.clone(),
            settings.token.clone(),
            settings.reconnect.clone(),
        )
        .with_tls(settings.transport.tls.clone());
        let state = config::open_state(settings.state_dir.clone());

        tracing::debug!(
            profile = %settings.profile,
            api_url = %settings.api_url,
            feed_url = %settings.feed_url,
            "starting session"
        );
        let pipeline = Pipeline::spawn(pipeline_config, feed, api.clone(), state);

        Ok(Self {
            settings,
            api,
            pipeline,
        })
    }

    /// Refresh the tracked hive set from the directory.
    pub async fn sync_hives(&self) -> Result<usize, CliError> {
        Ok(sync_owned_hives(&self.pipeline, &self.api, &self.settings.owner).await?)
    }
}
