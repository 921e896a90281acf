//! `watch`: run the pipeline and stream notifications until Ctrl-C.

use tokio::sync::broadcast::error::RecvError;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, info, warn};

use hivewatch_config::Config;
use hivewatch_core::CoreError;

use crate::cli::{GlobalOpts, WatchArgs};
use crate::config;
use crate::error::CliError;
use crate::output;

use super::session::Session;

pub async fn handle(args: WatchArgs, global: &GlobalOpts, cfg: &Config) -> Result<(), CliError> {
    let settings = config::settings(global, cfg)?;
    if settings.token.is_none() {
        return Err(CliError::NoCredentials {
            profile: settings.profile,
        });
    }

    let pipeline_config = settings.pipeline.clone();
    let session = Session::start(settings, pipeline_config)?;
    let result = run(&session, args, global).await;
    session.pipeline.shutdown().await;
    result
}

async fn run(session: &Session, args: WatchArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let pipeline = &session.pipeline;
    if let Some(enabled) = args.background_sync {
        pipeline.set_background_sync(enabled).await?;
    }

    let mut recorded = pipeline.recorded();
    pipeline.set_authenticated(true).await?;
    let count = session.sync_hives().await?;
    info!(count, owner = %session.settings.owner, "watching hives");
    if !global.quiet {
        eprintln!("Watching {count} hive(s). Press Ctrl-C to stop.");
    }

    let mut refresh = time::interval(session.settings.directory_refresh);
    refresh.set_missed_tick_behavior(MissedTickBehavior::Delay);
    refresh.tick().await;

    let color = output::should_color(global.color);
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            res = &mut ctrl_c => {
                if let Err(e) = res {
                    warn!(error = %e, "failed to listen for Ctrl-C");
                }
                debug!("interrupt received, shutting down");
                return Ok(());
            }
            _ = refresh.tick() => match session.sync_hives().await {
                Ok(count) => debug!(count, "hive directory refreshed"),
                Err(e) => warn!(error = %e, "hive directory refresh failed"),
            },
            msg = recorded.recv() => match msg {
                Ok(n) => output::print_output(
                    &output::notification_line(&n, global.output, color),
                    global.quiet,
                ),
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "output fell behind, some notifications were not printed");
                }
                Err(RecvError::Closed) => return Err(CoreError::PipelineStopped.into()),
            },
        }
    }
}
