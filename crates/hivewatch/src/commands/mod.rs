//! Command dispatch: bridges CLI args to pipeline operations and output.

pub mod config_cmd;
pub mod notifications;
pub mod poll;
pub mod session;
pub mod thresholds;
pub mod trigger;
pub mod util;
pub mod watch;
pub mod watermark;

use hivewatch_config::Config;

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;

/// Dispatch a command that needs the loaded config.
pub async fn dispatch(cmd: Command, global: &GlobalOpts, cfg: &Config) -> Result<(), CliError> {
    match cmd {
        Command::Watch(args) => watch::handle(args, global, cfg).await,
        Command::Poll => poll::handle(global, cfg).await,
        Command::Notifications(args) => notifications::handle(args, global, cfg).await,
        Command::Thresholds(args) => thresholds::handle(args, global, cfg).await,
        Command::Watermark(args) => watermark::handle(&args, global, cfg),
        Command::Trigger(args) => trigger::handle(args, global, cfg).await,
        // Handled in main before the config is loaded
        Command::Config(_) | Command::Completions(_) => Err(CliError::Internal(
            "command dispatched after config load".into(),
        )),
    }
}
