//! Manual test alert.

use hivewatch_config::Config;

use crate::cli::{GlobalOpts, TriggerArgs};
use crate::error::CliError;
use crate::output;

use super::util;

pub async fn handle(args: TriggerArgs, global: &GlobalOpts, cfg: &Config) -> Result<(), CliError> {
    let name = args.name.as_deref().unwrap_or(&args.hive);

    let pipeline = util::offline_pipeline(global, cfg);
    let result = pipeline.trigger_manual(&args.event_type, &args.hive, name).await;
    pipeline.shutdown().await;
    let notification = result?;

    let color = output::should_color(global.color);
    let out = output::render_single(
        global.output,
        &notification,
        |n| output::notification_line(n, global.output, color),
        |n| n.id.clone(),
    );
    output::print_output(&out, global.quiet);
    Ok(())
}
