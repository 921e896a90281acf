//! Watermark handlers.

use serde::Serialize;

use hivewatch_config::Config;
use hivewatch_core::state::keys;
use hivewatch_core::watermark::WatermarkStore;

use crate::cli::{GlobalOpts, WatermarkArgs, WatermarkCommand};
use crate::config;
use crate::error::CliError;
use crate::output;

use super::util;

#[derive(Serialize)]
struct WatermarkView {
    watermark: i64,
    /// Timestamp the next subscription starts from.
    resume_from: i64,
}

pub fn handle(args: &WatermarkArgs, global: &GlobalOpts, cfg: &Config) -> Result<(), CliError> {
    let store = config::open_state(config::state_dir(global, cfg));

    match args.command {
        WatermarkCommand::Show => {
            let watermark = WatermarkStore::load(store).get();
            let view = WatermarkView {
                watermark,
                resume_from: watermark.saturating_add(1),
            };
            let out = output::render_single(
                global.output,
                &view,
                |v| format!("watermark: {}\nresume from: {}", v.watermark, v.resume_from),
                |v| v.watermark.to_string(),
            );
            output::print_output(&out, global.quiet);
            Ok(())
        }

        WatermarkCommand::Reset => {
            if !util::confirm(
                "Reset the watermark? The next session replays the whole feed.",
                "watermark reset",
                global.yes,
            )? {
                return Ok(());
            }
            store.remove(keys::WATERMARK)?;
            if !global.quiet {
                eprintln!("Watermark reset");
            }
            Ok(())
        }
    }
}
