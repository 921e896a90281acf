//! Threshold handlers.

use serde::Serialize;
use tabled::Tabled;

use hivewatch_config::Config;
use hivewatch_core::state::{self, keys};
use hivewatch_core::{MetricBounds, StateStore, ThresholdConfig};

use crate::cli::{GlobalOpts, ThresholdsArgs, ThresholdsCommand};
use crate::config;
use crate::error::CliError;
use crate::output;

use super::util;

#[derive(Clone, Serialize, Tabled)]
struct ThresholdRow {
    #[tabled(rename = "Metric")]
    metric: String,
    #[tabled(rename = "Min", display_with = "display_bound")]
    min: Option<f64>,
    #[tabled(rename = "Max", display_with = "display_bound")]
    max: Option<f64>,
}

#[allow(clippy::ref_option)]
fn display_bound(bound: &Option<f64>) -> String {
    bound.map_or_else(|| "-".into(), |v| v.to_string())
}

fn rows(thresholds: &ThresholdConfig) -> Vec<ThresholdRow> {
    thresholds
        .iter()
        .map(|(metric, bounds)| ThresholdRow {
            metric: metric.to_owned(),
            min: bounds.min,
            max: bounds.max,
        })
        .collect()
}

/// Saved thresholds if any, else the config file's.
fn effective(store: &dyn StateStore, cfg: &Config) -> Result<ThresholdConfig, CliError> {
    let saved: Option<ThresholdConfig> = state::load_json(store, keys::THRESHOLDS)?;
    Ok(saved.unwrap_or_else(|| cfg.thresholds.clone()))
}

fn validation(field: &str, reason: impl ToString) -> CliError {
    CliError::Validation {
        field: field.into(),
        reason: reason.to_string(),
    }
}

pub async fn handle(args: ThresholdsArgs, global: &GlobalOpts, cfg: &Config) -> Result<(), CliError> {
    let store = config::open_state(config::state_dir(global, cfg));

    match args.command {
        ThresholdsCommand::Show => {
            let thresholds = effective(&*store, cfg)?;
            let data = rows(&thresholds);
            let out =
                output::render_list(global.output, &data, ThresholdRow::clone, |r| r.metric.clone());
            output::print_output(&out, global.quiet);
            Ok(())
        }

        ThresholdsCommand::Set { metric, min, max } => {
            if min.is_none() && max.is_none() {
                return Err(validation("bounds", "give at least one of --min / --max"));
            }
            let bounds = MetricBounds::new(min, max).map_err(|e| validation(&metric, e))?;
            let mut thresholds = effective(&*store, cfg)?;
            thresholds.set(metric.clone(), bounds);
            save(global, cfg, thresholds).await?;
            if !global.quiet {
                eprintln!("Threshold for {metric} updated");
            }
            Ok(())
        }

        ThresholdsCommand::Unset { metric } => {
            let mut thresholds = effective(&*store, cfg)?;
            if thresholds.remove(&metric).is_none() {
                return Err(CliError::NotFound {
                    resource_type: "threshold".into(),
                    identifier: metric,
                    list_command: "thresholds show".into(),
                });
            }
            save(global, cfg, thresholds).await?;
            if !global.quiet {
                eprintln!("Threshold for {metric} removed");
            }
            Ok(())
        }

        ThresholdsCommand::Reset => {
            store.remove(keys::THRESHOLDS)?;
            if !global.quiet {
                eprintln!("Saved thresholds discarded; using config file values");
            }
            Ok(())
        }
    }
}

async fn save(global: &GlobalOpts, cfg: &Config, thresholds: ThresholdConfig) -> Result<(), CliError> {
    let pipeline = util::offline_pipeline(global, cfg);
    let result = pipeline.set_thresholds(thresholds).await;
    pipeline.shutdown().await;
    Ok(result?)
}
