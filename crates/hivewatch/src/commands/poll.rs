//! `poll`: one threshold cycle across the owned hives.

use std::fmt::Write as _;
use std::sync::Arc;

use serde::Serialize;
use tabled::Tabled;

use hivewatch_config::Config;
use hivewatch_core::{HiveView, PipelineConfig, PollReport};

use crate::cli::{GlobalOpts, OutputFormat};
use crate::config;
use crate::error::CliError;
use crate::output;

use super::session::Session;
use super::util;

#[derive(Tabled)]
struct HiveRow {
    #[tabled(rename = "Hive")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Metrics")]
    metrics: String,
    #[tabled(rename = "Polled")]
    polled: String,
}

impl HiveRow {
    fn new(view: &HiveView, color: bool) -> Self {
        let metrics = view.last_snapshot.as_ref().map_or_else(
            || "-".to_owned(),
            |s| {
                s.metrics
                    .iter()
                    .map(|(k, v)| format!("{k}={v}"))
                    .collect::<Vec<_>>()
                    .join(" ")
            },
        );
        Self {
            id: view.id.clone(),
            name: view.name.clone(),
            status: output::status_label(view.status, color),
            metrics,
            polled: view
                .last_polled
                .map_or_else(|| "-".into(), util::format_time),
        }
    }
}

#[derive(Serialize)]
struct PollOutput<'a> {
    report: &'a PollReport,
    hives: Vec<Arc<HiveView>>,
}

pub async fn handle(global: &GlobalOpts, cfg: &Config) -> Result<(), CliError> {
    let settings = config::settings(global, cfg)?;
    // One cycle only; the background poller stays off.
    let pipeline_config = PipelineConfig {
        background_sync: false,
        ..settings.pipeline.clone()
    };
    let session = Session::start(settings, pipeline_config)?;
    let result = run(&session, global).await;
    session.pipeline.shutdown().await;
    result
}

async fn run(session: &Session, global: &GlobalOpts) -> Result<(), CliError> {
    session.sync_hives().await?;
    let report = session.pipeline.poll_now().await?;
    let hives = session.pipeline.hives().latest().to_vec();

    for failure in &report.failures {
        tracing::warn!(hive_id = %failure.hive_id, error = %failure.error, "hive skipped");
    }
    if report.polled > 0 && report.failures.len() == report.polled {
        return Err(CliError::PollFailed {
            message: report
                .error()
                .map(|e| e.to_string())
                .unwrap_or_default(),
        });
    }

    let color = output::should_color(global.color);
    let data = PollOutput {
        report: &report,
        hives,
    };
    let out = output::render_single(
        global.output,
        &data,
        |d| render_table(d, color),
        |d| {
            d.hives
                .iter()
                .map(|h| format!("{}\t{}", h.id, output::status_label(h.status, false)))
                .collect::<Vec<_>>()
                .join("\n")
        },
    );
    output::print_output(&out, global.quiet);

    if !global.quiet && global.output == OutputFormat::Table && !report.is_ok() {
        eprintln!("{} hive(s) could not be polled", report.failures.len());
    }
    Ok(())
}

fn render_table(data: &PollOutput<'_>, color: bool) -> String {
    let rows: Vec<HiveRow> = data.hives.iter().map(|h| HiveRow::new(h, color)).collect();
    let mut out = output::render_table(&rows);

    if data.report.breaches.is_empty() {
        out.push_str("\nNo threshold breaches");
    } else {
        out.push_str("\nThreshold breaches:");
        for b in &data.report.breaches {
            let _ = write!(
                out,
                "\n  {} {} = {} ({} {})",
                b.hive_id, b.breach.metric, b.breach.value, b.breach.kind, b.breach.limit
            );
        }
    }
    out
}
