//! Output formatting: table, JSON, YAML, plain.
//!
//! Renders data in the format selected by `--output`. Table uses `tabled`,
//! structured formats use serde, plain emits one identifier per line.

use std::io::{self, IsTerminal, Write};

use owo_colors::OwoColorize;
use tabled::{Table, Tabled, settings::Style};

use hivewatch_core::{HiveStatus, Notification, Severity};

use crate::cli::{ColorMode, OutputFormat};

// ── Color helpers ────────────────────────────────────────────────────

/// Determine whether color output should be enabled.
pub fn should_color(mode: ColorMode) -> bool {
    match mode {
        ColorMode::Always => true,
        ColorMode::Never => false,
        ColorMode::Auto => io::stdout().is_terminal() && std::env::var_os("NO_COLOR").is_none(),
    }
}

pub fn severity_label(severity: Severity, color: bool) -> String {
    let label = severity.to_string().to_uppercase();
    if !color {
        return label;
    }
    match severity {
        Severity::High => label.red().bold().to_string(),
        Severity::Medium => label.yellow().to_string(),
        Severity::Low => label.cyan().to_string(),
    }
}

pub fn status_label(status: Option<HiveStatus>, color: bool) -> String {
    let Some(status) = status else {
        return "unknown".into();
    };
    let label = status.to_string();
    if !color {
        return label;
    }
    match status {
        HiveStatus::Healthy => label.green().to_string(),
        HiveStatus::Warning => label.yellow().to_string(),
        HiveStatus::Critical => label.red().bold().to_string(),
    }
}

/// One line per notification, for streaming output.
pub fn notification_line(n: &Notification, format: OutputFormat, color: bool) -> String {
    match format {
        OutputFormat::Json | OutputFormat::JsonCompact => render_json_compact(n),
        OutputFormat::Plain => n.id.clone(),
        OutputFormat::Table | OutputFormat::Yaml => {
            let time = n.timestamp.format("%H:%M:%S");
            let title = if color {
                n.title.bold().to_string()
            } else {
                n.title.clone()
            };
            format!(
                "{time} [{}] {title}: {}",
                severity_label(n.severity, color),
                n.message
            )
        }
    }
}

// ── Render dispatchers ───────────────────────────────────────────────

/// Render a list of serde-serializable + tabled items in the chosen format.
pub fn render_list<T, R>(
    format: OutputFormat,
    data: &[T],
    to_row: impl Fn(&T) -> R,
    id_fn: impl Fn(&T) -> String,
) -> String
where
    T: serde::Serialize,
    R: Tabled,
{
    match format {
        OutputFormat::Table => {
            let rows: Vec<R> = data.iter().map(to_row).collect();
            render_table(&rows)
        }
        OutputFormat::Json => render_json_pretty(data),
        OutputFormat::JsonCompact => render_json_compact(data),
        OutputFormat::Yaml => render_yaml(data),
        OutputFormat::Plain => data.iter().map(&id_fn).collect::<Vec<_>>().join("\n"),
    }
}

/// Render a single serde-serializable item in the chosen format.
///
/// Table rendering uses `detail_fn`, since single-item views don't use
/// the `Tabled` derive.
pub fn render_single<T>(
    format: OutputFormat,
    data: &T,
    detail_fn: impl Fn(&T) -> String,
    id_fn: impl Fn(&T) -> String,
) -> String
where
    T: serde::Serialize,
{
    match format {
        OutputFormat::Table => detail_fn(data),
        OutputFormat::Json => render_json_pretty(data),
        OutputFormat::JsonCompact => render_json_compact(data),
        OutputFormat::Yaml => render_yaml(data),
        OutputFormat::Plain => id_fn(data),
    }
}

/// Print the rendered output to stdout, respecting quiet mode.
pub fn print_output(output: &str, quiet: bool) {
    if quiet || output.is_empty() {
        return;
    }
    let mut stdout = io::stdout().lock();
    let _ = writeln!(stdout, "{output}");
}

// ── Format-specific renderers ────────────────────────────────────────

pub fn render_table<R: Tabled>(rows: &[R]) -> String {
    Table::new(rows).with(Style::rounded()).to_string()
}

fn render_json_pretty<T: serde::Serialize + ?Sized>(data: &T) -> String {
    serde_json::to_string_pretty(data).unwrap_or_else(|e| format!("serialization failed: {e}"))
}

fn render_json_compact<T: serde::Serialize + ?Sized>(data: &T) -> String {
    serde_json::to_string(data).unwrap_or_else(|e| format!("serialization failed: {e}"))
}

fn render_yaml<T: serde::Serialize + ?Sized>(data: &T) -> String {
    serde_yaml::to_string(data).unwrap_or_else(|e| format!("serialization failed: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(serde::Serialize, Tabled)]
    struct Row {
        id: String,
        value: u8,
    }

    fn rows() -> Vec<Row> {
        vec![
            Row {
                id: "a".into(),
                value: 1,
            },
            Row {
                id: "b".into(),
                value: 2,
            },
        ]
    }

    #[test]
    fn plain_lists_one_id_per_line() {
        let out = render_list(
            OutputFormat::Plain,
            &rows(),
            |r| Row {
                id: r.id.clone(),
                value: r.value,
            },
            |r| r.id.clone(),
        );
        assert_eq!(out, "a\nb");
    }

    #[test]
    fn compact_json_is_single_line() {
        let out = render_list(
            OutputFormat::JsonCompact,
            &rows(),
            |r| Row {
                id: r.id.clone(),
                value: r.value,
            },
            |r| r.id.clone(),
        );
        assert_eq!(out, r#"[{"id":"a","value":1},{"id":"b","value":2}]"#);
    }

    #[test]
    fn uncolored_labels_are_plain_text() {
        assert_eq!(severity_label(Severity::High, false), "HIGH");
        assert_eq!(status_label(None, false), "unknown");
        assert_eq!(status_label(Some(HiveStatus::Warning), false), "warning");
    }
}
