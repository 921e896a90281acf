//! Notification log handlers. These run against persisted state only.

use tabled::Tabled;

use hivewatch_config::Config;
use hivewatch_core::Notification;

use crate::cli::{GlobalOpts, NotificationsArgs, NotificationsCommand};
use crate::error::CliError;
use crate::output;

use super::util;

// ── Table row ───────────────────────────────────────────────────────

#[derive(Tabled)]
struct NotificationRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Time")]
    time: String,
    #[tabled(rename = "Severity")]
    severity: String,
    #[tabled(rename = "Hive")]
    hive: String,
    #[tabled(rename = "Title")]
    title: String,
    #[tabled(rename = "Read")]
    read: String,
}

impl NotificationRow {
    fn new(n: &Notification, color: bool) -> Self {
        Self {
            id: n.id.clone(),
            time: util::format_time(n.timestamp),
            severity: output::severity_label(n.severity, color),
            hive: n.hive_id.clone(),
            title: n.title.clone(),
            read: if n.read { "yes" } else { "no" }.into(),
        }
    }
}

fn not_found(id: String) -> CliError {
    CliError::NotFound {
        resource_type: "notification".into(),
        identifier: id,
        list_command: "notifications list".into(),
    }
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(args: NotificationsArgs, global: &GlobalOpts, cfg: &Config) -> Result<(), CliError> {
    let pipeline = util::offline_pipeline(global, cfg);
    let result = run(args.command, &pipeline, global).await;
    pipeline.shutdown().await;
    result
}

async fn run(
    command: NotificationsCommand,
    pipeline: &hivewatch_core::Pipeline,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match command {
        NotificationsCommand::List { unread } => {
            let log = pipeline.notifications().latest();
            let entries: Vec<Notification> =
                log.iter().filter(|n| !unread || !n.read).cloned().collect();
            let color = output::should_color(global.color);
            let out = output::render_list(
                global.output,
                &entries,
                |n| NotificationRow::new(n, color),
                |n| n.id.clone(),
            );
            output::print_output(&out, global.quiet);
            Ok(())
        }

        NotificationsCommand::Read { id } => {
            if !pipeline.mark_read(&id).await? {
                return Err(not_found(id));
            }
            if !global.quiet {
                eprintln!("Notification marked as read");
            }
            Ok(())
        }

        NotificationsCommand::ReadAll => {
            let flipped = pipeline.mark_all_read().await?;
            if !global.quiet {
                eprintln!("{flipped} notification(s) marked as read");
            }
            Ok(())
        }

        NotificationsCommand::Dismiss { id } => {
            // Offline there is no popup, so "the latest" is the newest entry.
            let target = match id {
                Some(id) => id,
                None => pipeline
                    .notifications()
                    .latest()
                    .first()
                    .map(|n| n.id.clone())
                    .ok_or_else(|| not_found("(newest)".into()))?,
            };
            let removed = pipeline
                .dismiss(Some(&target))
                .await?
                .ok_or_else(|| not_found(target))?;
            if !global.quiet {
                eprintln!("Dismissed: {}", removed.title);
            }
            Ok(())
        }

        NotificationsCommand::Clear => {
            if !util::confirm("Remove every notification?", "notifications clear", global.yes)? {
                return Ok(());
            }
            pipeline.clear_all().await?;
            if !global.quiet {
                eprintln!("Notification log cleared");
            }
            Ok(())
        }
    }
}
