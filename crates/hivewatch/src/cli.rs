//! Clap derive structures for the `hivewatch` CLI.
//!
//! Defines the command tree, global flags, and shared value enums.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// hivewatch -- realtime alerts for your beehives
#[derive(Debug, Parser)]
#[command(
    name = "hivewatch",
    version,
    about = "Watch beehive sensors and act on alerts from the command line",
    long_about = "Subscribes to the realtime hive event feed, deduplicates events against a\n\
        persisted watermark, and raises severity-tagged notifications. A periodic\n\
        poll of sensor snapshots adds threshold alerts on top.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Profile to use
    #[arg(long, short = 'p', env = "HIVEWATCH_PROFILE", global = true)]
    pub profile: Option<String>,

    /// Config file path (defaults to the platform config directory)
    #[arg(long, env = "HIVEWATCH_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Directory holding persisted pipeline state (overrides profile)
    #[arg(long, env = "HIVEWATCH_STATE_DIR", global = true)]
    pub state_dir: Option<PathBuf>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "HIVEWATCH_OUTPUT",
        default_value = "table",
        global = true
    )]
    pub output: OutputFormat,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Log line format
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Write logs to this file instead of stderr
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Skip confirmation prompts
    #[arg(long, short = 'y', global = true)]
    pub yes: bool,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// YAML
    Yaml,
    /// Plain text, one value per line (scripting)
    Plain,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// Human-readable lines
    Text,
    /// One JSON object per line
    Json,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Subscribe to the event feed and print alerts until Ctrl-C
    #[command(alias = "w")]
    Watch(WatchArgs),

    /// Run one threshold poll cycle and show hive status
    Poll,

    /// Inspect and manage the notification log
    #[command(alias = "n")]
    Notifications(NotificationsArgs),

    /// Show or edit alert thresholds
    Thresholds(ThresholdsArgs),

    /// Show or reset the feed watermark
    Watermark(WatermarkArgs),

    /// Record a test alert without going through the feed
    Trigger(TriggerArgs),

    /// Manage CLI configuration and profiles
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Watch ────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct WatchArgs {
    /// Turn the periodic threshold poller on or off (remembered)
    #[arg(long, value_name = "BOOL")]
    pub background_sync: Option<bool>,
}

// ── Notifications ────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct NotificationsArgs {
    #[command(subcommand)]
    pub command: NotificationsCommand,
}

#[derive(Debug, Subcommand)]
pub enum NotificationsCommand {
    /// List notifications, newest first
    #[command(alias = "ls")]
    List {
        /// Only show unread notifications
        #[arg(long)]
        unread: bool,
    },

    /// Mark one notification as read
    Read { id: String },

    /// Mark every notification as read
    ReadAll,

    /// Remove a notification (the newest one if no id is given)
    #[command(alias = "rm")]
    Dismiss { id: Option<String> },

    /// Remove every notification
    Clear,
}

// ── Thresholds ───────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ThresholdsArgs {
    #[command(subcommand)]
    pub command: ThresholdsCommand,
}

#[derive(Debug, Subcommand)]
pub enum ThresholdsCommand {
    /// Show the thresholds in effect
    Show,

    /// Set bounds for one metric (omit a side to leave it unbounded)
    Set {
        /// Metric name (temperature, humidity, varroa, ...)
        metric: String,

        #[arg(long, allow_negative_numbers = true)]
        min: Option<f64>,

        #[arg(long, allow_negative_numbers = true)]
        max: Option<f64>,
    },

    /// Stop alerting on one metric
    Unset { metric: String },

    /// Discard saved thresholds and fall back to the config file
    Reset,
}

// ── Watermark ────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct WatermarkArgs {
    #[command(subcommand)]
    pub command: WatermarkCommand,
}

#[derive(Debug, Subcommand)]
pub enum WatermarkCommand {
    /// Show the newest accepted event timestamp
    Show,

    /// Forget the watermark so the next subscription replays the feed
    Reset,
}

// ── Trigger ──────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct TriggerArgs {
    /// Event type (swarm, varroa, temperature, ...)
    pub event_type: String,

    /// Hive id the alert refers to
    #[arg(long)]
    pub hive: String,

    /// Display name (defaults to the hive id)
    #[arg(long)]
    pub name: Option<String>,
}

// ── Config ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Create or update a profile (prompts for anything not given)
    Init(ConfigInitArgs),

    /// Show the loaded configuration (tokens redacted)
    Show,

    /// Store the API token for the active profile
    SetToken {
        /// Save in the config file instead of the system keyring
        #[arg(long)]
        plaintext: bool,
    },
}

#[derive(Debug, Args)]
pub struct ConfigInitArgs {
    #[arg(long)]
    pub api_url: Option<String>,

    #[arg(long)]
    pub feed_url: Option<String>,

    #[arg(long)]
    pub owner: Option<String>,

    /// Skip the token prompt
    #[arg(long)]
    pub no_token: bool,
}

// ── Completions ──────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
