//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` into user-facing errors with
//! actionable help text and stable exit codes.

use miette::Diagnostic;
use thiserror::Error;

use hivewatch_config::ConfigError;
use hivewatch_core::CoreError;

pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────
    #[error("Could not reach {target}: {reason}")]
    #[diagnostic(
        code(hivewatch::connection_failed),
        help(
            "Check api_url / feed_url in your profile and your network connection.\n\
             Run: hivewatch config show"
        )
    )]
    ConnectionFailed { target: String, reason: String },

    // ── Authentication ───────────────────────────────────────────────
    #[error("Authentication failed for profile '{profile}'")]
    #[diagnostic(
        code(hivewatch::auth_failed),
        help(
            "The API token was rejected.\n\
             Run: hivewatch config set-token --profile {profile}"
        )
    )]
    AuthFailed { profile: String },

    #[error("No API token configured for profile '{profile}'")]
    #[diagnostic(
        code(hivewatch::no_credentials),
        help(
            "Store one with: hivewatch config set-token\n\
             Or set the HIVEWATCH_TOKEN environment variable."
        )
    )]
    NoCredentials { profile: String },

    // ── Resources ────────────────────────────────────────────────────
    #[error("{resource_type} '{identifier}' not found")]
    #[diagnostic(
        code(hivewatch::not_found),
        help("Run: hivewatch {list_command}")
    )]
    NotFound {
        resource_type: String,
        identifier: String,
        list_command: String,
    },

    // ── API ──────────────────────────────────────────────────────────
    #[error("API error ({code}): {message}")]
    #[diagnostic(code(hivewatch::api_error))]
    ApiError { code: String, message: String },

    #[error("Poll cycle failed for every hive: {message}")]
    #[diagnostic(code(hivewatch::poll_failed))]
    PollFailed { message: String },

    // ── State ────────────────────────────────────────────────────────
    #[error("Could not save {key}: {reason}")]
    #[diagnostic(
        code(hivewatch::persistence),
        help("Check that the state directory is writable: {state_dir}")
    )]
    Persistence {
        key: String,
        reason: String,
        state_dir: String,
    },

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(hivewatch::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error("Profile '{name}' not found in configuration")]
    #[diagnostic(
        code(hivewatch::profile_not_found),
        help(
            "Available profiles: {available}\n\
             Create one with: hivewatch config init"
        )
    )]
    ProfileNotFound { name: String, available: String },

    #[error(transparent)]
    #[diagnostic(code(hivewatch::config))]
    Config(Box<figment::Error>),

    #[error("Keyring error: {0}")]
    #[diagnostic(
        code(hivewatch::keyring),
        help("Use --plaintext to store the token in the config file instead.")
    )]
    Keyring(String),

    // ── Interactive ──────────────────────────────────────────────────
    #[error("Destructive operation '{action}' requires confirmation")]
    #[diagnostic(
        code(hivewatch::confirmation_required),
        help("Use --yes (-y) to skip confirmation in non-interactive contexts.")
    )]
    NonInteractiveRequiresYes { action: String },

    // ── Timeout ──────────────────────────────────────────────────────
    #[error("Request timed out after {seconds}s")]
    #[diagnostic(
        code(hivewatch::timeout),
        help("Raise fetch_timeout_secs or timeout in your profile.")
    )]
    Timeout { seconds: u64 },

    // ── IO / Serialization ────────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<figment::Error> for CliError {
    fn from(err: figment::Error) -> Self {
        Self::Config(Box::new(err))
    }
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } => exit_code::CONNECTION,
            Self::AuthFailed { .. } | Self::NoCredentials { .. } => exit_code::AUTH,
            Self::NotFound { .. } => exit_code::NOT_FOUND,
            Self::Timeout { .. } => exit_code::TIMEOUT,
            Self::Validation { .. }
            | Self::NonInteractiveRequiresYes { .. }
            | Self::ProfileNotFound { .. } => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::FeedSubscription { reason } => CliError::ConnectionFailed {
                target: "event feed".into(),
                reason,
            },

            CoreError::SnapshotFetch { hive_id, reason } => CliError::ApiError {
                code: "snapshot_fetch".into(),
                message: format!("{hive_id}: {reason}"),
            },

            CoreError::SnapshotTimeout { timeout_ms, .. } => CliError::Timeout {
                seconds: timeout_ms.div_ceil(1000),
            },

            CoreError::HiveNotFound { hive_id } => CliError::NotFound {
                resource_type: "hive".into(),
                identifier: hive_id,
                list_command: "poll".into(),
            },

            CoreError::Persistence { key, reason } => CliError::Persistence {
                key,
                reason,
                state_dir: "(see --state-dir)".into(),
            },

            CoreError::PipelineStopped => {
                CliError::Internal("alert pipeline stopped unexpectedly".into())
            }

            CoreError::Config { message } => CliError::Validation {
                field: "config".into(),
                reason: message,
            },

            CoreError::Api {
                status: Some(401 | 403),
                ..
            } => CliError::AuthFailed {
                profile: "current".into(),
            },

            CoreError::Api {
                message,
                status: Some(404),
            } => CliError::NotFound {
                resource_type: "resource".into(),
                identifier: message,
                list_command: "config show".into(),
            },

            CoreError::Api {
                message,
                status: Some(status),
            } => CliError::ApiError {
                code: status.to_string(),
                message,
            },

            CoreError::Api {
                message,
                status: None,
            } => CliError::ConnectionFailed {
                target: "sensor API".into(),
                reason: message,
            },

            CoreError::Internal(message) => CliError::Internal(message),
        }
    }
}

impl From<hivewatch_api::Error> for CliError {
    fn from(err: hivewatch_api::Error) -> Self {
        CoreError::from(err).into()
    }
}

// ── ConfigError → CliError mapping ───────────────────────────────────

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation { field, reason } => CliError::Validation { field, reason },
            ConfigError::NoCredentials { profile } => CliError::NoCredentials { profile },
            ConfigError::UnknownProfile { name } => CliError::ProfileNotFound {
                name,
                available: "(none)".into(),
            },
            ConfigError::Keyring(reason) => CliError::Keyring(reason),
            ConfigError::Serialization(e) => CliError::Validation {
                field: "config".into(),
                reason: format!("failed to serialize config: {e}"),
            },
            ConfigError::Figment(e) => CliError::Config(e),
            ConfigError::Io(e) => CliError::Io(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_follow_error_class() {
        let cases = [
            (CoreError::HiveNotFound { hive_id: "h".into() }, exit_code::NOT_FOUND),
            (
                CoreError::SnapshotTimeout {
                    hive_id: "h".into(),
                    timeout_ms: 1500,
                },
                exit_code::TIMEOUT,
            ),
            (
                CoreError::FeedSubscription {
                    reason: "refused".into(),
                },
                exit_code::CONNECTION,
            ),
            (
                CoreError::Api {
                    message: "nope".into(),
                    status: Some(401),
                },
                exit_code::AUTH,
            ),
            (
                CoreError::Config {
                    message: "bad".into(),
                },
                exit_code::USAGE,
            ),
            (CoreError::PipelineStopped, exit_code::GENERAL),
        ];

        for (core, expected) in cases {
            assert_eq!(CliError::from(core).exit_code(), expected);
        }
    }

    #[test]
    fn timeout_rounds_up_to_whole_seconds() {
        let err = CliError::from(CoreError::SnapshotTimeout {
            hive_id: "h".into(),
            timeout_ms: 1500,
        });
        assert!(matches!(err, CliError::Timeout { seconds: 2 }));
    }

    #[test]
    fn missing_profile_is_a_usage_error() {
        let err = CliError::from(ConfigError::UnknownProfile {
            name: "apiary".into(),
        });
        assert_eq!(err.exit_code(), exit_code::USAGE);
    }
}
