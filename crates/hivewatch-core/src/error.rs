// ── Core error types ──
//
// Errors surfaced by the alert pipeline. Transport details stay in
// hivewatch-api; the `From<hivewatch_api::Error>` impl folds them into
// the variants below. Expected event rejections (unowned, stale,
// duplicate) are not errors and never appear here.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Feed errors ──────────────────────────────────────────────────
    #[error("Failed to open event feed subscription: {reason}")]
    FeedSubscription { reason: String },

    // ── Snapshot errors ──────────────────────────────────────────────
    #[error("Failed to fetch snapshot for hive {hive_id}: {reason}")]
    SnapshotFetch { hive_id: String, reason: String },

    #[error("Snapshot fetch for hive {hive_id} timed out after {timeout_ms}ms")]
    SnapshotTimeout { hive_id: String, timeout_ms: u64 },

    #[error("Hive not found: {hive_id}")]
    HiveNotFound { hive_id: String },

    // ── Persistence errors ───────────────────────────────────────────
    #[error("Failed to persist {key}: {reason}")]
    Persistence { key: String, reason: String },

    // ── Lifecycle errors ─────────────────────────────────────────────
    #[error("Alert pipeline is not running")]
    PipelineStopped,

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    // ── API errors (wrapped, not exposed raw) ────────────────────────
    #[error("API error: {message}")]
    Api {
        message: String,
        /// HTTP status code (if applicable).
        status: Option<u16>,
    },

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    pub(crate) fn persistence(key: &str, reason: impl ToString) -> Self {
        Self::Persistence {
            key: key.to_owned(),
            reason: reason.to_string(),
        }
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<hivewatch_api::Error> for CoreError {
    fn from(err: hivewatch_api::Error) -> Self {
        use hivewatch_api::Error as Api;

        match err {
            Api::WebSocketConnect(reason) => Self::FeedSubscription { reason },
            Api::WebSocketClosed { code, reason } => Self::FeedSubscription {
                reason: format!("closed with code {code}: {reason}"),
            },
            Api::InvalidUrl(e) => Self::Config {
                message: format!("invalid URL: {e}"),
            },
            Api::Tls(msg) => Self::Config {
                message: format!("TLS setup failed: {msg}"),
            },
            Api::Http { status, message } => Self::Api {
                message,
                status: Some(status),
            },
            Api::Authentication { message } => Self::Api {
                message,
                status: Some(401),
            },
            Api::NotFound { resource } => Self::Api {
                message: format!("not found: {resource}"),
                status: Some(404),
            },
            other => Self::Api {
                message: other.to_string(),
                status: None,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn websocket_errors_become_feed_errors() {
        let err: CoreError = hivewatch_api::Error::WebSocketConnect("refused".into()).into();
        assert!(matches!(err, CoreError::FeedSubscription { reason } if reason == "refused"));
    }

    #[test]
    fn http_status_is_preserved() {
        let err: CoreError = hivewatch_api::Error::Http {
            status: 502,
            message: "bad gateway".into(),
        }
        .into();
        assert!(matches!(err, CoreError::Api { status: Some(502), .. }));
    }
}
