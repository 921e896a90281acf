use thiserror::Error;

/// Top-level error type for the `hivewatch-api` crate.
///
/// Covers every failure mode of the sensor HTTP API and the realtime
/// event feed. `hivewatch-core` maps these into pipeline-level errors.
#[derive(Debug, Error)]
pub enum Error {
    // ── Authentication ──────────────────────────────────────────────
    /// Token rejected (expired, revoked, wrong owner).
    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Request timed out.
    #[error("Request timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    /// TLS handshake or certificate error.
    #[error("TLS error: {0}")]
    Tls(String),

    // ── HTTP API ────────────────────────────────────────────────────
    /// The requested resource does not exist upstream.
    #[error("Not found: {resource}")]
    NotFound { resource: String },

    /// Any other non-success HTTP status.
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    // ── WebSocket ───────────────────────────────────────────────────
    /// WebSocket connection failed.
    #[error("WebSocket connection failed: {0}")]
    WebSocketConnect(String),

    /// WebSocket closed by the server with an error code.
    #[error("WebSocket closed (code {code}): {reason}")]
    WebSocketClosed { code: u16, reason: String },

    // ── Data ────────────────────────────────────────────────────────
    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },
}

impl Error {
    /// Returns `true` if this is a transient error worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect(),
            Self::Timeout { .. } | Self::WebSocketConnect(_) => true,
            Self::Http { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Returns `true` if this is a "not found" error.
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::NotFound { .. } => true,
            Self::Transport(e) => e.status() == Some(reqwest::StatusCode::NOT_FOUND),
            Self::Http { status: 404, .. } => true,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_variants() {
        assert!(
            Error::NotFound {
                resource: "hive h1".into()
            }
            .is_not_found()
        );
        assert!(
            Error::Http {
                status: 404,
                message: String::new()
            }
            .is_not_found()
        );
        assert!(!Error::Timeout { timeout_ms: 3000 }.is_not_found());
    }

    #[test]
    fn server_errors_are_transient() {
        assert!(
            Error::Http {
                status: 503,
                message: "unavailable".into()
            }
            .is_transient()
        );
        assert!(
            !Error::Http {
                status: 400,
                message: "bad".into()
            }
            .is_transient()
        );
        assert!(Error::WebSocketConnect("refused".into()).is_transient());
    }
}
