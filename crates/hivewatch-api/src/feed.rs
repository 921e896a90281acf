//! Realtime hive event feed over WebSocket, with auto-reconnect.
//!
//! [`FeedClient::subscribe`] connects to the feed endpoint asking for every
//! event with `timestamp >= since`, and hands each parsed [`FeedEvent`] to
//! the `on_event` callback in delivery order. Transport failures are
//! reported through `on_error` and the connection is re-established with
//! exponential backoff + jitter. Each reconnect resumes one past the
//! highest timestamp already delivered by this handle, so a flapping link
//! never replays the whole range.
//!
//! # Example
//!
//! ```rust,ignore
//! use hivewatch_api::feed::{FeedClient, ReconnectConfig};
//!
//! let client = FeedClient::new(feed_url, "owner-1".into(), None, ReconnectConfig::default());
//! let mut handle = client.subscribe(
//!     1001,
//!     |event| println!("{} {}", event.hive_id, event.event_type),
//!     |err| eprintln!("feed error: {err}"),
//! )?;
//!
//! handle.close();
//! ```

use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use secrecy::{ExposeSecret, SecretString};
use tokio::task::JoinHandle;
use tokio_tungstenite::Connector;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::{self, ClientRequestBuilder};
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::error::Error;
use crate::models::{FeedEvent, FeedFrame};
use crate::transport::{TlsMode, feed_connector};

// ── ReconnectConfig ──────────────────────────────────────────────────

/// Exponential backoff configuration for feed reconnection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconnectConfig {
    /// Delay before the first reconnection attempt. Default: 1s.
    pub initial_delay: Duration,

    /// Upper bound on backoff delay. Default: 30s.
    pub max_delay: Duration,

    /// Maximum reconnection attempts before giving up.
    /// `None` means retry forever, `Some(0)` means never reconnect.
    pub max_retries: Option<u32>,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            max_retries: None,
        }
    }
}

// ── FeedClient ───────────────────────────────────────────────────────

/// Factory for feed subscriptions scoped to one owner.
#[derive(Debug, Clone)]
pub struct FeedClient {
    feed_url: Url,
    owner: String,
    token: Option<SecretString>,
    reconnect: ReconnectConfig,
    tls: TlsMode,
}

type EventCallback = Arc<dyn Fn(FeedEvent) + Send + Sync>;
type ErrorCallback = Arc<dyn Fn(Error) + Send + Sync>;

impl FeedClient {
    pub fn new(
        feed_url: Url,
        owner: String,
        token: Option<SecretString>,
        reconnect: ReconnectConfig,
    ) -> Self {
        Self {
            feed_url,
            owner,
            token,
            reconnect,
            tls: TlsMode::System,
        }
    }

    /// Use the same TLS verification mode as the sensor client.
    pub fn with_tls(mut self, tls: TlsMode) -> Self {
        self.tls = tls;
        self
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Open a subscription delivering every event with `timestamp >= since`.
    ///
    /// Returns immediately once the background task is spawned; the first
    /// connection attempt happens asynchronously. Must be called from
    /// within a Tokio runtime.
    pub fn subscribe<E, R>(&self, since: i64, on_event: E, on_error: R) -> Result<FeedHandle, Error>
    where
        E: Fn(FeedEvent) + Send + Sync + 'static,
        R: Fn(Error) + Send + Sync + 'static,
    {
        // Validate the URL up front so a bad config fails synchronously.
        let _ = subscription_url(&self.feed_url, &self.owner, since)?;
        let connector = feed_connector(&self.tls)?;

        let cancel = CancellationToken::new();
        let session = FeedSession {
            feed_url: self.feed_url.clone(),
            owner: self.owner.clone(),
            token: self.token.clone(),
            reconnect: self.reconnect.clone(),
            connector,
            on_event: Arc::new(on_event),
            on_error: Arc::new(on_error),
        };

        let task_cancel = cancel.clone();
        let task = tokio::spawn(async move {
            session.run(since, task_cancel).await;
        });

        Ok(FeedHandle {
            since,
            cancel,
            task: Some(task),
        })
    }
}

// ── FeedHandle ───────────────────────────────────────────────────────

/// Handle to one running feed subscription.
///
/// Closing (or dropping) the handle cancels the background task. No
/// callback starts after [`close`](Self::close) returns.
pub struct FeedHandle {
    since: i64,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl FeedHandle {
    /// The inclusive lower bound this subscription was opened with.
    pub fn since(&self) -> i64 {
        self.since
    }

    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Tear down the subscription.
    pub fn close(&mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for FeedHandle {
    fn drop(&mut self) {
        self.close();
    }
}

// ── Background reconnection loop ─────────────────────────────────────

struct FeedSession {
    feed_url: Url,
    owner: String,
    token: Option<SecretString>,
    reconnect: ReconnectConfig,
    connector: Option<Connector>,
    on_event: EventCallback,
    on_error: ErrorCallback,
}

impl FeedSession {
    /// Main loop: connect → read → on error, backoff → reconnect.
    async fn run(self, since: i64, cancel: CancellationToken) {
        let mut attempt: u32 = 0;
        let mut resume_from = since;

        loop {
            let result = tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                result = self.connect_and_read(&mut resume_from, &cancel) => result,
            };

            match result {
                // Clean disconnect (server close frame or stream ended).
                // Reset the attempt counter and reconnect immediately.
                Ok(()) => {
                    if cancel.is_cancelled() {
                        break;
                    }
                    tracing::info!(resume_from, "feed disconnected cleanly, reconnecting");
                    attempt = 0;
                }
                Err(e) => {
                    tracing::warn!(error = %e, attempt, "feed error");
                    (self.on_error)(e);

                    if let Some(max) = self.reconnect.max_retries {
                        if attempt >= max {
                            tracing::error!(
                                max_retries = max,
                                "feed reconnection limit reached, giving up"
                            );
                            break;
                        }
                    }

                    let delay = calculate_backoff(attempt, &self.reconnect);
                    tracing::info!(?delay, attempt, resume_from, "waiting before reconnect");

                    tokio::select! {
                        biased;
                        () = cancel.cancelled() => break,
                        () = tokio::time::sleep(delay) => {}
                    }

                    attempt = attempt.saturating_add(1);
                }
            }
        }

        tracing::debug!("feed loop exiting");
    }

    /// Establish a single connection and read frames until it drops.
    ///
    /// `resume_from` is advanced past every delivered event so the next
    /// connection attempt picks up where this one stopped.
    async fn connect_and_read(
        &self,
        resume_from: &mut i64,
        cancel: &CancellationToken,
    ) -> Result<(), Error> {
        let url = subscription_url(&self.feed_url, &self.owner, *resume_from)?;
        tracing::info!(url = %url, "connecting to feed");

        let uri: tungstenite::http::Uri = url.as_str().parse().map_err(
            |e: tungstenite::http::uri::InvalidUri| Error::WebSocketConnect(e.to_string()),
        )?;

        let mut request = ClientRequestBuilder::new(uri);
        if let Some(ref token) = self.token {
            request = request.with_header("Authorization", format!("Bearer {}", token.expose_secret()));
        }

        let (ws_stream, _response) =
            tokio_tungstenite::connect_async_tls_with_config(request, None, false, self.connector.clone())
                .await
                .map_err(|e| Error::WebSocketConnect(e.to_string()))?;

        tracing::info!("feed connected");

        let (_write, mut read) = ws_stream.split();

        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => return Ok(()),
                frame = read.next() => {
                    match frame {
                        Some(Ok(tungstenite::Message::Text(text))) => {
                            for event in parse_frame(&text) {
                                if cancel.is_cancelled() {
                                    return Ok(());
                                }
                                if event.timestamp >= *resume_from {
                                    *resume_from = event.timestamp.saturating_add(1);
                                }
                                (self.on_event)(event);
                            }
                        }
                        Some(Ok(tungstenite::Message::Ping(_))) => {
                            // tungstenite handles pong replies automatically
                            tracing::trace!("feed ping");
                        }
                        Some(Ok(tungstenite::Message::Close(frame))) => {
                            return match frame {
                                Some(cf) if cf.code != CloseCode::Normal => {
                                    Err(Error::WebSocketClosed {
                                        code: u16::from(cf.code),
                                        reason: cf.reason.to_string(),
                                    })
                                }
                                _ => {
                                    tracing::info!("feed close frame received");
                                    Ok(())
                                }
                            };
                        }
                        Some(Err(e)) => {
                            return Err(Error::WebSocketConnect(e.to_string()));
                        }
                        None => {
                            tracing::info!("feed stream ended");
                            return Ok(());
                        }
                        _ => {
                            // Binary, Pong, Frame -- ignore
                        }
                    }
                }
            }
        }
    }
}

// ── URL + frame parsing ──────────────────────────────────────────────

/// `{feed_url}?owner={owner}&startAt={since}`
fn subscription_url(feed_url: &Url, owner: &str, since: i64) -> Result<Url, Error> {
    if !matches!(feed_url.scheme(), "ws" | "wss") {
        return Err(Error::WebSocketConnect(format!(
            "feed URL must use ws:// or wss://, got {}://",
            feed_url.scheme()
        )));
    }
    let mut url = feed_url.clone();
    url.query_pairs_mut()
        .append_pair("owner", owner)
        .append_pair("startAt", &since.to_string());
    Ok(url)
}

/// Parse one text frame into zero or more events. Malformed frames are
/// logged and skipped.
fn parse_frame(text: &str) -> Vec<FeedEvent> {
    match serde_json::from_str::<FeedFrame>(text) {
        Ok(frame) => frame.into_events(),
        Err(e) => {
            tracing::debug!(error = %e, "failed to parse feed frame");
            Vec::new()
        }
    }
}

// ── Backoff calculation ──────────────────────────────────────────────

/// Exponential backoff with jitter.
///
/// `delay = min(initial * 2^attempt, max) * (1 ± 0.25)`
fn calculate_backoff(attempt: u32, config: &ReconnectConfig) -> Duration {
    let base = config.initial_delay.as_secs_f64() * 2.0_f64.powf(f64::from(attempt.min(32)));
    let capped = base.min(config.max_delay.as_secs_f64());

    // Deterministic "jitter" seeded from the attempt number.
    let jitter_factor = 1.0 + 0.25 * (f64::from(attempt) * 7.3).sin();
    let with_jitter = (capped * jitter_factor).max(0.0);

    Duration::from_secs_f64(with_jitter)
}

// ── Tests ────────────────────────────────────────────────────────────
