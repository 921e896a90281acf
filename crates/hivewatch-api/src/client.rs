// Hive API HTTP client
//
// Wraps `reqwest::Client` with URL construction and status mapping for
// the hive directory and sensor endpoints. Every method returns parsed
// payloads; status codes never leak past this module.

use std::time::Duration;

use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use crate::error::Error;
use crate::models::{HiveRecord, SensorReading};
use crate::transport::TransportConfig;

/// HTTP client for the hive directory and sensor snapshot API.
#[derive(Debug, Clone)]
pub struct HiveApiClient {
    http: reqwest::Client,
    base_url: Url,
    /// Request timeout the client was built with, reported on timeouts.
    timeout: Duration,
}

impl HiveApiClient {
    /// Create a new client from a `TransportConfig`.
    pub fn new(base_url: Url, transport: &TransportConfig) -> Result<Self, Error> {
        let http = transport.build_client()?;
        Ok(Self {
            http,
            base_url,
            timeout: transport.timeout,
        })
    }

    /// Create a client with a pre-built `reqwest::Client`. Timeouts are
    /// reported against the default transport timeout.
    pub fn with_client(http: reqwest::Client, base_url: Url) -> Self {
        Self {
            http,
            base_url,
            timeout: TransportConfig::default().timeout,
        }
    }

    /// The API base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    // ── Endpoints ────────────────────────────────────────────────────

    /// All hives owned by `owner`.
    pub async fn list_owned_hives(&self, owner: &str) -> Result<Vec<HiveRecord>, Error> {
        let url = self.url(&["owners", owner, "hives"])?;
        Ok(self.get_json(url).await?.unwrap_or_default())
    }

    /// A single hive record, or `None` if the hive does not exist.
    pub async fn get_hive(&self, hive_id: &str) -> Result<Option<HiveRecord>, Error> {
        let url = self.url(&["hives", hive_id])?;
        match self.get_json(url).await {
            Ok(record) => Ok(record),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Latest sensor reading for a hive.
    ///
    /// `Ok(None)` means the hive exists but has not reported yet.
    /// An unknown hive fails with [`Error::NotFound`].
    pub async fn latest_reading(&self, hive_id: &str) -> Result<Option<SensorReading>, Error> {
        let url = self.url(&["hives", hive_id, "sensors", "latest"])?;
        let value: Option<serde_json::Value> = self.get_json(url).await?;
        Ok(value.as_ref().and_then(SensorReading::from_value))
    }

    // ── URL builder ──────────────────────────────────────────────────

    /// Append percent-encoded path segments to the base URL.
    fn url(&self, segments: &[&str]) -> Result<Url, Error> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| Error::InvalidUrl(url::ParseError::RelativeUrlWithCannotBeABaseBase))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    // ── Request helpers ──────────────────────────────────────────────

    /// GET a JSON document. `204 No Content` and a literal `null` body
    /// both map to `Ok(None)`.
    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<Option<T>, Error> {
        debug!("GET {}", url);

        let resp = self
            .http
            .get(url.clone())
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;
        let status = resp.status();

        if status == reqwest::StatusCode::NO_CONTENT {
            return Ok(None);
        }

        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(Error::NotFound {
                resource: url.path().to_owned(),
            });
        }

        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN
        {
            return Err(Error::Authentication {
                message: format!("HTTP {status} from {}", url.path()),
            });
        }

        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Http {
                status: status.as_u16(),
                message: body.chars().take(200).collect(),
            });
        }

        let body = resp.text().await.map_err(|e| self.transport_error(e))?;
        serde_json::from_str::<Option<T>>(&body).map_err(|e| {
            let preview: String = body.chars().take(200).collect();
            Error::Deserialization {
                message: format!("{e} (body preview: {preview:?})"),
                body: body.clone(),
            }
        })
    }

    fn transport_error(&self, err: reqwest::Error) -> Error {
        if err.is_timeout() {
            Error::Timeout {
                timeout_ms: u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX),
            }
        } else {
            Error::Transport(err)
        }
    }
}
