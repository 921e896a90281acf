// ── API-to-domain conversions ──
//
// Bridges hivewatch-api wire types into core domain types, and
// implements the pipeline's collaborator traits for the HTTP and
// WebSocket clients.

use std::collections::BTreeSet;

use hivewatch_api::{FeedClient, FeedEvent, FeedHandle, HiveApiClient, HiveRecord, SensorReading};

use crate::directory::HiveDirectory;
use crate::error::CoreError;
use crate::model::{RawEvent, SensorSnapshot, TrackedHive};
use crate::poller::SnapshotSource;
use crate::subscription::{EventFeed, FeedSink, SubscriptionHandle};

impl From<FeedEvent> for RawEvent {
    fn from(e: FeedEvent) -> Self {
        Self {
            key: e.key,
            hive_id: e.hive_id,
            event_type: e.event_type,
            timestamp: e.timestamp,
            payload: e.payload,
        }
    }
}

impl From<SensorReading> for SensorSnapshot {
    fn from(r: SensorReading) -> Self {
        Self { metrics: r.metrics }
    }
}

impl From<HiveRecord> for TrackedHive {
    fn from(r: HiveRecord) -> Self {
        Self {
            id: r.id,
            name: r.name,
        }
    }
}

// ── Feed ────────────────────────────────────────────────────────────

impl SubscriptionHandle for FeedHandle {
    fn close(&mut self) {
        FeedHandle::close(self);
    }
}

impl EventFeed for FeedClient {
    type Handle = FeedHandle;

    fn subscribe(&self, since: i64, sink: FeedSink) -> Result<FeedHandle, CoreError> {
        let events = sink.clone();
        let handle = FeedClient::subscribe(
            self,
            since,
            move |event| {
                events.deliver(RawEvent::from(event));
            },
            move |err| {
                sink.fail(err.to_string());
            },
        )?;
        Ok(handle)
    }
}

// ── HTTP ────────────────────────────────────────────────────────────

impl SnapshotSource for HiveApiClient {
    async fn fetch_snapshot(&self, hive_id: &str) -> Result<Option<SensorSnapshot>, CoreError> {
        match self.latest_reading(hive_id).await {
            Ok(reading) => Ok(reading.map(SensorSnapshot::from)),
            Err(e) if e.is_not_found() => Err(CoreError::HiveNotFound {
                hive_id: hive_id.to_owned(),
            }),
            Err(hivewatch_api::Error::Timeout { timeout_ms }) => Err(CoreError::SnapshotTimeout {
                hive_id: hive_id.to_owned(),
                timeout_ms,
            }),
            Err(e) => Err(CoreError::SnapshotFetch {
                hive_id: hive_id.to_owned(),
                reason: e.to_string(),
            }),
        }
    }
}

impl HiveDirectory for HiveApiClient {
    async fn list_owned_hive_ids(&self, owner: &str) -> Result<BTreeSet<String>, CoreError> {
        let hives = self.list_owned_hives(owner).await?;
        Ok(hives.into_iter().map(|h| h.id).collect())
    }

    async fn hive_name(&self, hive_id: &str) -> Result<Option<String>, CoreError> {
        Ok(self.get_hive(hive_id).await?.map(|h| h.name))
    }

    /// The directory listing already carries names, so one request suffices.
    async fn tracked_hives(&self, owner: &str) -> Result<Vec<TrackedHive>, CoreError> {
        let hives = self.list_owned_hives(owner).await?;
        Ok(hives.into_iter().map(TrackedHive::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn feed_event_converts_field_for_field() {
        let raw = RawEvent::from(FeedEvent {
            key: "k1".into(),
            hive_id: "h1".into(),
            event_type: "swarm".into(),
            timestamp: 1001,
            payload: serde_json::json!({ "weightDrop": 2.5 }),
        });
        assert_eq!(raw.key, "k1");
        assert_eq!(raw.event_id().to_string(), "h1|swarm|1001");
        assert_eq!(raw.payload["weightDrop"], 2.5);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod http_tests {
    use std::time::Duration;

    use hivewatch_api::TransportConfig;
    use url::Url;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    #[tokio::test]
    async fn slow_snapshot_is_a_snapshot_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/hives/h1/sensors/latest"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
            .mount(&server)
            .await;

        let transport = TransportConfig {
            timeout: Duration::from_millis(100),
            ..TransportConfig::default()
        };
        let client = HiveApiClient::new(Url::parse(&server.uri()).unwrap(), &transport).unwrap();

        let err = client.fetch_snapshot("h1").await.unwrap_err();
        assert!(
            matches!(
                err,
                CoreError::SnapshotTimeout { ref hive_id, timeout_ms: 100 } if hive_id == "h1"
            ),
            "expected SnapshotTimeout, got: {err:?}"
        );
    }
}
