// ── Feed events and their identity ──
//
// `EventId` is the stable identity of a feed event, `hive|type|ts`.
// It survives restarts inside persisted notifications and is what the
// duplicate check compares against.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

// ── RawEvent ────────────────────────────────────────────────────────

/// An event as delivered by the realtime feed.
#[derive(Debug, Clone, PartialEq)]
pub struct RawEvent {
    /// Feed-assigned key, unique per delivered event.
    pub key: String,
    pub hive_id: String,
    pub event_type: String,
    /// Milliseconds since the epoch.
    pub timestamp: i64,
    pub payload: serde_json::Value,
}

impl RawEvent {
    pub fn event_id(&self) -> EventId {
        EventId::new(&self.hive_id, &self.event_type, self.timestamp)
    }
}

// ── EventId ─────────────────────────────────────────────────────────

/// Identity of an ingested event, rendered as `hive|type|timestamp`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EventId {
    hive_id: String,
    event_type: String,
    timestamp: i64,
}

impl EventId {
    pub fn new(hive_id: impl Into<String>, event_type: impl Into<String>, timestamp: i64) -> Self {
        Self {
            hive_id: hive_id.into(),
            event_type: event_type.into(),
            timestamp,
        }
    }

    pub fn hive_id(&self) -> &str {
        &self.hive_id
    }

    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}|{}|{}", self.hive_id, self.event_type, self.timestamp)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid event id {0:?}: expected hive|type|timestamp")]
pub struct EventIdParseError(String);

impl FromStr for EventId {
    type Err = EventIdParseError;

    /// Splits from the right so hive ids containing `|` still parse.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.rsplitn(3, '|');
        let (Some(ts), Some(event_type), Some(hive_id)) = (parts.next(), parts.next(), parts.next())
        else {
            return Err(EventIdParseError(s.to_owned()));
        };
        let timestamp = ts.parse().map_err(|_| EventIdParseError(s.to_owned()))?;
        Ok(Self::new(hive_id, event_type, timestamp))
    }
}

impl Serialize for EventId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for EventId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn display_and_parse_agree() {
        let id = EventId::new("hive-07", "varroa", 1001);
        assert_eq!(id.to_string(), "hive-07|varroa|1001");
        assert_eq!("hive-07|varroa|1001".parse::<EventId>().unwrap(), id);
    }

    #[test]
    fn hive_id_may_contain_separator() {
        let id: EventId = "apiary|north|swarm|42".parse().unwrap();
        assert_eq!(id.hive_id(), "apiary|north");
        assert_eq!(id.event_type(), "swarm");
        assert_eq!(id.timestamp(), 42);
    }

    #[test]
    fn rejects_malformed_ids() {
        assert!("no-separators".parse::<EventId>().is_err());
        assert!("h|swarm|not-a-number".parse::<EventId>().is_err());
    }

    #[test]
    fn serializes_as_string() {
        let id = EventId::new("h1", "feeding", 7);
        assert_eq!(serde_json::to_value(&id).unwrap(), serde_json::json!("h1|feeding|7"));
        let back: EventId = serde_json::from_value(serde_json::json!("h1|feeding|7")).unwrap();
        assert_eq!(back, id);
    }
}
