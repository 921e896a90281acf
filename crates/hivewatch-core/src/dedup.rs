// ── Event gating ──
//
// Decides whether a feed event becomes a notification. Checks run in a
// fixed order: already-seen key, unowned hive, stale timestamp, and
// finally a match against an existing log entry.

use std::collections::{HashSet, VecDeque};

use crate::error::CoreError;
use crate::model::{EventId, RawEvent};
use crate::notify::NotificationLog;
use crate::watermark::WatermarkStore;

/// Why an event was dropped. Rejections are expected and never errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum Rejection {
    Unowned,
    Stale,
    Duplicate,
}

#[derive(Debug)]
pub struct Accepted {
    pub event_id: EventId,
    pub watermark_advanced: bool,
    /// Set when the advanced watermark could not be persisted.
    pub persist_error: Option<CoreError>,
}

#[derive(Debug)]
pub enum Verdict {
    Accepted(Accepted),
    Rejected(Rejection),
}

impl Verdict {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted(_))
    }

    pub fn rejection(&self) -> Option<Rejection> {
        match self {
            Self::Rejected(reason) => Some(*reason),
            Self::Accepted(_) => None,
        }
    }
}

/// Feed keys remembered for the fast-path duplicate check.
pub const SEEN_KEY_CAPACITY: usize = 512;

/// Remembers the most recent feed keys accepted during this session.
/// Older keys are forgotten; their events are caught as stale anyway.
#[derive(Debug, Default)]
pub struct Deduplicator {
    seen_keys: HashSet<String>,
    seen_order: VecDeque<String>,
}

impl Deduplicator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn accept(
        &mut self,
        event: &RawEvent,
        owned: &HashSet<String>,
        watermark: &mut WatermarkStore,
        log: &NotificationLog,
    ) -> Verdict {
        if self.seen_keys.contains(&event.key) {
            return Verdict::Rejected(Rejection::Duplicate);
        }
        if !owned.contains(&event.hive_id) {
            return Verdict::Rejected(Rejection::Unowned);
        }
        if event.timestamp <= watermark.get() {
            return Verdict::Rejected(Rejection::Stale);
        }

        let event_id = event.event_id();
        if log.contains_event(&event_id) {
            return Verdict::Rejected(Rejection::Duplicate);
        }

        self.remember(&event.key);
        let (watermark_advanced, persist_error) = match watermark.advance(event.timestamp) {
            Ok(advanced) => (advanced, None),
            Err(e) => (true, Some(e)),
        };

        Verdict::Accepted(Accepted {
            event_id,
            watermark_advanced,
            persist_error,
        })
    }

    fn remember(&mut self, key: &str) {
        if !self.seen_keys.insert(key.to_owned()) {
            return;
        }
        self.seen_order.push_back(key.to_owned());
        while self.seen_order.len() > SEEN_KEY_CAPACITY {
            if let Some(oldest) = self.seen_order.pop_front() {
                self.seen_keys.remove(&oldest);
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use chrono::Utc;

    use super::*;
    use crate::model::{Notification, Severity};
    use crate::state::MemoryStateStore;

    fn event(key: &str, hive: &str, ts: i64) -> RawEvent {
        RawEvent {
            key: key.into(),
            hive_id: hive.into(),
            event_type: "varroa".into(),
            timestamp: ts,
            payload: serde_json::Value::Null,
        }
    }

    fn owned() -> HashSet<String> {
        HashSet::from(["h1".to_owned(), "h2".to_owned()])
    }

    fn watermark_at(ts: i64) -> WatermarkStore {
        let mut wm = WatermarkStore::load(Arc::new(MemoryStateStore::new()));
        wm.advance(ts).unwrap();
        wm
    }

    #[test]
    fn accepts_and_advances() {
        let mut dedup = Deduplicator::new();
        let mut wm = watermark_at(1000);
        let log = NotificationLog::new();

        let verdict = dedup.accept(&event("k1", "h1", 1001), &owned(), &mut wm, &log);
        let Verdict::Accepted(accepted) = verdict else {
            panic!("expected acceptance, got {verdict:?}");
        };
        assert_eq!(accepted.event_id.to_string(), "h1|varroa|1001");
        assert!(accepted.watermark_advanced);
        assert_eq!(wm.get(), 1001);
    }

    #[test]
    fn rejects_unowned_before_stale() {
        let mut dedup = Deduplicator::new();
        let mut wm = watermark_at(1000);
        let log = NotificationLog::new();

        let verdict = dedup.accept(&event("k1", "other", 10), &owned(), &mut wm, &log);
        assert_eq!(verdict.rejection(), Some(Rejection::Unowned));
        assert_eq!(wm.get(), 1000);
    }

    #[test]
    fn rejects_at_or_below_watermark() {
        let mut dedup = Deduplicator::new();
        let mut wm = watermark_at(1000);
        let log = NotificationLog::new();

        let at = dedup.accept(&event("k1", "h1", 1000), &owned(), &mut wm, &log);
        let below = dedup.accept(&event("k2", "h1", 999), &owned(), &mut wm, &log);
        assert_eq!(at.rejection(), Some(Rejection::Stale));
        assert_eq!(below.rejection(), Some(Rejection::Stale));
    }

    #[test]
    fn seen_key_is_duplicate() {
        let mut dedup = Deduplicator::new();
        let mut wm = watermark_at(0);
        let log = NotificationLog::new();

        assert!(dedup.accept(&event("k1", "h1", 5), &owned(), &mut wm, &log).is_accepted());
        let replay = dedup.accept(&event("k1", "h1", 5), &owned(), &mut wm, &log);
        assert_eq!(replay.rejection(), Some(Rejection::Duplicate));
    }

    #[test]
    fn seen_keys_stay_bounded() {
        let mut dedup = Deduplicator::new();
        let mut wm = watermark_at(0);
        let log = NotificationLog::new();

        for ts in 1..=10_000 {
            let key = format!("k{ts}");
            assert!(dedup.accept(&event(&key, "h1", ts), &owned(), &mut wm, &log).is_accepted());
        }
        assert_eq!(wm.get(), 10_000);
        assert_eq!(dedup.seen_keys.len(), SEEN_KEY_CAPACITY);
        assert_eq!(dedup.seen_order.len(), SEEN_KEY_CAPACITY);

        // Forgotten keys are still rejected, by the watermark.
        let old = dedup.accept(&event("k1", "h1", 1), &owned(), &mut wm, &log);
        assert_eq!(old.rejection(), Some(Rejection::Stale));
        let recent = dedup.accept(&event("k10000", "h1", 10_000), &owned(), &mut wm, &log);
        assert_eq!(recent.rejection(), Some(Rejection::Duplicate));
    }

    #[test]
    fn logged_event_is_duplicate_under_a_new_key() {
        let mut dedup = Deduplicator::new();
        let mut wm = watermark_at(0);
        let mut log = NotificationLog::new();
        log.push(Notification {
            id: "n1".into(),
            event_id: Some(EventId::new("h1", "varroa", 7)),
            title: "Varroa Mite Outbreak!".into(),
            message: String::new(),
            severity: Severity::High,
            hive_id: "h1".into(),
            event_type: "varroa".into(),
            timestamp: Utc::now(),
            event_timestamp: Some(7),
            read: false,
        });

        let verdict = dedup.accept(&event("fresh-key", "h1", 7), &owned(), &mut wm, &log);
        assert_eq!(verdict.rejection(), Some(Rejection::Duplicate));
        assert_eq!(wm.get(), 0);
    }

    #[test]
    fn persist_failure_still_accepts() {
        let store = Arc::new(MemoryStateStore::new());
        let mut wm = WatermarkStore::load(store.clone());
        store.fail_next_saves(2);

        let mut dedup = Deduplicator::new();
        let verdict = dedup.accept(
            &event("k1", "h1", 9),
            &owned(),
            &mut wm,
            &NotificationLog::new(),
        );
        let Verdict::Accepted(accepted) = verdict else {
            panic!("expected acceptance");
        };
        assert!(accepted.persist_error.is_some());
        assert_eq!(wm.get(), 9);
    }
}
