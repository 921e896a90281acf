// ── Bounded notification log ──

use std::collections::VecDeque;

use crate::model::{EventId, Notification};

/// Maximum number of retained notifications.
pub const LOG_CAPACITY: usize = 50;

/// Most-recent-first notification history capped at [`LOG_CAPACITY`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NotificationLog {
    entries: VecDeque<Notification>,
}

impl NotificationLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild from a persisted newest-first list, dropping overflow.
    pub fn from_entries(entries: Vec<Notification>) -> Self {
        let mut entries = VecDeque::from(entries);
        entries.truncate(LOG_CAPACITY);
        Self { entries }
    }

    /// Insert at the head. Returns the evicted oldest entry, if any.
    pub fn push(&mut self, notification: Notification) -> Option<Notification> {
        self.entries.push_front(notification);
        if self.entries.len() > LOG_CAPACITY {
            self.entries.pop_back()
        } else {
            None
        }
    }

    pub fn get(&self, id: &str) -> Option<&Notification> {
        self.entries.iter().find(|n| n.id == id)
    }

    pub fn contains_event(&self, event_id: &EventId) -> bool {
        self.entries.iter().any(|n| n.is_from_event(event_id))
    }

    /// Returns `false` if no entry has this id.
    pub fn mark_read(&mut self, id: &str) -> bool {
        match self.entries.iter_mut().find(|n| n.id == id) {
            Some(n) => {
                n.read = true;
                true
            }
            None => false,
        }
    }

    /// Returns the number of entries that were unread.
    pub fn mark_all_read(&mut self) -> usize {
        let mut flipped = 0;
        for n in self.entries.iter_mut().filter(|n| !n.read) {
            n.read = true;
            flipped += 1;
        }
        flipped
    }

    pub fn remove(&mut self, id: &str) -> Option<Notification> {
        let index = self.entries.iter().position(|n| n.id == id)?;
        self.entries.remove(index)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn unread(&self) -> usize {
        self.entries.iter().filter(|n| !n.read).count()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Notification> {
        self.entries.iter()
    }

    pub fn to_vec(&self) -> Vec<Notification> {
        self.entries.iter().cloned().collect()
    }
}
