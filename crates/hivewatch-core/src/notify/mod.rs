// ── Notification center ──
//
// Owns the notification log and the popup state machine. Recording
// shows the popup and restarts its countdown; manual dismissal removes
// the log entry, while expiry only hides the popup and keeps the entry.

mod log;
mod popup;

use tokio::time::Instant;

use crate::model::Notification;

pub use log::{LOG_CAPACITY, NotificationLog};
pub use popup::{AUTO_DISMISS, PopupState};

use popup::Popup;

#[derive(Debug, Default)]
pub struct NotificationCenter {
    log: NotificationLog,
    popup: Popup,
}

impl NotificationCenter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from previously persisted entries. The popup starts hidden.
    pub fn restore(entries: Vec<Notification>) -> Self {
        Self {
            log: NotificationLog::from_entries(entries),
            popup: Popup::default(),
        }
    }

    pub fn log(&self) -> &NotificationLog {
        &self.log
    }

    pub fn popup(&self) -> &PopupState {
        self.popup.state()
    }

    pub fn popup_deadline(&self) -> Option<Instant> {
        self.popup.deadline()
    }

    /// Returns the evicted entry when the log overflowed.
    pub fn record(&mut self, notification: Notification, now: Instant) -> Option<Notification> {
        let evicted = self.log.push(notification.clone());
        self.popup.show(notification, now);
        evicted
    }

    pub fn mark_read(&mut self, id: &str) -> bool {
        self.popup.mark_read(id);
        self.log.mark_read(id)
    }

    pub fn mark_all_read(&mut self) -> usize {
        self.popup.mark_all_read();
        self.log.mark_all_read()
    }

    /// Remove `id`, or the popup's notification when `id` is `None`, and
    /// hide the popup in both cases.
    pub fn dismiss(&mut self, id: Option<&str>) -> Option<Notification> {
        let target = id.or_else(|| self.popup.current_id()).map(str::to_owned);
        let removed = target.and_then(|id| self.log.remove(&id));
        self.popup.hide();
        removed
    }

    pub fn clear_all(&mut self) {
        self.log.clear();
        self.popup.hide();
    }

    /// Auto-dismiss. Returns `true` if the popup was hidden.
    pub fn expire_popup(&mut self, now: Instant) -> bool {
        self.popup.expire(now)
    }
}
