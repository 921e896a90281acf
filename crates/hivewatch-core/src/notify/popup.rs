// Transient popup presentation state with auto-dismiss deadline.

use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;

use crate::model::Notification;

pub const AUTO_DISMISS: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PopupState {
    pub visible: bool,
    pub current: Option<Notification>,
}

#[derive(Debug, Default)]
pub(crate) struct Popup {
    state: PopupState,
    deadline: Option<Instant>,
}

impl Popup {
    /// Show `notification`, replacing whatever was visible and
    /// restarting the countdown.
    pub(crate) fn show(&mut self, notification: Notification, now: Instant) {
        self.state = PopupState {
            visible: true,
            current: Some(notification),
        };
        self.deadline = Some(now + AUTO_DISMISS);
    }

    pub(crate) fn hide(&mut self) {
        self.state = PopupState::default();
        self.deadline = None;
    }

    /// Hide without clearing `current` once the deadline has passed.
    pub(crate) fn expire(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.state.visible = false;
                self.deadline = None;
                true
            }
            _ => false,
        }
    }

    pub(crate) fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub(crate) fn state(&self) -> &PopupState {
        &self.state
    }

    pub(crate) fn current_id(&self) -> Option<&str> {
        self.state.current.as_ref().map(|n| n.id.as_str())
    }

    pub(crate) fn mark_read(&mut self, id: &str) {
        if let Some(current) = self.state.current.as_mut().filter(|n| n.id == id) {
            current.read = true;
        }
    }

    pub(crate) fn mark_all_read(&mut self) {
        if let Some(current) = self.state.current.as_mut() {
            current.read = true;
        }
    }
}
