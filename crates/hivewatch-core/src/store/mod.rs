// ── Reactive pipeline store ──
//
// Read-side state shared between the pipeline actor (sole writer) and
// any number of `Pipeline` handles. Every field is a `watch` channel or
// a reactive collection, so readers never block the actor.

mod collection;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::watch;

use crate::model::{HiveView, Notification};
use crate::notify::PopupState;
use crate::subscription::SubscriptionState;

pub(crate) use collection::Collection;

pub(crate) struct PipelineStore {
    pub(crate) hives: Collection<HiveView>,
    pub(crate) notifications: watch::Sender<Arc<Vec<Notification>>>,
    pub(crate) popup: watch::Sender<PopupState>,
    pub(crate) subscription: watch::Sender<SubscriptionState>,
    pub(crate) watermark: watch::Sender<i64>,
    pub(crate) last_poll: watch::Sender<Option<DateTime<Utc>>>,
}

impl PipelineStore {
    pub(crate) fn new(notifications: Vec<Notification>, watermark: i64) -> Self {
        let (notifications, _) = watch::channel(Arc::new(notifications));
        let (popup, _) = watch::channel(PopupState::default());
        let (subscription, _) = watch::channel(SubscriptionState::Idle);
        let (watermark, _) = watch::channel(watermark);
        let (last_poll, _) = watch::channel(None);

        Self {
            hives: Collection::new(),
            notifications,
            popup,
            subscription,
            watermark,
            last_poll,
        }
    }
}
