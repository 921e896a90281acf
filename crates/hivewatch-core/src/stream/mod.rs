// ── Reactive projections ──
//
// Read-only views of pipeline state for the presentation layer.

use std::pin::Pin;
use std::task::{Context, Poll};

use futures_core::Stream;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;

/// A subscription to one piece of pipeline state.
///
/// Provides point-in-time access and change notification via
/// [`changed`](Self::changed) or by converting into a `Stream`.
pub struct Projection<T: Clone + Send + Sync + 'static> {
    current: T,
    receiver: watch::Receiver<T>,
}

impl<T: Clone + Send + Sync + 'static> Projection<T> {
    pub(crate) fn new(receiver: watch::Receiver<T>) -> Self {
        let current = receiver.borrow().clone();
        Self { current, receiver }
    }

    /// The value captured at creation or by the last `changed()`.
    pub fn current(&self) -> &T {
        &self.current
    }

    /// The latest value, which may be newer than `current()`.
    pub fn latest(&self) -> T {
        self.receiver.borrow().clone()
    }

    /// Wait for the next change. Returns `None` once the pipeline is gone.
    pub async fn changed(&mut self) -> Option<T> {
        self.receiver.changed().await.ok()?;
        let value = self.receiver.borrow_and_update().clone();
        self.current = value.clone();
        Some(value)
    }

    /// Yields the current value immediately, then every change.
    pub fn into_stream(self) -> ProjectionStream<T> {
        ProjectionStream {
            inner: WatchStream::new(self.receiver),
        }
    }
}

/// `Stream` adapter backed by a `watch::Receiver`.
pub struct ProjectionStream<T: Clone + Send + Sync + 'static> {
    inner: WatchStream<T>,
}

impl<T: Clone + Send + Sync + 'static> Stream for ProjectionStream<T> {
    type Item = T;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        // WatchStream<T> is Unpin regardless of T.
        Pin::new(&mut self.inner).poll_next(cx)
    }
}
