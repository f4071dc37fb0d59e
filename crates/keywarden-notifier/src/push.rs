use std::sync::Arc;

use keywarden_core::{ErrorEvent, ErrorInput, ErrorStore};
use tokio::sync::Notify;

/// Store wrapper that wakes the poller on every in-process change
///
/// Writes from other processes sharing the same jar are still only seen on
/// the next poll tick.
pub struct NotifyingStore {
    inner: Arc<dyn ErrorStore>,
    changed: Arc<Notify>,
}

impl NotifyingStore {
    pub fn new(inner: Arc<dyn ErrorStore>) -> Self {
        Self {
            inner,
            changed: Arc::new(Notify::new()),
        }
    }

    /// Signal fired after each change; hand this to the poller
    pub fn changed(&self) -> Arc<Notify> {
        Arc::clone(&self.changed)
    }
}

impl ErrorStore for NotifyingStore {
    fn record(&self, input: ErrorInput) -> ErrorEvent {
        let event = self.inner.record(input);
        self.changed.notify_one();
        event
    }

    fn list(&self) -> Vec<ErrorEvent> {
        self.inner.list()
    }

    fn dismiss(&self, id: &str) {
        self.inner.dismiss(id);
        self.changed.notify_one();
    }

    fn dismiss_all(&self) {
        self.inner.dismiss_all();
        self.changed.notify_one();
    }
}
