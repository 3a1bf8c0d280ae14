//! Best-effort change notifications.
//!
//! Wraps a tokio broadcast channel. Publishing never blocks and never fails
//! the write that triggered it; receivers that fall behind see `Lagged` and
//! simply miss notifications.

use tokio::sync::broadcast;
use tracing::trace;

use safesprint_core::events::RecordChange;

/// Default channel capacity.
const FEED_CAPACITY: usize = 256;

/// Fan-out of [`RecordChange`] notifications to any number of subscribers.
#[derive(Clone)]
pub struct ChangeFeed {
    tx: broadcast::Sender<RecordChange>,
}

impl ChangeFeed {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(FEED_CAPACITY);
        Self { tx }
    }

    /// Publish a change. Having no subscribers is not an error.
    pub fn publish(&self, change: RecordChange) {
        let event = change.event_name();
        match self.tx.send(change) {
            Ok(receivers) => trace!(event, receivers, "Change published"),
            Err(_) => trace!(event, "Change dropped: no subscribers"),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RecordChange> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ChangeFeed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeFeed")
            .field("subscribers", &self.tx.receiver_count())
            .finish()
    }
}
