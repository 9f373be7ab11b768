//! Notification subscriptions.
//!
//! Adapts any stream of change notifications (realtime events, polling
//! ticks) into one `schedule_refresh` call per item.

use std::future::Future;
use std::sync::Arc;

use futures::{Stream, StreamExt};
use tokio::task::JoinHandle;
use tracing::debug;

use super::coalescer::RefreshCoalescer;
use crate::utils::CancelHandle;

/// A live subscription feeding a refresh channel.
///
/// Closing (or dropping) the subscription stops consuming notifications and
/// closes the channel, cancelling any pending refresh. If the stream ends on
/// its own, the subscription stops consuming but a refresh already armed
/// still fires.
#[derive(Debug)]
pub struct Subscription {
    coalescer: RefreshCoalescer,
    cancel: CancelHandle,
    task: JoinHandle<()>,
}

/// Feed `coalescer` from `notifications`, refreshing with `fetch`.
pub fn subscribe<S, F, Fut>(coalescer: RefreshCoalescer, notifications: S, fetch: F) -> Subscription
where
    S: Stream + Send + 'static,
    S::Item: Send,
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let cancel = CancelHandle::new();
    let fetch = Arc::new(fetch);
    let channel = coalescer.clone();
    let stop = cancel.clone();

    let task = tokio::spawn(async move {
        let mut notifications = Box::pin(notifications);
        let mut received: u64 = 0;
        while let Some(Some(_)) = stop.run(notifications.next()).await {
            received += 1;
            let fetch = fetch.clone();
            channel.schedule_refresh(move || (*fetch)());
        }
        debug!(channel = channel.channel(), received, "Notification stream finished");
    });

    Subscription {
        coalescer,
        cancel,
        task,
    }
}

impl Subscription {
    pub fn coalescer(&self) -> &RefreshCoalescer {
        &self.coalescer
    }

    /// Whether notifications are still being consumed.
    pub fn is_active(&self) -> bool {
        !self.cancel.is_cancelled() && !self.task.is_finished()
    }

    /// Stop consuming notifications and close the channel. Idempotent.
    pub fn close(&self) {
        self.cancel.cancel();
        self.coalescer.close();
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.close();
    }
}
