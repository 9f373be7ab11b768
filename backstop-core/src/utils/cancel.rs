//! Cancellation utilities
//!
//! Provides first-class cancellation handles for pending timers and
//! long-running operations.

use std::future::Future;

use tokio_util::sync::CancellationToken;

/// A handle that can be used to request cancellation.
#[derive(Clone, Debug, Default)]
pub struct CancelHandle {
    token: CancellationToken,
}

impl CancelHandle {
    /// Create a new, not yet cancelled handle.
    pub fn new() -> Self {
        Self {
            token: CancellationToken::new(),
        }
    }

    /// Request cancellation. Any future wrapped with [`CancelHandle::run`]
    /// or waiting on [`CancelHandle::cancelled`] stops at its next poll.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Check if cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// A future that resolves when cancellation is requested.
    pub fn cancelled(&self) -> tokio_util::sync::WaitForCancellationFuture<'_> {
        self.token.cancelled()
    }

    /// Drive `future` to completion unless cancellation is requested first.
    ///
    /// Returns `None` when cancelled; the future is dropped without being
    /// polled again.
    pub async fn run<F: Future>(&self, future: F) -> Option<F::Output> {
        tokio::select! {
            biased;
            _ = self.token.cancelled() => None,
            output = future => Some(output),
        }
    }
}

/// Create a standalone cancel handle that can be shared across tasks.
pub fn new_cancel_handle() -> CancelHandle {
    CancelHandle::new()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn run_completes_when_not_cancelled() {
        let handle = new_cancel_handle();
        let out = handle
            .run(async {
                tokio::time::sleep(Duration::from_millis(10)).await;
                7
            })
            .await;
        assert_eq!(out, Some(7));
    }

    #[tokio::test(start_paused = true)]
    async fn run_stops_on_cancel() {
        let handle = new_cancel_handle();
        let remote = handle.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(5)).await;
            remote.cancel();
        });
        let out = handle
            .run(tokio::time::sleep(Duration::from_secs(60)))
            .await;
        assert!(out.is_none());
        assert!(handle.is_cancelled());
    }
}
