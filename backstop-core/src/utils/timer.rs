//! Explicit timer handles.
//!
//! A pending timer is a spawned task sleeping on a [`TimerHandle`]. The
//! handle pairs a cancellation token with a generation stamp: the task only
//! acts if, under the owner's lock, the stored handle still carries its
//! generation. Cancelling and clearing the stored handle therefore happen
//! atomically with respect to the firing task.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use super::cancel::CancelHandle;

/// Handle to one armed timer.
#[derive(Clone, Debug)]
pub struct TimerHandle {
    generation: u64,
    cancel: CancelHandle,
}

impl TimerHandle {
    pub(crate) fn new(generation: u64) -> Self {
        Self {
            generation,
            cancel: CancelHandle::new(),
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Cancel the timer. The sleeping task wakes and exits without acting.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Whether `other` refers to the same armed timer.
    pub fn same_timer(&self, other: &TimerHandle) -> bool {
        self.generation == other.generation
    }

    pub(crate) fn cancel_handle(&self) -> &CancelHandle {
        &self.cancel
    }

    /// Sleep for `delay`. Returns `false` if the timer was cancelled first.
    pub(crate) async fn sleep(&self, delay: Duration) -> bool {
        self.cancel.run(tokio::time::sleep(delay)).await.is_some()
    }
}

/// Monotonic source of timer generations for one owner.
#[derive(Debug, Default)]
pub(crate) struct Generations(AtomicU64);

impl Generations {
    pub(crate) fn next_handle(&self) -> TimerHandle {
        TimerHandle::new(self.0.fetch_add(1, Ordering::Relaxed) + 1)
    }
}
