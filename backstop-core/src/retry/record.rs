use chrono::{DateTime, Utc};
use tokio::time::Instant;

use crate::RetryInfo;
use crate::utils::TimerHandle;

/// Bookkeeping for one retry key.
///
/// `timer` is the armed retry, or the attempt currently running when
/// `in_flight` is set; either way it is the handle that `cancel_retry`
/// must trip. Invariant: an armed, not-in-flight timer implies
/// `attempt_count < max_attempts`.
#[derive(Debug, Default)]
pub(crate) struct RetryRecord {
    pub(crate) attempt_count: u32,
    pub(crate) last_attempt_at: Option<DateTime<Utc>>,
    pub(crate) last_attempt_instant: Option<Instant>,
    pub(crate) timer: Option<TimerHandle>,
    pub(crate) in_flight: bool,
}

impl RetryRecord {
    pub(crate) fn has_scheduled_retry(&self) -> bool {
        self.timer.is_some() && !self.in_flight
    }

    /// Whether `handle` is still the live timer for this record.
    pub(crate) fn owns(&self, handle: &TimerHandle) -> bool {
        self.timer.as_ref().is_some_and(|t| t.same_timer(handle))
    }

    pub(crate) fn record_attempt(&mut self) {
        self.attempt_count += 1;
        self.last_attempt_at = Some(Utc::now());
        self.last_attempt_instant = Some(Instant::now());
        self.in_flight = true;
    }

    /// Cancel and forget the live timer, if any.
    pub(crate) fn disarm(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.cancel();
        }
        self.in_flight = false;
    }

    pub(crate) fn info(&self, max_attempts: u32) -> RetryInfo {
        RetryInfo {
            attempt_count: self.attempt_count,
            last_attempt_at: self.last_attempt_at,
            has_scheduled_retry: self.has_scheduled_retry(),
            can_retry: self.attempt_count < max_attempts,
        }
    }
}
