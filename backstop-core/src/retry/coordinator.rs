//! Per-key retry coordination.
//!
//! Each key runs an explicit state machine: one spawned task per attempt
//! sleeps for the backoff delay, records the attempt, runs the operation and
//! either reports the outcome or arms the next attempt from its failure
//! branch. Per key, attempt `n + 1` is only armed after attempt `n` resolved,
//! so a key never has two operations in flight.
//!
//! ```rust,ignore
//! use backstop_core::retry::{RetryCallbacks, RetryCoordinator};
//! use backstop_core::{OperationError, RetryConfig};
//!
//! let approvals = RetryCoordinator::new(RetryConfig::default());
//! approvals.schedule_retry(
//!     item_id,
//!     move || api.approve(item_id),
//!     RetryCallbacks::new()
//!         .on_success(|_| tracing::info!("approved"))
//!         .on_failure(|e| tracing::warn!(error = %e, "approve failed")),
//! );
//! ```

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::hash::Hash;
use std::sync::{Arc, Mutex, PoisonError, Weak};
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt};
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use super::backoff::{BackoffSchedule, JitterSource};
use super::callbacks::RetryCallbacks;
use super::record::RetryRecord;
use crate::utils::TimerHandle;
use crate::utils::lock::lock;
use crate::utils::timer::Generations;
use crate::{AttemptFailure, ErrorCategory, HasStatus, RetryConfig, RetryError, RetryInfo};

/// Bounds required of a retry key.
pub trait RetryKey: Eq + Hash + Clone + fmt::Debug + Send + Sync + 'static {}

impl<T> RetryKey for T where T: Eq + Hash + Clone + fmt::Debug + Send + Sync + 'static {}

type BoxedOperation<T, E> = Arc<dyn Fn() -> BoxFuture<'static, Result<T, E>> + Send + Sync>;

/// One logical unit of work travelling through its retry sequence.
struct Attempt<K, T, E> {
    key: K,
    operation: BoxedOperation<T, E>,
    callbacks: RetryCallbacks<T, E>,
}

enum Verdict<E> {
    Retry(AttemptFailure<E>),
    Reject(E),
    Exhaust(AttemptFailure<E>),
}

/// Coordinates bounded, backed-off retries keyed by caller-defined ids.
///
/// Construct one instance per feature. Clones share state. Dropping the
/// last clone cancels every pending retry.
pub struct RetryCoordinator<K: RetryKey> {
    inner: Arc<Inner<K>>,
}

struct Inner<K> {
    config: RetryConfig,
    backoff: BackoffSchedule,
    records: Mutex<HashMap<K, RetryRecord>>,
    generations: Generations,
}

impl<K: RetryKey> Clone for RetryCoordinator<K> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<K: RetryKey> fmt::Debug for RetryCoordinator<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryCoordinator")
            .field("config", &self.inner.config)
            .field("active_keys", &self.len())
            .finish()
    }
}

impl<K: RetryKey> RetryCoordinator<K> {
    /// Create a coordinator with thread-RNG jitter.
    pub fn new(config: RetryConfig) -> Self {
        let backoff = BackoffSchedule::new(&config);
        Self::with_backoff(config, backoff)
    }

    /// Create a coordinator with an injected jitter source.
    pub fn with_jitter(config: RetryConfig, jitter: Arc<dyn JitterSource>) -> Self {
        let backoff = BackoffSchedule::new(&config).with_jitter(jitter);
        Self::with_backoff(config, backoff)
    }

    fn with_backoff(config: RetryConfig, backoff: BackoffSchedule) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                backoff,
                records: Mutex::new(HashMap::new()),
                generations: Generations::default(),
            }),
        }
    }

    pub fn config(&self) -> &RetryConfig {
        &self.inner.config
    }

    pub fn backoff(&self) -> &BackoffSchedule {
        &self.inner.backoff
    }

    /// Schedule `operation` for `key` after the next backoff delay.
    ///
    /// `operation` is re-invoked in full on every attempt and must tolerate
    /// that. Scheduling while a retry is pending (or running) for `key`
    /// cancels it and takes its place. If the key's budget is already spent,
    /// `on_failure` receives [`RetryError::Exhausted`] immediately and
    /// nothing is scheduled.
    pub fn schedule_retry<T, E, F, Fut>(
        &self,
        key: K,
        operation: F,
        callbacks: RetryCallbacks<T, E>,
    ) where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: HasStatus + fmt::Debug + Send + 'static,
    {
        let operation: BoxedOperation<T, E> = Arc::new(move || operation().boxed());
        self.inner.schedule(Attempt {
            key,
            operation,
            callbacks,
        });
    }

    /// Awaitable form of [`schedule_retry`](Self::schedule_retry).
    ///
    /// Resolves with the sequence's single outcome, or
    /// [`RetryError::Cancelled`] if the key was cancelled or replaced first.
    pub async fn run<T, E, F, Fut>(&self, key: K, operation: F) -> Result<T, RetryError<E>>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: HasStatus + fmt::Debug + Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        self.schedule_retry(
            key,
            operation,
            RetryCallbacks::on_complete(move |outcome| {
                let _ = tx.send(outcome);
            }),
        );
        rx.await.unwrap_or(Err(RetryError::Cancelled))
    }

    /// Cancel any pending retry and forget the key's bookkeeping. No-op for
    /// unknown keys. A running attempt is dropped without invoking callbacks.
    pub fn cancel_retry(&self, key: &K) {
        let removed = lock(&self.inner.records).remove(key);
        if let Some(mut record) = removed {
            record.disarm();
            debug!(key = ?key, attempts = record.attempt_count, "Retry cancelled");
        }
    }

    /// Cancel every pending retry across all keys.
    pub fn clear_all_retries(&self) {
        let drained: Vec<(K, RetryRecord)> = lock(&self.inner.records).drain().collect();
        for (_, mut record) in drained {
            record.disarm();
        }
    }

    /// Teardown hook for the owning feature.
    pub fn cleanup(&self) {
        let active = self.len();
        self.clear_all_retries();
        debug!(cancelled = active, "Retry coordinator cleaned up");
    }

    /// Whether another attempt for `key` may run now after `error`.
    ///
    /// False for client-fault errors, false once the budget is spent, and
    /// otherwise true only when the last attempt is at least the shortest
    /// possible backoff delay in the past.
    pub fn should_retry<E: HasStatus + ?Sized>(&self, key: &K, error: &E) -> bool {
        if error.category() == ErrorCategory::Client {
            return false;
        }
        let records = lock(&self.inner.records);
        let Some(record) = records.get(key) else {
            return self.inner.config.max_attempts > 0;
        };
        if record.attempt_count >= self.inner.config.max_attempts {
            return false;
        }
        match record.last_attempt_instant {
            Some(at) => at.elapsed() >= self.inner.backoff.earliest(record.attempt_count),
            None => true,
        }
    }

    /// Read-only snapshot of `key`'s bookkeeping.
    pub fn retry_info(&self, key: &K) -> RetryInfo {
        let max_attempts = self.inner.config.max_attempts;
        lock(&self.inner.records)
            .get(key)
            .map(|record| record.info(max_attempts))
            .unwrap_or_else(|| RetryInfo::fresh(max_attempts))
    }

    /// Keys that currently hold bookkeeping.
    pub fn active_keys(&self) -> Vec<K> {
        lock(&self.inner.records).keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        lock(&self.inner.records).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<K: RetryKey> Inner<K> {
    fn schedule<T, E>(self: &Arc<Self>, attempt: Attempt<K, T, E>)
    where
        T: Send + 'static,
        E: HasStatus + fmt::Debug + Send + 'static,
    {
        let mut records = lock(&self.records);
        let record = records.entry(attempt.key.clone()).or_default();

        if record.attempt_count >= self.config.max_attempts {
            let attempts = record.attempt_count;
            if let Some(mut record) = records.remove(&attempt.key) {
                record.disarm();
            }
            drop(records);
            warn!(key = ?attempt.key, attempts, "Retry budget already spent, not scheduling");
            attempt.callbacks.fail(RetryError::Exhausted {
                attempts,
                last_error: None,
            });
            return;
        }

        if record.timer.is_some() {
            debug!(key = ?attempt.key, "Replacing pending retry");
        }
        record.disarm();
        let (handle, delay) = self.arm(record);
        let next = record.attempt_count + 1;
        drop(records);

        debug!(
            key = ?attempt.key,
            attempt = next,
            delay_ms = delay.as_millis() as u64,
            "Retry scheduled"
        );
        self.spawn_attempt(attempt, handle, delay);
    }

    fn arm(&self, record: &mut RetryRecord) -> (TimerHandle, Duration) {
        let delay = self.backoff.delay_for(record.attempt_count);
        let handle = self.generations.next_handle();
        record.timer = Some(handle.clone());
        record.in_flight = false;
        (handle, delay)
    }

    fn spawn_attempt<T, E>(
        self: &Arc<Self>,
        attempt: Attempt<K, T, E>,
        handle: TimerHandle,
        delay: Duration,
    ) where
        T: Send + 'static,
        E: HasStatus + fmt::Debug + Send + 'static,
    {
        tokio::spawn(run_attempt(Arc::downgrade(self), attempt, handle, delay));
    }

    fn judge<E: HasStatus>(&self, attempts: u32, failure: AttemptFailure<E>) -> Verdict<E> {
        match failure {
            AttemptFailure::Operation(error) if error.category() == ErrorCategory::Client => {
                Verdict::Reject(error)
            }
            failure if attempts >= self.config.max_attempts => Verdict::Exhaust(failure),
            failure => Verdict::Retry(failure),
        }
    }

    fn finish<T, E>(
        self: &Arc<Self>,
        attempt: Attempt<K, T, E>,
        handle: TimerHandle,
        outcome: Result<T, AttemptFailure<E>>,
    ) where
        T: Send + 'static,
        E: HasStatus + fmt::Debug + Send + 'static,
    {
        let mut records = lock(&self.records);
        let Some(record) = records.get_mut(&attempt.key) else {
            return;
        };
        if !record.owns(&handle) {
            return;
        }
        let attempts = record.attempt_count;

        let failure = match outcome {
            Ok(value) => {
                records.remove(&attempt.key);
                drop(records);
                info!(key = ?attempt.key, attempts, "Retry sequence succeeded");
                attempt.callbacks.succeed(value);
                return;
            }
            Err(failure) => failure,
        };

        match self.judge(attempts, failure) {
            Verdict::Retry(failure) => {
                let (next, delay) = self.arm(record);
                drop(records);
                debug!(
                    key = ?attempt.key,
                    attempt = attempts + 1,
                    delay_ms = delay.as_millis() as u64,
                    error = ?failure,
                    "Attempt failed, retrying"
                );
                self.spawn_attempt(attempt, next, delay);
            }
            Verdict::Reject(error) => {
                records.remove(&attempt.key);
                drop(records);
                info!(key = ?attempt.key, attempts, error = ?error, "Non-retryable failure");
                attempt.callbacks.fail(RetryError::Rejected(error));
            }
            Verdict::Exhaust(failure) => {
                records.remove(&attempt.key);
                drop(records);
                warn!(key = ?attempt.key, attempts, error = ?failure, "Retry attempts exhausted");
                attempt.callbacks.fail(RetryError::Exhausted {
                    attempts,
                    last_error: Some(failure),
                });
            }
        }
    }
}

impl<K> Drop for Inner<K> {
    fn drop(&mut self) {
        let records = self
            .records
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner);
        for record in records.values_mut() {
            record.disarm();
        }
    }
}

/// Body of one attempt task: wait, record, run, hand the outcome back.
///
/// The task holds only a weak reference while sleeping and while the
/// operation runs, so a dropped coordinator never keeps timers alive.
async fn run_attempt<K, T, E>(
    inner: Weak<Inner<K>>,
    attempt: Attempt<K, T, E>,
    handle: TimerHandle,
    delay: Duration,
) where
    K: RetryKey,
    T: Send + 'static,
    E: HasStatus + fmt::Debug + Send + 'static,
{
    if !handle.sleep(delay).await {
        return;
    }

    let (attempt_number, timeout) = {
        let Some(inner) = inner.upgrade() else {
            return;
        };
        let mut records = lock(&inner.records);
        let Some(record) = records.get_mut(&attempt.key).filter(|r| r.owns(&handle)) else {
            return;
        };
        record.record_attempt();
        (record.attempt_count, inner.config.attempt_timeout)
    };

    debug!(key = ?attempt.key, attempt = attempt_number, "Running attempt");
    let call = (attempt.operation)();
    let outcome = match timeout {
        Some(limit) => handle
            .cancel_handle()
            .run(tokio::time::timeout(limit, call))
            .await
            .map(|res| match res {
                Ok(result) => result.map_err(AttemptFailure::Operation),
                Err(_) => Err(AttemptFailure::TimedOut(limit)),
            }),
        None => handle
            .cancel_handle()
            .run(call)
            .await
            .map(|result| result.map_err(AttemptFailure::Operation)),
    };

    let Some(outcome) = outcome else {
        debug!(key = ?attempt.key, attempt = attempt_number, "Attempt cancelled in flight");
        return;
    };
    if let Some(inner) = inner.upgrade() {
        inner.finish(attempt, handle, outcome);
    }
}
