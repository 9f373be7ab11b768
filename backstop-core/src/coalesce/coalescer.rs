//! Refresh coalescer for a single channel.
//!
//! Debounce with a hard floor and a max-wait cap:
//!
//! ```text
//! elapsed = now - last_fire_at            (∞ if never fired)
//! wait    = delay                          if elapsed >= min_interval
//!         = max(delay, min_interval - elapsed)   otherwise
//! wait    = min(wait, armed_at + max(delay, min_interval) - now)
//! ```
//!
//! Every call cancels the pending timer and arms a new one, so only the
//! most recently supplied fetch can run. `armed_at` is the moment an idle
//! channel was armed; the cap keeps a sustained burst from postponing the
//! refresh forever. Since `armed_at >= last_fire_at`, the cap never breaks
//! the floor.
//!
//! `last_fire_at` is stamped when a fetch actually starts, after any earlier
//! fetch on the channel has finished, so the floor spaces fetch starts.

use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError, Weak};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::time::Instant;
use tracing::debug;

use crate::utils::TimerHandle;
use crate::utils::lock::lock;
use crate::utils::timer::Generations;
use crate::{ChannelPhase, ChannelSnapshot, CoalesceConfig};

/// Collapses bursts of change notifications into rate-limited refreshes.
///
/// Clones share the same channel.
#[derive(Clone)]
pub struct RefreshCoalescer {
    inner: Arc<ChannelInner>,
}

struct ChannelInner {
    channel: String,
    config: CoalesceConfig,
    state: Mutex<ChannelState>,
    // Held for the duration of a fetch so fetches on one channel never overlap.
    fetch_gate: tokio::sync::Mutex<()>,
    generations: Generations,
}

#[derive(Debug, Default)]
struct ChannelState {
    last_fire_at: Option<Instant>,
    last_fire_wall: Option<DateTime<Utc>>,
    armed_at: Option<Instant>,
    pending: Option<TimerHandle>,
    fire_count: u64,
    closed: bool,
}

impl ChannelState {
    fn wait_for(&self, now: Instant, delay: Duration, config: &CoalesceConfig) -> Duration {
        let floored = match self.last_fire_at {
            Some(at) => {
                let elapsed = now.saturating_duration_since(at);
                if elapsed >= config.min_interval {
                    delay
                } else {
                    delay.max(config.min_interval - elapsed)
                }
            }
            None => delay,
        };
        let deadline = self
            .armed_at
            .and_then(|armed_at| armed_at.checked_add(config.max_wait(delay)));
        match deadline {
            Some(deadline) => floored.min(deadline.saturating_duration_since(now)),
            None => floored,
        }
    }

    fn phase(&self) -> ChannelPhase {
        if self.closed {
            ChannelPhase::Closed
        } else if self.pending.is_some() {
            ChannelPhase::Armed
        } else {
            ChannelPhase::Idle
        }
    }

    fn disarm(&mut self) {
        if let Some(pending) = self.pending.take() {
            pending.cancel();
        }
        self.armed_at = None;
    }
}

impl fmt::Debug for RefreshCoalescer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RefreshCoalescer")
            .field("channel", &self.inner.channel)
            .field("config", &self.inner.config)
            .field("phase", &self.phase())
            .finish()
    }
}

impl RefreshCoalescer {
    pub fn new(channel: impl Into<String>, config: CoalesceConfig) -> Self {
        Self {
            inner: Arc::new(ChannelInner {
                channel: channel.into(),
                config,
                state: Mutex::new(ChannelState::default()),
                fetch_gate: tokio::sync::Mutex::new(()),
                generations: Generations::default(),
            }),
        }
    }

    pub fn channel(&self) -> &str {
        &self.inner.channel
    }

    pub fn config(&self) -> &CoalesceConfig {
        &self.inner.config
    }

    /// Schedule a refresh with the configured quiet period. Call once per
    /// incoming notification.
    pub fn schedule_refresh<F, Fut>(&self, fetch: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.schedule_refresh_with_delay(fetch, self.inner.config.quiet_period);
    }

    /// Schedule a refresh with an explicit debounce delay.
    ///
    /// Replaces any pending refresh on this channel; the replaced `fetch`
    /// is dropped without running. Ignored once the channel is closed.
    pub fn schedule_refresh_with_delay<F, Fut>(&self, fetch: F, delay: Duration)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let now = Instant::now();
        let mut state = lock(&self.inner.state);
        if state.closed {
            drop(state);
            debug!(channel = %self.inner.channel, "Refresh ignored, channel closed");
            return;
        }

        let wait = state.wait_for(now, delay, &self.inner.config);
        if let Some(pending) = state.pending.take() {
            pending.cancel();
        }
        state.armed_at.get_or_insert(now);
        let handle = self.inner.generations.next_handle();
        state.pending = Some(handle.clone());
        drop(state);

        debug!(
            channel = %self.inner.channel,
            wait_ms = wait.as_millis() as u64,
            "Refresh armed"
        );
        tokio::spawn(fire(Arc::downgrade(&self.inner), handle, wait, fetch));
    }

    /// Tear the channel down: cancel any pending refresh and ignore all
    /// later schedules. Idempotent.
    pub fn close(&self) {
        let mut state = lock(&self.inner.state);
        if state.closed {
            return;
        }
        state.closed = true;
        state.disarm();
        drop(state);
        debug!(channel = %self.inner.channel, "Refresh channel closed");
    }

    pub fn is_closed(&self) -> bool {
        lock(&self.inner.state).closed
    }

    pub fn is_armed(&self) -> bool {
        self.phase() == ChannelPhase::Armed
    }

    pub fn phase(&self) -> ChannelPhase {
        lock(&self.inner.state).phase()
    }

    pub fn fire_count(&self) -> u64 {
        lock(&self.inner.state).fire_count
    }

    pub fn snapshot(&self) -> ChannelSnapshot {
        let state = lock(&self.inner.state);
        ChannelSnapshot {
            channel: self.inner.channel.clone(),
            phase: state.phase(),
            last_fire_at: state.last_fire_wall,
            fire_count: state.fire_count,
        }
    }
}

impl Drop for ChannelInner {
    fn drop(&mut self) {
        self.state
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .disarm();
    }
}

async fn fire<F, Fut>(
    inner: Weak<ChannelInner>,
    handle: TimerHandle,
    wait: Duration,
    fetch: F,
) where
    F: FnOnce() -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    if !handle.sleep(wait).await {
        return;
    }
    let Some(inner) = inner.upgrade() else {
        return;
    };

    // The timer stays armed while an earlier fetch holds the gate, so a
    // later schedule or `close` can still retire it.
    let Some(_gate) = handle.cancel_handle().run(inner.fetch_gate.lock()).await else {
        return;
    };
    let fire_count = {
        let mut state = lock(&inner.state);
        let live = state
            .pending
            .as_ref()
            .is_some_and(|pending| pending.same_timer(&handle));
        if state.closed || !live {
            return;
        }
        state.pending = None;
        state.armed_at = None;
        state.last_fire_at = Some(Instant::now());
        state.last_fire_wall = Some(Utc::now());
        state.fire_count += 1;
        state.fire_count
    };

    debug!(channel = %inner.channel, fire_count, "Refresh fired");
    fetch().await;
}
