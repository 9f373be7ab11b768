//! Read-only introspection snapshots.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Snapshot of one retry key's bookkeeping.
///
/// A key with no record reports the fresh state: zero attempts and nothing
/// scheduled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryInfo {
    /// Attempts already made in the current sequence.
    pub attempt_count: u32,
    /// Wall-clock time of the most recent attempt.
    pub last_attempt_at: Option<DateTime<Utc>>,
    /// Whether a retry timer is armed and has not fired yet.
    pub has_scheduled_retry: bool,
    /// Whether the attempt budget still allows another try.
    pub can_retry: bool,
}

impl RetryInfo {
    pub fn fresh(max_attempts: u32) -> Self {
        Self {
            attempt_count: 0,
            last_attempt_at: None,
            has_scheduled_retry: false,
            can_retry: max_attempts > 0,
        }
    }
}

/// Lifecycle phase of a refresh channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelPhase {
    /// No refresh pending.
    Idle,
    /// A refresh timer is pending.
    Armed,
    /// The owning subscription closed the channel.
    Closed,
}

/// Snapshot of one refresh channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelSnapshot {
    pub channel: String,
    pub phase: ChannelPhase,
    pub last_fire_at: Option<DateTime<Utc>>,
    pub fire_count: u64,
}
