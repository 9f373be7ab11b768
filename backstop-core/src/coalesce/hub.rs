//! Named refresh channels for one feature.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Mutex;

use futures::Stream;
use tracing::debug;

use super::coalescer::RefreshCoalescer;
use super::subscription::{Subscription, subscribe};
use crate::utils::lock::lock;
use crate::{ChannelSnapshot, CoalesceConfig};

/// Owns the refresh channels of one feature (e.g. "message-counts",
/// "activity-feed"). Channels are created lazily on first use.
#[derive(Debug)]
pub struct RefreshHub {
    config: CoalesceConfig,
    channels: Mutex<HashMap<String, RefreshCoalescer>>,
}

impl Default for RefreshHub {
    fn default() -> Self {
        Self::new(CoalesceConfig::default())
    }
}

impl RefreshHub {
    pub fn new(config: CoalesceConfig) -> Self {
        Self {
            config,
            channels: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &CoalesceConfig {
        &self.config
    }

    /// The channel named `name`, created with the hub's config if absent.
    ///
    /// A channel closed by its subscription is replaced by a fresh one.
    pub fn channel(&self, name: &str) -> RefreshCoalescer {
        self.channel_with_config(name, self.config.clone())
    }

    /// Like [`channel`](Self::channel), with a per-channel config used only
    /// when the channel has to be created.
    pub fn channel_with_config(&self, name: &str, config: CoalesceConfig) -> RefreshCoalescer {
        let mut channels = lock(&self.channels);
        if let Some(existing) = channels.get(name)
            && !existing.is_closed()
        {
            return existing.clone();
        }
        debug!(channel = name, "Refresh channel created");
        let coalescer = RefreshCoalescer::new(name, config);
        channels.insert(name.to_string(), coalescer.clone());
        coalescer
    }

    /// Subscribe `fetch` to `notifications` on the channel `name`.
    pub fn subscribe<S, F, Fut>(&self, name: &str, notifications: S, fetch: F) -> Subscription
    where
        S: Stream + Send + 'static,
        S::Item: Send,
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        subscribe(self.channel(name), notifications, fetch)
    }

    /// Close and forget one channel. Returns whether it existed.
    pub fn close_channel(&self, name: &str) -> bool {
        let removed = lock(&self.channels).remove(name);
        match removed {
            Some(coalescer) => {
                coalescer.close();
                true
            }
            None => false,
        }
    }

    /// Close every channel; teardown for the owning feature.
    pub fn close_all(&self) {
        let drained: Vec<RefreshCoalescer> =
            lock(&self.channels).drain().map(|(_, c)| c).collect();
        for coalescer in drained {
            coalescer.close();
        }
    }

    /// Names of open channels, sorted.
    pub fn channel_names(&self) -> Vec<String> {
        let mut names: Vec<String> = lock(&self.channels)
            .iter()
            .filter(|(_, c)| !c.is_closed())
            .map(|(name, _)| name.clone())
            .collect();
        names.sort();
        names
    }

    pub fn snapshots(&self) -> Vec<ChannelSnapshot> {
        let mut snapshots: Vec<ChannelSnapshot> = lock(&self.channels)
            .values()
            .map(RefreshCoalescer::snapshot)
            .collect();
        snapshots.sort_by(|a, b| a.channel.cmp(&b.channel));
        snapshots
    }
}

impl Drop for RefreshHub {
    fn drop(&mut self) {
        self.close_all();
    }
}
