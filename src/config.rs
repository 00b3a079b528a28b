//! Store configuration.
//!
//! All knobs have serde defaults so a config file may specify any subset:
//!
//! ```toml
//! [store]
//! watcher_incoming_buffer = 2000
//! shrink_slack = 4096
//! ```

use serde::Deserialize;
use serde::Serialize;
use tracing::warn;

use crate::errors::Error;
use crate::errors::Result;

/// Tunables for a [`MemoryStore`](crate::MemoryStore) instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Buffer size of each watcher's incoming event queue.
    ///
    /// Broadcast never blocks on this queue: when it is full the watcher is
    /// dropped. Larger buffers tolerate longer consumer stalls at ~one event
    /// clone of memory per slot.
    ///
    /// **Default**: 1000
    #[serde(default = "default_watcher_incoming_buffer")]
    pub watcher_incoming_buffer: usize,

    /// Buffer size of each watcher's outgoing result channel.
    ///
    /// Delivery into this channel is consumer-paced (the delivery loop awaits
    /// capacity), so this only smooths bursts.
    ///
    /// **Default**: 100
    #[serde(default = "default_watcher_outgoing_buffer")]
    pub watcher_outgoing_buffer: usize,

    /// Capacity of the recent-event ring buffer kept by the watch hub.
    ///
    /// **Default**: 10000
    #[serde(default = "default_event_cache_capacity")]
    pub event_cache_capacity: usize,

    /// How many tombstone slots the revision list may accumulate above the
    /// live-object count before the periodic shrink pass compacts it.
    ///
    /// **Default**: 1024
    #[serde(default = "default_shrink_slack")]
    pub shrink_slack: u64,

    /// Interval of the background shrink pass, in milliseconds.
    ///
    /// **Default**: 30000
    #[serde(default = "default_shrink_interval_ms")]
    pub shrink_interval_ms: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            watcher_incoming_buffer: default_watcher_incoming_buffer(),
            watcher_outgoing_buffer: default_watcher_outgoing_buffer(),
            event_cache_capacity: default_event_cache_capacity(),
            shrink_slack: default_shrink_slack(),
            shrink_interval_ms: default_shrink_interval_ms(),
        }
    }
}

impl StoreConfig {
    /// Validates configuration parameters.
    pub fn validate(&self) -> Result<()> {
        if self.watcher_incoming_buffer == 0 {
            return Err(Error::internal(
                "watcher_incoming_buffer must be greater than 0",
            ));
        }
        if self.watcher_outgoing_buffer == 0 {
            return Err(Error::internal(
                "watcher_outgoing_buffer must be greater than 0",
            ));
        }
        if self.shrink_interval_ms == 0 {
            return Err(Error::internal("shrink_interval_ms must be greater than 0"));
        }
        if self.event_cache_capacity > 1_000_000 {
            warn!(
                "event_cache_capacity ({}) is very large and may hold significant memory",
                self.event_cache_capacity
            );
        }
        Ok(())
    }
}

const fn default_watcher_incoming_buffer() -> usize {
    1000
}

const fn default_watcher_outgoing_buffer() -> usize {
    100
}

const fn default_event_cache_capacity() -> usize {
    10_000
}

const fn default_shrink_slack() -> u64 {
    1024
}

const fn default_shrink_interval_ms() -> u64 {
    30_000
}
