//! Real-time hub configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Connection hub and pump settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RealtimeConfig {
    /// Capacity of each connection's outbound queue. A connection whose
    /// queue fills up is disconnected.
    #[serde(default = "default_queue_capacity")]
    pub outbound_queue_capacity: usize,
    /// Idle interval after which a liveness probe is written, in seconds.
    #[serde(default = "default_ping_interval")]
    pub ping_interval_seconds: u64,
    /// Time allowed for the probe acknowledgement, in seconds.
    #[serde(default = "default_ping_timeout")]
    pub ping_timeout_seconds: u64,
    /// Upper bound on a single transport write, in seconds.
    #[serde(default = "default_write_timeout")]
    pub write_timeout_seconds: u64,
    /// Largest accepted inbound text frame, in bytes.
    #[serde(default = "default_max_frame_bytes")]
    pub max_frame_bytes: usize,
    /// Emit online/offline system messages when a user's first connection
    /// opens or last connection closes.
    #[serde(default = "default_true")]
    pub broadcast_presence: bool,
    /// Require a friendship for direct and group delivery.
    #[serde(default)]
    pub direct_requires_friendship: bool,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            outbound_queue_capacity: default_queue_capacity(),
            ping_interval_seconds: default_ping_interval(),
            ping_timeout_seconds: default_ping_timeout(),
            write_timeout_seconds: default_write_timeout(),
            max_frame_bytes: default_max_frame_bytes(),
            broadcast_presence: true,
            direct_requires_friendship: false,
        }
    }
}

impl RealtimeConfig {
    /// Probe interval as a [`Duration`].
    pub fn ping_interval(&self) -> Duration {
        Duration::from_secs(self.ping_interval_seconds)
    }

    /// Probe acknowledgement timeout as a [`Duration`].
    pub fn ping_timeout(&self) -> Duration {
        Duration::from_secs(self.ping_timeout_seconds)
    }

    /// Transport write timeout as a [`Duration`].
    pub fn write_timeout(&self) -> Duration {
        Duration::from_secs(self.write_timeout_seconds)
    }
}

fn default_queue_capacity() -> usize {
    256
}

fn default_ping_interval() -> u64 {
    30
}

fn default_ping_timeout() -> u64 {
    10
}

fn default_write_timeout() -> u64 {
    10
}

fn default_max_frame_bytes() -> usize {
    64 * 1024
}

fn default_true() -> bool {
    true
}
