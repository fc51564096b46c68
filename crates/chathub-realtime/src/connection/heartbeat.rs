//! Liveness probing for idle connections.
//!
//! The outbound worker owns one [`LivenessProbe`] and feeds it clock ticks,
//! outbound writes, and probe acknowledgements. The probe only decides; the
//! worker performs the transport writes.

use std::time::Duration;

use tokio::time::Instant;

use chathub_core::config::RealtimeConfig;

/// Smallest accepted probe interval.
const MIN_INTERVAL: Duration = Duration::from_millis(10);

/// Heartbeat configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeartbeatConfig {
    /// Idle time before a probe is sent
    pub ping_interval: Duration,
    /// Time allowed for the acknowledgement
    pub ping_timeout: Duration,
}

impl From<&RealtimeConfig> for HeartbeatConfig {
    fn from(config: &RealtimeConfig) -> Self {
        Self {
            ping_interval: config.ping_interval().max(MIN_INTERVAL),
            ping_timeout: config.ping_timeout(),
        }
    }
}

/// What the worker should do after a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeAction {
    /// The connection was busy or a probe is already outstanding.
    Wait,
    /// Write a probe now.
    SendProbe,
}

/// Idle detection and probe deadline for one connection.
#[derive(Debug)]
pub struct LivenessProbe {
    config: HeartbeatConfig,
    active_since_tick: bool,
    deadline: Option<Instant>,
}

impl LivenessProbe {
    pub fn new(config: HeartbeatConfig) -> Self {
        Self {
            config,
            active_since_tick: false,
            deadline: None,
        }
    }

    /// A frame was written to the client.
    pub fn record_traffic(&mut self) {
        self.active_since_tick = true;
    }

    /// The interval elapsed. Sends a probe when the connection was idle for
    /// the whole interval and no probe is outstanding.
    pub fn on_tick(&mut self, now: Instant) -> ProbeAction {
        let was_active = std::mem::replace(&mut self.active_since_tick, false);
        if was_active || self.deadline.is_some() {
            return ProbeAction::Wait;
        }
        self.deadline = Some(now + self.config.ping_timeout);
        ProbeAction::SendProbe
    }

    /// The client answered. Clears the outstanding probe.
    pub fn acknowledge(&mut self) {
        self.deadline = None;
    }

    /// When the outstanding probe expires.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn is_awaiting_ack(&self) -> bool {
        self.deadline.is_some()
    }
}
