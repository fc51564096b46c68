//! Hub metrics.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Hub-level counters, shared by the registry, router, and pumps.
#[derive(Debug, Default)]
pub struct HubMetrics {
    /// Connections registered since start
    pub connections_opened: AtomicU64,
    /// Connections unregistered since start
    pub connections_closed: AtomicU64,
    /// Currently registered connections
    pub connections_active: AtomicU64,
    /// Inbound data frames read
    pub frames_received: AtomicU64,
    /// Inbound frames that failed to decode
    pub decode_failures: AtomicU64,
    /// Frames placed on an outbound queue
    pub messages_delivered: AtomicU64,
    /// Recipients refused by the block/friend policy
    pub deliveries_refused: AtomicU64,
    /// Connections dropped for a full outbound queue
    pub overflow_terminations: AtomicU64,
    /// Connections dropped for an unanswered probe
    pub probe_timeouts: AtomicU64,
}

impl HubMetrics {
    /// Create new zeroed metrics
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_connect(&self) {
        self.connections_opened.fetch_add(1, Ordering::Relaxed);
        self.connections_active.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_disconnect(&self) {
        self.connections_closed.fetch_add(1, Ordering::Relaxed);
        self.connections_active.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn record_frame(&self) {
        self.frames_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_decode_failure(&self) {
        self.decode_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_delivered(&self) {
        self.messages_delivered.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_refused(&self) {
        self.deliveries_refused.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_overflow(&self) {
        self.overflow_terminations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_probe_timeout(&self) {
        self.probe_timeouts.fetch_add(1, Ordering::Relaxed);
    }

    /// Get a snapshot of all metrics
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            connections_opened: self.connections_opened.load(Ordering::Relaxed),
            connections_closed: self.connections_closed.load(Ordering::Relaxed),
            connections_active: self.connections_active.load(Ordering::Relaxed),
            frames_received: self.frames_received.load(Ordering::Relaxed),
            decode_failures: self.decode_failures.load(Ordering::Relaxed),
            messages_delivered: self.messages_delivered.load(Ordering::Relaxed),
            deliveries_refused: self.deliveries_refused.load(Ordering::Relaxed),
            overflow_terminations: self.overflow_terminations.load(Ordering::Relaxed),
            probe_timeouts: self.probe_timeouts.load(Ordering::Relaxed),
        }
    }
}

/// Serializable metrics snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub connections_opened: u64,
    pub connections_closed: u64,
    pub connections_active: u64,
    pub frames_received: u64,
    pub decode_failures: u64,
    pub messages_delivered: u64,
    pub deliveries_refused: u64,
    pub overflow_terminations: u64,
    pub probe_timeouts: u64,
}
