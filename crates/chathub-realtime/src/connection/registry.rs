//! Hub registry: the authoritative index of live connections.

use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio::sync::Notify;
use tracing::{debug, error, warn};

use chathub_core::types::{ConnectionId, UserId};

use super::handle::{ClientHandle, CloseReason, EnqueueError};
use crate::message::OutboundFrame;
use crate::metrics::HubMetrics;

/// Outcome of [`HubRegistry::register`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registration {
    /// The user had no other live connection.
    FirstConnection,
    /// The user was already online on another connection.
    AdditionalConnection,
    /// The handle was already registered. Nothing changed.
    Duplicate,
}

/// A connection that left the registry.
#[derive(Debug, Clone)]
pub struct Departure {
    pub handle: Arc<ClientHandle>,
    /// The user has no live connections left.
    pub last_connection: bool,
}

/// Outcome of delivering one frame to one handle.
#[derive(Debug)]
pub enum Delivery {
    /// The frame is on the queue.
    Enqueued,
    /// The queue was full; the connection was terminated and removed.
    Overflowed(Option<Departure>),
    /// The connection was already terminating.
    Closed(Option<Departure>),
}

impl Delivery {
    /// The departure this delivery caused, if any.
    pub fn into_departure(self) -> Option<Departure> {
        match self {
            Self::Enqueued => None,
            Self::Overflowed(departure) | Self::Closed(departure) => departure,
        }
    }
}

/// Result of fanning one frame out to many handles.
#[derive(Debug, Default)]
pub struct FanOut {
    pub delivered: usize,
    pub departures: Vec<Departure>,
}

/// Thread-safe index of live connections by id and by user.
///
/// Map guards are never held while enqueueing: fan-out takes a snapshot
/// of the handles first.
#[derive(Debug)]
pub struct HubRegistry {
    /// Connection ID → handle.
    by_id: DashMap<ConnectionId, Arc<ClientHandle>>,
    /// User ID → that user's live handles. An entry exists iff the user is online.
    by_user: DashMap<UserId, Vec<Arc<ClientHandle>>>,
    metrics: Arc<HubMetrics>,
    drained: Notify,
}

impl HubRegistry {
    pub fn new(metrics: Arc<HubMetrics>) -> Self {
        Self {
            by_id: DashMap::new(),
            by_user: DashMap::new(),
            metrics,
            drained: Notify::new(),
        }
    }

    /// Add a handle under its id and its user.
    ///
    /// The `by_id` slot stays locked until the handle is also in `by_user`,
    /// so no snapshot can see (and evict) a half-registered handle.
    pub fn register(&self, handle: Arc<ClientHandle>) -> Registration {
        let _slot = match self.by_id.entry(handle.id()) {
            Entry::Occupied(_) => {
                error!(
                    conn_id = %handle.id(),
                    user_id = %handle.user_id(),
                    "Connection registered twice"
                );
                return Registration::Duplicate;
            }
            Entry::Vacant(slot) => slot.insert(handle.clone()),
        };

        let first = {
            let mut handles = self.by_user.entry(handle.user_id()).or_default();
            let first = handles.is_empty();
            handles.push(handle);
            first
        };

        self.metrics.record_connect();
        if first {
            Registration::FirstConnection
        } else {
            Registration::AdditionalConnection
        }
    }

    /// Remove a connection and terminate it. Only the first call for a
    /// given id has an effect.
    ///
    /// A connection that was still running ends with
    /// [`CloseReason::Unregistered`]; one already terminating keeps its
    /// original reason.
    pub fn unregister(&self, id: &ConnectionId) -> Option<Departure> {
        let (_, handle) = self.by_id.remove(id)?;
        let user_id = handle.user_id();
        handle.terminate(CloseReason::Unregistered);

        if let Some(mut handles) = self.by_user.get_mut(&user_id) {
            handles.retain(|h| h.id() != *id);
        }
        let last_connection = self
            .by_user
            .remove_if(&user_id, |_, handles| handles.is_empty())
            .is_some();

        self.metrics.record_disconnect();
        if self.by_id.is_empty() {
            self.drained.notify_waiters();
        }

        debug!(conn_id = %id, user_id = %user_id, last_connection, "Connection unregistered");
        Some(Departure {
            handle,
            last_connection,
        })
    }

    /// Snapshot of a user's live handles. Empty when the user is offline.
    pub fn lookup(&self, user_id: &UserId) -> Vec<Arc<ClientHandle>> {
        self.by_user
            .get(user_id)
            .map(|entry| entry.value().clone())
            .unwrap_or_default()
    }

    pub fn get(&self, id: &ConnectionId) -> Option<Arc<ClientHandle>> {
        self.by_id.get(id).map(|entry| entry.value().clone())
    }

    pub fn is_online(&self, user_id: &UserId) -> bool {
        self.by_user.contains_key(user_id)
    }

    /// Snapshot of every online user.
    pub fn online_users(&self) -> Vec<UserId> {
        self.by_user.iter().map(|entry| *entry.key()).collect()
    }

    /// Snapshot of every live handle.
    pub fn all_connections(&self) -> Vec<Arc<ClientHandle>> {
        self.by_id.iter().map(|entry| entry.value().clone()).collect()
    }

    pub fn connection_count(&self) -> usize {
        self.by_id.len()
    }

    pub fn user_count(&self) -> usize {
        self.by_user.len()
    }

    /// Enqueue a frame on one handle, evicting it if its queue is full.
    ///
    /// Eviction happens before this returns, so a fan-out that overflows a
    /// connection leaves the registry without it.
    pub fn deliver(&self, handle: &Arc<ClientHandle>, frame: OutboundFrame) -> Delivery {
        match handle.try_enqueue(frame) {
            Ok(()) => {
                self.metrics.record_delivered();
                Delivery::Enqueued
            }
            Err(EnqueueError::Full) => {
                if handle.terminate(CloseReason::Overflow) {
                    self.metrics.record_overflow();
                    warn!(
                        conn_id = %handle.id(),
                        user_id = %handle.user_id(),
                        "Outbound queue full, disconnecting slow client"
                    );
                }
                Delivery::Overflowed(self.unregister(&handle.id()))
            }
            Err(EnqueueError::Closed) => Delivery::Closed(self.unregister(&handle.id())),
        }
    }

    /// Enqueue a frame on every live handle except `excluding`.
    pub fn broadcast_all(&self, frame: OutboundFrame, excluding: Option<ConnectionId>) -> FanOut {
        let mut fan_out = FanOut::default();
        for handle in self.all_connections() {
            if Some(handle.id()) == excluding {
                continue;
            }
            match self.deliver(&handle, frame.clone()) {
                Delivery::Enqueued => fan_out.delivered += 1,
                other => fan_out.departures.extend(other.into_departure()),
            }
        }
        fan_out
    }

    /// Wait until no connections remain.
    pub async fn drained(&self) {
        loop {
            let notified = self.drained.notified();
            if self.by_id.is_empty() {
                return;
            }
            notified.await;
        }
    }
}
