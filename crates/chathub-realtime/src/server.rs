//! Top-level chat hub that ties together the registry, router, presence,
//! and connection pumps.

use std::collections::VecDeque;
use std::fmt::Display;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use futures::{Sink, Stream};
use tracing::{debug, info, warn};

use chathub_core::config::RealtimeConfig;
use chathub_core::result::AppResult;
use chathub_core::traits::RelationshipDirectory;
use chathub_core::types::{ConnectionId, UserId};

use crate::connection::handle::{ClientHandle, CloseReason, OutboundQueue};
use crate::connection::pump::{ConnectionPump, PumpSettings};
use crate::connection::registry::{Departure, HubRegistry, Registration};
use crate::message::{DecodeError, Envelope, Frame, InboundMessage, OutboundMessage};
use crate::message::{decode_inbound, encode_outbound};
use crate::metrics::{HubMetrics, MetricsSnapshot};
use crate::presence::PresenceTracker;
use crate::routing::{DeliveryPolicy, MessageRouter};

/// Central chat hub. Cheap to clone; all clones share state.
#[derive(Clone)]
pub struct ChatHub {
    /// Live connections.
    pub registry: Arc<HubRegistry>,
    /// Envelope routing.
    pub router: Arc<MessageRouter>,
    /// Online-since bookkeeping.
    pub presence: Arc<PresenceTracker>,
    /// Metrics collector.
    pub metrics: Arc<HubMetrics>,
    config: Arc<RealtimeConfig>,
    /// Serializes online/offline transitions and their notices.
    presence_gate: Arc<Mutex<()>>,
}

impl std::fmt::Debug for ChatHub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatHub")
            .field("connections", &self.registry.connection_count())
            .finish()
    }
}

impl ChatHub {
    /// Creates a hub that authorizes deliveries against `directory`.
    pub fn new(config: RealtimeConfig, directory: Arc<dyn RelationshipDirectory>) -> Self {
        let metrics = Arc::new(HubMetrics::new());
        let registry = Arc::new(HubRegistry::new(metrics.clone()));
        let policy = DeliveryPolicy::new(directory, config.direct_requires_friendship);
        let router = Arc::new(MessageRouter::new(registry.clone(), policy, metrics.clone()));

        info!(
            queue_capacity = config.outbound_queue_capacity,
            ping_interval = config.ping_interval_seconds,
            broadcast_presence = config.broadcast_presence,
            "Chat hub initialized"
        );

        Self {
            registry,
            router,
            presence: Arc::new(PresenceTracker::new()),
            metrics,
            config: Arc::new(config),
            presence_gate: Arc::new(Mutex::new(())),
        }
    }

    pub fn config(&self) -> &RealtimeConfig {
        &self.config
    }

    pub(crate) fn pump_settings(&self) -> PumpSettings {
        PumpSettings::from(self.config.as_ref())
    }

    fn presence_gate(&self) -> MutexGuard<'_, ()> {
        self.presence_gate.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Register a new connection for an authenticated user.
    ///
    /// The returned queue already holds the `connected` greeting. The
    /// user's first connection is announced to everyone else.
    pub fn connect(&self, user_id: UserId) -> (Arc<ClientHandle>, OutboundQueue) {
        let (handle, queue) = ClientHandle::new(user_id, self.config.outbound_queue_capacity);

        let greeting = OutboundMessage::Connected {
            connection_id: handle.id(),
            user_id,
        };
        match encode_outbound(&greeting) {
            Ok(frame) => {
                // Fresh queue with capacity >= 1.
                let _ = handle.try_enqueue(frame);
            }
            Err(e) => warn!(conn_id = %handle.id(), error = %e, "Failed to encode greeting"),
        }

        let departures = {
            let _gate = self.presence_gate();
            match self.registry.register(handle.clone()) {
                Registration::FirstConnection => {
                    match self.presence.set_online(user_id) {
                        Some(notice) => {
                            info!(conn_id = %handle.id(), user_id = %user_id, "User online");
                            self.announce_presence(&notice, Some(handle.id()))
                        }
                        // Still marked online from a departure not yet settled.
                        None => Vec::new(),
                    }
                }
                Registration::AdditionalConnection => {
                    info!(conn_id = %handle.id(), user_id = %user_id, "Additional connection");
                    Vec::new()
                }
                Registration::Duplicate => Vec::new(),
            }
        };
        self.settle(departures);

        (handle, queue)
    }

    /// Serve one authenticated client over an already-open transport.
    ///
    /// Returns when the connection has ended and been removed.
    pub async fn serve<S, R, E>(&self, user_id: UserId, sink: S, stream: R) -> CloseReason
    where
        S: Sink<Frame> + Unpin + Send + 'static,
        S::Error: Display + Send,
        R: Stream<Item = Result<Frame, E>> + Unpin + Send,
        E: Display + Send,
    {
        let (handle, queue) = self.connect(user_id);
        ConnectionPump::new(self.clone(), handle, queue)
            .run(sink, stream)
            .await
    }

    /// Remove a connection, ending its session. Returns `false` if it was
    /// already gone.
    pub fn disconnect(&self, conn_id: &ConnectionId) -> bool {
        match self.registry.unregister(conn_id) {
            Some(departure) => {
                self.settle(vec![departure]);
                true
            }
            None => false,
        }
    }

    /// Handle one inbound text frame from `handle`.
    pub async fn dispatch(&self, handle: &Arc<ClientHandle>, text: &str) {
        let message = match decode_inbound(text, self.config.max_frame_bytes) {
            Ok(message) => message,
            Err(e) => {
                self.reject(handle, &e);
                return;
            }
        };

        let sender = handle.user_id();
        let envelope = match message {
            InboundMessage::Ping => {
                self.reply(handle, &OutboundMessage::Pong);
                return;
            }
            InboundMessage::Direct { to, payload } => {
                Envelope::direct(sender, handle.id(), to, payload)
            }
            InboundMessage::Group { to, payload } => {
                Envelope::group(sender, handle.id(), to, payload)
            }
            InboundMessage::Broadcast { payload } => {
                Envelope::broadcast(sender, handle.id(), payload)
            }
        };

        if let Err(e) = self.route(&envelope).await {
            warn!(
                conn_id = %handle.id(),
                message_id = %envelope.id(),
                error = %e,
                "Failed to route message"
            );
        }
    }

    /// Route an envelope. Returns the number of connections it reached.
    pub async fn route(&self, envelope: &Envelope) -> AppResult<usize> {
        let report = self.router.route(envelope).await?;
        self.settle(report.departures);
        Ok(report.delivered)
    }

    /// Send a system notice to every connection.
    pub async fn announce(&self, payload: serde_json::Value) -> AppResult<usize> {
        self.route(&Envelope::system(payload)).await
    }

    /// Count and log a bad inbound frame, and tell its sender.
    pub(crate) fn reject(&self, handle: &Arc<ClientHandle>, error: &DecodeError) {
        self.metrics.record_decode_failure();
        debug!(
            conn_id = %handle.id(),
            user_id = %handle.user_id(),
            code = error.code(),
            error = %error,
            "Rejected inbound frame"
        );
        self.reply(handle, &error.to_outbound());
    }

    fn reply(&self, handle: &Arc<ClientHandle>, message: &OutboundMessage) {
        match encode_outbound(message) {
            Ok(frame) => {
                let departure = self.registry.deliver(handle, frame).into_departure();
                self.settle(departure.into_iter().collect());
            }
            Err(e) => warn!(conn_id = %handle.id(), error = %e, "Failed to encode reply"),
        }
    }

    fn announce_presence(
        &self,
        notice: &OutboundMessage,
        excluding: Option<ConnectionId>,
    ) -> Vec<Departure> {
        if !self.config.broadcast_presence {
            return Vec::new();
        }
        match encode_outbound(notice) {
            Ok(frame) => self.registry.broadcast_all(frame, excluding).departures,
            Err(e) => {
                warn!(error = %e, "Failed to encode presence notice");
                Vec::new()
            }
        }
    }

    /// Process departures: a user whose last connection left goes offline,
    /// and the offline notice may itself overflow other connections.
    ///
    /// The online check and the offline notice happen under the presence
    /// gate, so a concurrent `connect` for the same user is either seen
    /// here or announces itself after the offline notice.
    fn settle(&self, departures: Vec<Departure>) {
        let mut pending: VecDeque<Departure> = departures.into();
        while let Some(departure) = pending.pop_front() {
            if !departure.last_connection {
                continue;
            }
            let user_id = departure.handle.user_id();

            let _gate = self.presence_gate();
            if self.registry.is_online(&user_id) {
                continue;
            }
            if let Some(notice) = self.presence.set_offline(user_id) {
                info!(user_id = %user_id, "User offline");
                pending.extend(self.announce_presence(&notice, None));
            }
        }
    }

    /// Terminate every connection and wait up to `grace` for the pumps to
    /// exit. Connections still registered after that are removed directly.
    ///
    /// Returns `true` if every pump exited in time.
    pub async fn shutdown(&self, grace: Duration) -> bool {
        let handles = self.registry.all_connections();
        info!(connections = handles.len(), "Shutting down chat hub");

        for handle in &handles {
            handle.terminate(CloseReason::Shutdown);
        }

        let drained = tokio::time::timeout(grace, self.registry.drained())
            .await
            .is_ok();
        if !drained {
            let remaining = self.registry.all_connections();
            warn!(remaining = remaining.len(), "Shutdown grace elapsed, removing connections");
            for handle in remaining {
                handle.terminate(CloseReason::Shutdown);
                self.disconnect(&handle.id());
            }
        }

        info!("Chat hub shut down");
        drained
    }

    pub fn metrics_snapshot(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    pub fn online_users(&self) -> Vec<UserId> {
        self.registry.online_users()
    }

    pub fn connection_count(&self) -> usize {
        self.registry.connection_count()
    }

    /// Whether the relationship store answers.
    pub async fn relationship_health(&self) -> AppResult<bool> {
        self.router.policy().directory().health_check().await
    }
}
