//! Connection pump: the inbound and outbound workers of one connection.
//!
//! The inbound worker reads frames from the transport and hands text to the
//! hub. The outbound worker drains the connection's queue into the
//! transport and runs the liveness probe. Each worker waits on exactly one
//! source at a time besides the termination signal, and whichever worker
//! hits a terminal condition first records it on the handle; the other
//! notices through [`ClientHandle::terminated`].

use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;

use futures::{Sink, SinkExt, Stream, StreamExt};
use thiserror::Error;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use chathub_core::config::RealtimeConfig;

use super::handle::{ClientHandle, CloseReason, ConnectionState, OutboundQueue};
use super::heartbeat::{HeartbeatConfig, LivenessProbe, ProbeAction};
use crate::message::{DecodeError, Frame};
use crate::metrics::HubMetrics;
use crate::server::ChatHub;

/// Timing settings for one pump.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PumpSettings {
    pub heartbeat: HeartbeatConfig,
    /// Upper bound on a single transport write.
    pub write_timeout: Duration,
}

impl From<&RealtimeConfig> for PumpSettings {
    fn from(config: &RealtimeConfig) -> Self {
        Self {
            heartbeat: HeartbeatConfig::from(config),
            write_timeout: config.write_timeout(),
        }
    }
}

#[derive(Debug, Error)]
enum WriteError {
    #[error("transport write failed: {0}")]
    Transport(String),
    #[error("transport write timed out after {0:?}")]
    TimedOut(Duration),
}

/// Drives one registered connection until it ends.
pub struct ConnectionPump {
    hub: ChatHub,
    handle: Arc<ClientHandle>,
    queue: OutboundQueue,
}

impl ConnectionPump {
    pub fn new(hub: ChatHub, handle: Arc<ClientHandle>, queue: OutboundQueue) -> Self {
        Self { hub, handle, queue }
    }

    /// Run both workers to completion, then remove the connection from the
    /// hub. Returns the recorded close reason.
    pub async fn run<S, R, E>(self, sink: S, stream: R) -> CloseReason
    where
        S: Sink<Frame> + Unpin + Send + 'static,
        S::Error: Display + Send,
        R: Stream<Item = Result<Frame, E>> + Unpin + Send,
        E: Display + Send,
    {
        let Self { hub, handle, queue } = self;
        let conn_id = handle.id();
        let user_id = handle.user_id();

        handle.transition(ConnectionState::Registered, ConnectionState::Active);

        let writer = tokio::spawn(outbound_worker(
            handle.clone(),
            queue,
            sink,
            hub.pump_settings(),
            hub.metrics.clone(),
        ));

        if let Some(reason) = inbound_worker(&hub, &handle, stream).await {
            handle.terminate(reason);
        }

        if let Err(e) = writer.await {
            warn!(conn_id = %conn_id, error = %e, "Outbound worker failed");
            handle.terminate(CloseReason::WriteError);
        }

        hub.disconnect(&conn_id);
        handle.mark_closed();

        let reason = handle.close_reason().unwrap_or(CloseReason::Shutdown);
        let duration_secs = (chrono::Utc::now() - handle.connected_at()).num_seconds();
        info!(
            conn_id = %conn_id,
            user_id = %user_id,
            reason = %reason,
            duration_secs,
            "Connection closed"
        );
        reason
    }
}

/// Read frames until the client goes away, a read fails, or the connection
/// is terminated elsewhere (`None`).
async fn inbound_worker<R, E>(
    hub: &ChatHub,
    handle: &Arc<ClientHandle>,
    mut stream: R,
) -> Option<CloseReason>
where
    R: Stream<Item = Result<Frame, E>> + Unpin,
    E: Display,
{
    loop {
        let next = tokio::select! {
            biased;
            _ = handle.terminated() => return None,
            next = stream.next() => next,
        };

        match next {
            Some(Ok(Frame::Text(text))) => {
                hub.metrics.record_frame();
                tokio::select! {
                    biased;
                    _ = handle.terminated() => return None,
                    _ = hub.dispatch(handle, &text) => {}
                }
            }
            Some(Ok(Frame::Binary(_))) => {
                hub.metrics.record_frame();
                hub.reject(handle, &DecodeError::Unsupported);
            }
            Some(Ok(Frame::Pong)) => handle.acknowledge_probe(),
            // Answered by the transport.
            Some(Ok(Frame::Ping)) => {}
            Some(Ok(Frame::Close)) | None => return Some(CloseReason::ClientClosed),
            Some(Err(e)) => {
                debug!(conn_id = %handle.id(), error = %e, "Transport read failed");
                return Some(CloseReason::ReadError);
            }
        }
    }
}

/// Write queued frames and probes until terminated or a write fails.
async fn outbound_worker<S>(
    handle: Arc<ClientHandle>,
    mut queue: OutboundQueue,
    mut sink: S,
    settings: PumpSettings,
    metrics: Arc<HubMetrics>,
) where
    S: Sink<Frame> + Unpin,
    S::Error: Display,
{
    let mut probe = LivenessProbe::new(settings.heartbeat);
    let period = settings.heartbeat.ping_interval;
    let mut ticker = time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let failure = loop {
        let deadline = probe.deadline();
        tokio::select! {
            biased;
            _ = handle.terminated() => break None,
            _ = handle.probe_acknowledged() => {
                // Unsolicited pongs carry no information.
                if probe.is_awaiting_ack() {
                    probe.acknowledge();
                    handle.transition(ConnectionState::IdleProbe, ConnectionState::Active);
                }
            }
            _ = sleep_until_deadline(deadline) => {
                metrics.record_probe_timeout();
                warn!(
                    conn_id = %handle.id(),
                    user_id = %handle.user_id(),
                    timeout = ?settings.heartbeat.ping_timeout,
                    "Liveness probe unanswered"
                );
                break Some(CloseReason::ProbeTimeout);
            }
            next = queue.recv() => {
                let Some(text) = next else {
                    break Some(CloseReason::Shutdown);
                };
                if let Err(e) = write_frame(&mut sink, Frame::Text(text), settings.write_timeout).await {
                    debug!(conn_id = %handle.id(), error = %e, "Outbound write failed");
                    break Some(CloseReason::WriteError);
                }
                probe.record_traffic();
            }
            _ = ticker.tick() => {
                if probe.on_tick(Instant::now()) == ProbeAction::SendProbe {
                    if let Err(e) = write_frame(&mut sink, Frame::Ping, settings.write_timeout).await {
                        debug!(conn_id = %handle.id(), error = %e, "Probe write failed");
                        break Some(CloseReason::WriteError);
                    }
                    handle.transition(ConnectionState::Active, ConnectionState::IdleProbe);
                }
            }
        }
    };

    if let Some(reason) = failure {
        handle.terminate(reason);
    }

    // Best effort: the peer may already be gone.
    let _ = time::timeout(settings.write_timeout, async {
        let _ = sink.send(Frame::Close).await;
        let _ = sink.close().await;
    })
    .await;
}

async fn write_frame<S>(sink: &mut S, frame: Frame, limit: Duration) -> Result<(), WriteError>
where
    S: Sink<Frame> + Unpin,
    S::Error: Display,
{
    match time::timeout(limit, sink.send(frame)).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(WriteError::Transport(e.to_string())),
        Err(_) => Err(WriteError::TimedOut(limit)),
    }
}

async fn sleep_until_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
