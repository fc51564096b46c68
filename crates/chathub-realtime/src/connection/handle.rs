//! Per-connection handle shared between the registry and the pump.

use std::sync::{Arc, OnceLock};
use std::sync::atomic::{AtomicU8, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::{Notify, mpsc};
use tokio_util::sync::CancellationToken;

use chathub_core::types::{ConnectionId, UserId};

use crate::message::OutboundFrame;

/// Receiving half of a connection's outbound queue, owned by its pump.
pub type OutboundQueue = mpsc::Receiver<OutboundFrame>;

/// Lifecycle of a registered connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum ConnectionState {
    /// In the registry, pump not started yet.
    Registered = 0,
    /// Pump running.
    Active = 1,
    /// A liveness probe is outstanding.
    IdleProbe = 2,
    /// A terminal condition was recorded; workers are winding down.
    Terminating = 3,
    /// Both workers have exited.
    Closed = 4,
}

impl ConnectionState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Registered,
            1 => Self::Active,
            2 => Self::IdleProbe,
            3 => Self::Terminating,
            _ => Self::Closed,
        }
    }
}

/// Why a connection ended. Only the first terminator's reason is kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CloseReason {
    /// The client closed the transport.
    ClientClosed,
    /// Reading from the transport failed.
    ReadError,
    /// Writing to the transport failed or timed out.
    WriteError,
    /// The outbound queue was full when a frame was delivered.
    Overflow,
    /// The liveness probe went unanswered.
    ProbeTimeout,
    /// The hub is shutting down.
    Shutdown,
    /// The connection was removed from the registry while still running.
    Unregistered,
}

impl std::fmt::Display for CloseReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::ClientClosed => "client_closed",
            Self::ReadError => "read_error",
            Self::WriteError => "write_error",
            Self::Overflow => "overflow",
            Self::ProbeTimeout => "probe_timeout",
            Self::Shutdown => "shutdown",
            Self::Unregistered => "unregistered",
        };
        f.write_str(s)
    }
}

/// A frame could not be placed on an outbound queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum EnqueueError {
    /// The queue is at capacity.
    #[error("outbound queue is full")]
    Full,
    /// The connection is terminating or gone.
    #[error("connection is closed")]
    Closed,
}

/// Handle to one client connection.
///
/// Cheap to share behind an `Arc`. Enqueueing never blocks: a full queue
/// is reported to the caller, who decides the connection's fate.
#[derive(Debug)]
pub struct ClientHandle {
    id: ConnectionId,
    user_id: UserId,
    connected_at: DateTime<Utc>,
    sender: mpsc::Sender<OutboundFrame>,
    cancel: CancellationToken,
    close_reason: OnceLock<CloseReason>,
    state: AtomicU8,
    probe_ack: Notify,
}

impl ClientHandle {
    /// Create a handle and the queue its pump will drain.
    pub fn new(user_id: UserId, capacity: usize) -> (Arc<Self>, OutboundQueue) {
        let (sender, queue) = mpsc::channel(capacity.max(1));
        let handle = Self {
            id: ConnectionId::new(),
            user_id,
            connected_at: Utc::now(),
            sender,
            cancel: CancellationToken::new(),
            close_reason: OnceLock::new(),
            state: AtomicU8::new(ConnectionState::Registered as u8),
            probe_ack: Notify::new(),
        };
        (Arc::new(handle), queue)
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    pub fn connected_at(&self) -> DateTime<Utc> {
        self.connected_at
    }

    /// Place a frame on the outbound queue without waiting.
    pub fn try_enqueue(&self, frame: OutboundFrame) -> Result<(), EnqueueError> {
        if self.is_terminated() {
            return Err(EnqueueError::Closed);
        }
        self.sender.try_send(frame).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => EnqueueError::Full,
            mpsc::error::TrySendError::Closed(_) => EnqueueError::Closed,
        })
    }

    /// Record a terminal condition and signal both pump workers.
    ///
    /// Returns `true` for the call that actually terminated the connection;
    /// later calls change nothing.
    pub fn terminate(&self, reason: CloseReason) -> bool {
        if self.close_reason.set(reason).is_err() {
            return false;
        }
        self.state
            .store(ConnectionState::Terminating as u8, Ordering::Release);
        self.cancel.cancel();
        true
    }

    pub fn is_terminated(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn close_reason(&self) -> Option<CloseReason> {
        self.close_reason.get().copied()
    }

    /// Resolves once the connection has been terminated.
    pub async fn terminated(&self) {
        self.cancel.cancelled().await
    }

    pub fn state(&self) -> ConnectionState {
        ConnectionState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Move between live states. Has no effect once terminating.
    pub(crate) fn transition(&self, from: ConnectionState, to: ConnectionState) -> bool {
        self.state
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub(crate) fn mark_closed(&self) {
        self.state
            .store(ConnectionState::Closed as u8, Ordering::Release);
    }

    /// Called by the inbound worker when the client answers a probe.
    pub fn acknowledge_probe(&self) {
        self.probe_ack.notify_one();
    }

    pub(crate) async fn probe_acknowledged(&self) {
        self.probe_ack.notified().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_queue_is_reported() {
        let (handle, mut queue) = ClientHandle::new(UserId(1), 2);
        handle.try_enqueue("a".into()).unwrap();
        handle.try_enqueue("b".into()).unwrap();
        assert_eq!(handle.try_enqueue("c".into()), Err(EnqueueError::Full));

        assert_eq!(queue.try_recv().unwrap().as_ref(), "a");
        handle.try_enqueue("c".into()).unwrap();
    }

    #[test]
    fn test_first_terminator_wins() {
        let (handle, _queue) = ClientHandle::new(UserId(1), 4);
        assert!(handle.terminate(CloseReason::Overflow));
        assert!(!handle.terminate(CloseReason::ClientClosed));

        assert_eq!(handle.close_reason(), Some(CloseReason::Overflow));
        assert_eq!(handle.state(), ConnectionState::Terminating);
        assert_eq!(handle.try_enqueue("late".into()), Err(EnqueueError::Closed));
    }

    #[test]
    fn test_dropped_queue_reports_closed() {
        let (handle, queue) = ClientHandle::new(UserId(1), 4);
        drop(queue);
        assert_eq!(handle.try_enqueue("x".into()), Err(EnqueueError::Closed));
    }

    #[test]
    fn test_transitions_stop_after_termination() {
        let (handle, _queue) = ClientHandle::new(UserId(1), 4);
        assert!(handle.transition(ConnectionState::Registered, ConnectionState::Active));
        assert!(handle.transition(ConnectionState::Active, ConnectionState::IdleProbe));

        handle.terminate(CloseReason::ProbeTimeout);
        assert!(!handle.transition(ConnectionState::IdleProbe, ConnectionState::Active));
        assert_eq!(handle.state(), ConnectionState::Terminating);
    }

    #[tokio::test]
    async fn test_terminated_resolves() {
        let (handle, _queue) = ClientHandle::new(UserId(1), 4);
        let waiter = {
            let handle = handle.clone();
            tokio::spawn(async move { handle.terminated().await })
        };
        handle.terminate(CloseReason::Shutdown);
        waiter.await.unwrap();
    }
}
