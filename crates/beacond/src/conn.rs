//! Non-owning handles to live client connections.
//!
//! The registry and router never touch a transport directly. Each accepted
//! connection owns a bounded outbound queue drained by its writer task;
//! a `ConnectionHandle` is the sending side of that queue plus the
//! connection's identity.

use std::time::Duration;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::sync::mpsc;

use beacon_core::ConnectionId;
use beacon_protocol::OutboundMessage;

/// Handle used to address a live connection.
///
/// Cheap to clone. Equality is connection identity: two handles are equal
/// iff they carry the same `ConnectionId`.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    id: ConnectionId,
    outbound: mpsc::Sender<OutboundMessage>,
    connected_at: DateTime<Utc>,
}

impl ConnectionHandle {
    /// Creates a handle around an existing outbound queue.
    pub fn new(id: ConnectionId, outbound: mpsc::Sender<OutboundMessage>) -> Self {
        Self {
            id,
            outbound,
            connected_at: Utc::now(),
        }
    }

    /// Creates a handle together with the receiving side of its queue.
    ///
    /// A zero `buffer` is bumped to one.
    pub fn channel(id: ConnectionId, buffer: usize) -> (Self, mpsc::Receiver<OutboundMessage>) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        (Self::new(id, tx), rx)
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn connected_at(&self) -> DateTime<Utc> {
        self.connected_at
    }

    /// Returns true once the connection's writer has gone away.
    pub fn is_closed(&self) -> bool {
        self.outbound.is_closed()
    }

    /// Queues a message for delivery on this connection.
    ///
    /// Waits at most `timeout` for room in the outbound queue.
    ///
    /// # Errors
    ///
    /// - `SendError::Closed` if the connection's writer has stopped
    /// - `SendError::Timeout` if the queue stayed full for the whole timeout
    pub async fn send(&self, message: OutboundMessage, timeout: Duration) -> Result<(), SendError> {
        self.outbound
            .send_timeout(message, timeout)
            .await
            .map_err(|e| match e {
                mpsc::error::SendTimeoutError::Closed(_) => SendError::Closed(self.id),
                mpsc::error::SendTimeoutError::Timeout(_) => SendError::Timeout(self.id),
            })
    }
}

impl PartialEq for ConnectionHandle {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ConnectionHandle {}

/// Errors that can occur when queueing a message for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SendError {
    #[error("connection {0} is closed")]
    Closed(ConnectionId),

    #[error("outbound queue of {0} is full")]
    Timeout(ConnectionId),
}
