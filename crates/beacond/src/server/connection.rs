//! Connection handler for individual client connections.
//!
//! Each accepted WebSocket gets its own `ConnectionHandler` that:
//! - Owns the connection's outbound queue and a writer task draining it
//! - Reads, decodes and routes frames strictly in arrival order
//! - Removes every registry binding of the connection exactly once, on
//!   whichever path ends the read loop
//!
//! # Panic-Free Guarantees
//!
//! This module follows the panic-free policy:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - All fallible operations use `?`, pattern matching, or `unwrap_or`
//! - Connection errors are logged and result in graceful disconnect

use std::borrow::Cow;

use axum::extract::ws::{close_code, CloseFrame, Message, WebSocket};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use beacon_core::ConnectionId;
use beacon_protocol::{decode, DecodeError, OutboundMessage};

use crate::config::{ConnectionSettings, DecodeErrorPolicy};
use crate::conn::ConnectionHandle;
use crate::registry::RegistryHandle;
use crate::router::{MessageRouter, RouterError};

/// Connection handler for a single client.
pub struct ConnectionHandler {
    /// This connection's address in the registry
    handle: ConnectionHandle,

    /// Receiving side of the outbound queue, moved into the writer task
    outbound: mpsc::Receiver<OutboundMessage>,

    registry: RegistryHandle,

    router: MessageRouter,

    settings: ConnectionSettings,

    /// Process-wide shutdown token
    shutdown: CancellationToken,
}

impl ConnectionHandler {
    /// Creates a new connection handler.
    ///
    /// # Arguments
    ///
    /// * `connection_id` - Unique identity for this connection
    /// * `registry` - Handle to the connection registry
    /// * `router` - Message router shared by all connections
    /// * `settings` - Per-connection limits and policies
    /// * `shutdown` - Token cancelled on server shutdown
    pub fn new(
        connection_id: ConnectionId,
        registry: RegistryHandle,
        router: MessageRouter,
        settings: ConnectionSettings,
        shutdown: CancellationToken,
    ) -> Self {
        let (handle, outbound) = ConnectionHandle::channel(connection_id, settings.outbound_buffer);
        Self {
            handle,
            outbound,
            registry,
            router,
            settings,
            shutdown,
        }
    }

    /// Returns this connection's handle.
    pub fn handle(&self) -> &ConnectionHandle {
        &self.handle
    }

    /// Runs the connection until it terminates.
    ///
    /// Spawns the writer task, processes inbound frames, then removes the
    /// connection's registrations and closes the socket. Returns why the
    /// connection ended.
    pub async fn run(self, socket: WebSocket) -> CloseReason {
        let Self {
            handle,
            outbound,
            registry,
            router,
            settings,
            shutdown,
        } = self;
        let connection = handle.id();
        debug!(connection = %connection, "Client connected");

        let (sink, mut stream) = socket.split();
        let token = shutdown.child_token();
        let writer = tokio::spawn(write_messages(sink, outbound, token.clone(), connection));

        let reader = Reader {
            handle: &handle,
            router: &router,
            settings: &settings,
            shutdown: &shutdown,
        };
        let reason = reader.process_messages(&mut stream, &token).await;

        // Single cleanup point for every exit path of the read loop
        match registry.remove_connection(connection).await {
            Ok(removal) if removal.is_empty() => {
                debug!(connection = %connection, "No registrations to remove");
            }
            Ok(removal) => {
                info!(
                    connection = %connection,
                    channels = ?removal.channels,
                    participants = ?removal.participants,
                    "Removed connection registrations"
                );
            }
            Err(e) => {
                warn!(connection = %connection, error = %e, "Registry cleanup failed");
            }
        }

        token.cancel();
        if let Ok(Some(mut sink)) = writer.await {
            let _ = sink.send(Message::Close(Some(reason.close_frame()))).await;
            let _ = sink.close().await;
        }

        info!(connection = %connection, reason = %reason, "Client disconnected");
        reason
    }
}

/// Borrowed state for the inbound half of a connection.
struct Reader<'a> {
    handle: &'a ConnectionHandle,
    router: &'a MessageRouter,
    settings: &'a ConnectionSettings,
    shutdown: &'a CancellationToken,
}

impl Reader<'_> {
    /// Main message processing loop.
    ///
    /// Reads and routes messages until the connection closes, the server
    /// shuts down, or an unrecoverable error occurs.
    async fn process_messages(
        &self,
        stream: &mut SplitStream<WebSocket>,
        token: &CancellationToken,
    ) -> CloseReason {
        loop {
            let frame = tokio::select! {
                _ = token.cancelled() => {
                    return if self.shutdown.is_cancelled() {
                        CloseReason::Shutdown
                    } else {
                        CloseReason::Failed(ConnectionError::WriterFailed)
                    };
                }
                frame = self.next_frame(stream) => frame,
            };

            let text = match frame {
                Ok(Some(Message::Text(text))) => text,
                Ok(Some(Message::Binary(_))) => match self.on_decode_error(DecodeError::NonText) {
                    Some(reason) => return reason,
                    None => continue,
                },
                // Pings are answered by the transport
                Ok(Some(Message::Ping(_) | Message::Pong(_))) => continue,
                Ok(Some(Message::Close(_)) | None) => return CloseReason::ClientClosed,
                Err(e) => return CloseReason::Failed(e),
            };

            let message = match decode(&text) {
                Ok(message) => message,
                Err(e) => match self.on_decode_error(e) {
                    Some(reason) => return reason,
                    None => continue,
                },
            };

            match self.router.route(self.handle, message).await {
                Ok(outcome) => {
                    debug!(connection = %self.handle.id(), outcome = ?outcome, "Message routed");
                }
                Err(e) => return CloseReason::Failed(e.into()),
            }
        }
    }

    /// Waits for the next frame, honouring the idle timeout.
    async fn next_frame(
        &self,
        stream: &mut SplitStream<WebSocket>,
    ) -> Result<Option<Message>, ConnectionError> {
        let next = match self.settings.idle_timeout() {
            Some(limit) => timeout(limit, stream.next())
                .await
                .map_err(|_| ConnectionError::IdleTimeout)?,
            None => stream.next().await,
        };

        next.transpose()
            .map_err(|e| ConnectionError::Transport(e.to_string()))
    }

    /// Applies the decode error policy. Returns a reason when the
    /// connection must close.
    fn on_decode_error(&self, error: DecodeError) -> Option<CloseReason> {
        match self.settings.decode_errors {
            DecodeErrorPolicy::Disconnect => {
                warn!(
                    connection = %self.handle.id(),
                    error = %error,
                    "Malformed message, closing connection"
                );
                Some(CloseReason::Failed(ConnectionError::Decode(error)))
            }
            DecodeErrorPolicy::Skip => {
                warn!(
                    connection = %self.handle.id(),
                    error = %error,
                    "Malformed message skipped"
                );
                None
            }
        }
    }
}

type WsSink = SplitSink<WebSocket, Message>;

/// Drains the outbound queue onto the socket.
///
/// Returns the sink when stopped by `token` so the caller can send a close
/// frame, or `None` after a write failure (which also cancels `token`).
async fn write_messages(
    mut sink: WsSink,
    mut outbound: mpsc::Receiver<OutboundMessage>,
    token: CancellationToken,
    connection: ConnectionId,
) -> Option<WsSink> {
    loop {
        let message = tokio::select! {
            _ = token.cancelled() => return Some(sink),
            message = outbound.recv() => match message {
                Some(message) => message,
                None => return Some(sink),
            },
        };

        let json = match message.encode() {
            Ok(json) => json,
            Err(e) => {
                warn!(connection = %connection, error = %e, "Failed to serialize message");
                continue;
            }
        };

        if let Err(e) = sink.send(Message::Text(json)).await {
            debug!(connection = %connection, error = %e, "Write failed");
            token.cancel();
            return None;
        }
    }
}

/// Why a connection ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseReason {
    /// Client sent a close frame or dropped the socket
    ClientClosed,

    /// Server is shutting down
    Shutdown,

    /// Connection was torn down by an error
    Failed(ConnectionError),
}

impl CloseReason {
    fn close_frame(&self) -> CloseFrame<'static> {
        let (code, reason) = match self {
            Self::Shutdown => (close_code::AWAY, "server shutting down"),
            Self::Failed(ConnectionError::IdleTimeout) => (close_code::NORMAL, "idle timeout"),
            _ => (close_code::NORMAL, ""),
        };
        CloseFrame {
            code,
            reason: Cow::Borrowed(reason),
        }
    }
}

impl std::fmt::Display for CloseReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ClientClosed => write!(f, "closed by client"),
            Self::Shutdown => write!(f, "server shutdown"),
            Self::Failed(e) => write!(f, "{e}"),
        }
    }
}

/// Errors that can end a connection.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConnectionError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("Idle timeout")]
    IdleTimeout,

    #[error("Writer stopped")]
    WriterFailed,

    #[error("Routing error: {0}")]
    Routing(#[from] RouterError),
}
