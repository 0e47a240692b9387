//! Registry actor commands, errors, and results.
//!
//! This module defines the message types for communicating with the `RegistryActor`:
//! - `RegistryCommand`: Commands sent to the actor
//! - `RegistryError`: Errors that can occur during registry operations
//! - `Removal` / `RegistryStats`: Values returned by the actor
//!
//! All types are designed for async message passing and follow the panic-free policy.

use serde::Serialize;
use thiserror::Error;
use tokio::sync::oneshot;

use beacon_core::{ChannelId, ConnectionId, ParticipantId};

use crate::conn::ConnectionHandle;

// ============================================================================
// Registry Commands
// ============================================================================

/// Commands sent to the registry actor.
///
/// Each command uses a oneshot channel for the response, enabling
/// request-response patterns in async code without blocking.
///
/// # Usage
///
/// ```ignore
/// let (tx, rx) = oneshot::channel();
/// registry_tx.send(RegistryCommand::LookupHost {
///     channel_id: id,
///     respond_to: tx,
/// }).await?;
/// let host = rx.await?;
/// ```
#[derive(Debug)]
pub enum RegistryCommand {
    /// Bind a connection as the host of a channel.
    ///
    /// Overwrites any existing binding. Responds with the id of the
    /// connection that previously held the channel, if it was a different one.
    RegisterHost {
        channel_id: ChannelId,
        connection: ConnectionHandle,
        respond_to: oneshot::Sender<Option<ConnectionId>>,
    },

    /// Bind a connection to a participant id.
    ///
    /// Same overwrite semantics as `RegisterHost`.
    RegisterParticipant {
        participant_id: ParticipantId,
        connection: ConnectionHandle,
        respond_to: oneshot::Sender<Option<ConnectionId>>,
    },

    /// Register a participant only if the channel currently has a host.
    ///
    /// Lookup and registration happen in one actor turn. Responds with the
    /// host's handle, or `None` (and no registration) if the channel is unknown.
    JoinChannel {
        channel_id: ChannelId,
        participant_id: ParticipantId,
        connection: ConnectionHandle,
        respond_to: oneshot::Sender<Option<ConnectionHandle>>,
    },

    /// Get the host bound to a channel.
    LookupHost {
        channel_id: ChannelId,
        respond_to: oneshot::Sender<Option<ConnectionHandle>>,
    },

    /// Get the connection bound to a participant id.
    LookupParticipant {
        participant_id: ParticipantId,
        respond_to: oneshot::Sender<Option<ConnectionHandle>>,
    },

    /// Drop every binding held by a connection.
    ///
    /// Idempotent: an unknown connection yields an empty `Removal`.
    RemoveConnection {
        connection_id: ConnectionId,
        respond_to: oneshot::Sender<Removal>,
    },

    /// Get current registry sizes.
    Stats {
        respond_to: oneshot::Sender<RegistryStats>,
    },
}

// ============================================================================
// Registry Errors
// ============================================================================

/// Errors that can occur during registry operations.
///
/// Registry operations themselves cannot fail; the only error is losing
/// contact with the actor.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// The command or response channel was closed.
    ///
    /// This typically indicates the actor was shut down.
    #[error("response channel closed")]
    ChannelClosed,
}

// ============================================================================
// Results
// ============================================================================

/// Bindings removed by a `RemoveConnection` command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Removal {
    /// Channels the connection was hosting
    pub channels: Vec<ChannelId>,

    /// Participant ids the connection was bound to
    pub participants: Vec<ParticipantId>,
}

impl Removal {
    /// Returns true if nothing was removed.
    pub fn is_empty(&self) -> bool {
        self.channels.is_empty() && self.participants.is_empty()
    }
}

/// Snapshot of registry sizes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RegistryStats {
    /// Channels with a bound host
    pub channels: usize,

    /// Bound participant ids
    pub participants: usize,

    /// Distinct connections holding at least one binding
    pub connections: usize,
}
