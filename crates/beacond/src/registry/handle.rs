//! Client interface for interacting with the RegistryActor.
//!
//! The `RegistryHandle` provides a cheap-to-clone interface for sending
//! commands to the registry actor.
//!
//! # Panic-Free Guarantees
//!
//! This module follows the panic-free policy:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - All fallible operations use `?` or pattern matching
//! - Channel errors are mapped to `RegistryError::ChannelClosed`

use tokio::sync::{mpsc, oneshot};

use beacon_core::{ChannelId, ConnectionId, ParticipantId};

use super::commands::{RegistryCommand, RegistryError, RegistryStats, Removal};
use crate::conn::ConnectionHandle;

// ============================================================================
// Registry Handle
// ============================================================================

/// Handle for interacting with the registry actor.
///
/// This is a cheap-to-clone handle that can be shared across tasks.
/// All methods are async and communicate with the actor via channels.
///
/// # Usage
///
/// ```ignore
/// let handle = registry_handle.clone();
///
/// handle.register_host(ChannelId::new("room1"), conn.clone()).await?;
/// let host = handle.lookup_host(ChannelId::new("room1")).await?;
/// handle.remove_connection(conn.id()).await?;
/// ```
#[derive(Clone)]
pub struct RegistryHandle {
    /// Command sender to the actor
    sender: mpsc::Sender<RegistryCommand>,
}

impl RegistryHandle {
    /// Create a new registry handle.
    pub fn new(sender: mpsc::Sender<RegistryCommand>) -> Self {
        Self { sender }
    }

    /// Sends a command built around a fresh oneshot and awaits the reply.
    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> RegistryCommand,
    ) -> Result<T, RegistryError> {
        let (tx, rx) = oneshot::channel();

        self.sender
            .send(build(tx))
            .await
            .map_err(|_| RegistryError::ChannelClosed)?;

        rx.await.map_err(|_| RegistryError::ChannelClosed)
    }

    /// Bind a connection as host of a channel.
    ///
    /// Silently replaces any previous host. Returns the replaced connection's
    /// id when it differs from `connection`.
    ///
    /// # Errors
    ///
    /// - `RegistryError::ChannelClosed` if the actor has shut down
    pub async fn register_host(
        &self,
        channel_id: ChannelId,
        connection: ConnectionHandle,
    ) -> Result<Option<ConnectionId>, RegistryError> {
        self.request(|respond_to| RegistryCommand::RegisterHost {
            channel_id,
            connection,
            respond_to,
        })
        .await
    }

    /// Bind a connection to a participant id.
    ///
    /// Same overwrite semantics as [`register_host`](Self::register_host).
    ///
    /// # Errors
    ///
    /// - `RegistryError::ChannelClosed` if the actor has shut down
    pub async fn register_participant(
        &self,
        participant_id: ParticipantId,
        connection: ConnectionHandle,
    ) -> Result<Option<ConnectionId>, RegistryError> {
        self.request(|respond_to| RegistryCommand::RegisterParticipant {
            participant_id,
            connection,
            respond_to,
        })
        .await
    }

    /// Register a participant if, and only if, the channel has a host.
    ///
    /// Returns the host's handle, or `None` when the channel is unknown (in
    /// which case nothing is registered).
    ///
    /// # Errors
    ///
    /// - `RegistryError::ChannelClosed` if the actor has shut down
    pub async fn join_channel(
        &self,
        channel_id: ChannelId,
        participant_id: ParticipantId,
        connection: ConnectionHandle,
    ) -> Result<Option<ConnectionHandle>, RegistryError> {
        self.request(|respond_to| RegistryCommand::JoinChannel {
            channel_id,
            participant_id,
            connection,
            respond_to,
        })
        .await
    }

    /// Get the host bound to a channel.
    ///
    /// # Errors
    ///
    /// - `RegistryError::ChannelClosed` if the actor has shut down
    pub async fn lookup_host(
        &self,
        channel_id: ChannelId,
    ) -> Result<Option<ConnectionHandle>, RegistryError> {
        self.request(|respond_to| RegistryCommand::LookupHost {
            channel_id,
            respond_to,
        })
        .await
    }

    /// Get the connection bound to a participant id.
    ///
    /// # Errors
    ///
    /// - `RegistryError::ChannelClosed` if the actor has shut down
    pub async fn lookup_participant(
        &self,
        participant_id: ParticipantId,
    ) -> Result<Option<ConnectionHandle>, RegistryError> {
        self.request(|respond_to| RegistryCommand::LookupParticipant {
            participant_id,
            respond_to,
        })
        .await
    }

    /// Drop every binding held by a connection.
    ///
    /// Idempotent: removing an unknown or already-removed connection returns
    /// an empty [`Removal`].
    ///
    /// # Errors
    ///
    /// - `RegistryError::ChannelClosed` if the actor has shut down
    pub async fn remove_connection(
        &self,
        connection_id: ConnectionId,
    ) -> Result<Removal, RegistryError> {
        self.request(|respond_to| RegistryCommand::RemoveConnection {
            connection_id,
            respond_to,
        })
        .await
    }

    /// Get current registry sizes.
    ///
    /// # Errors
    ///
    /// - `RegistryError::ChannelClosed` if the actor has shut down
    pub async fn stats(&self) -> Result<RegistryStats, RegistryError> {
        self.request(|respond_to| RegistryCommand::Stats { respond_to })
            .await
    }
}
