//! Registry actor - owns all connection bindings and processes commands.
//!
//! The RegistryActor is the single owner of routing state in the broker.
//! It receives commands via an mpsc channel, so every register, lookup and
//! remove is serialized with respect to all others.
//!
//! # Panic-Free Guarantees
//!
//! This module follows the panic-free policy:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - All fallible operations use `?`, pattern matching, or `unwrap_or`
//! - Response send failures are ignored (the caller went away)

use std::collections::{HashMap, HashSet};

use chrono::Utc;
use tokio::sync::mpsc;
use tracing::{debug, info};

use beacon_core::{ChannelId, ConnectionId, ParticipantId};

use super::commands::{RegistryCommand, RegistryStats, Removal};
use crate::conn::ConnectionHandle;

/// Keys a single connection is currently registered under.
#[derive(Debug, Default)]
struct ConnectionKeys {
    channels: HashSet<ChannelId>,
    participants: HashSet<ParticipantId>,
}

impl ConnectionKeys {
    fn is_empty(&self) -> bool {
        self.channels.is_empty() && self.participants.is_empty()
    }
}

// ============================================================================
// Registry Actor
// ============================================================================

/// The registry actor - owns all connection bindings.
///
/// # Ownership
///
/// The actor owns:
/// - `hosts`: channel → host connection
/// - `participants`: participant id → participant connection
/// - `keys_by_connection`: reverse index, connection → keys it holds
///
/// The reverse index is updated on every insert and overwrite, so removing
/// a connection costs O(k) in the number of keys it holds rather than a scan
/// of both maps.
pub struct RegistryActor {
    /// Command receiver
    receiver: mpsc::Receiver<RegistryCommand>,

    hosts: HashMap<ChannelId, ConnectionHandle>,

    participants: HashMap<ParticipantId, ConnectionHandle>,

    keys_by_connection: HashMap<ConnectionId, ConnectionKeys>,
}

impl RegistryActor {
    /// Creates a new registry actor.
    pub fn new(receiver: mpsc::Receiver<RegistryCommand>) -> Self {
        Self {
            receiver,
            hosts: HashMap::new(),
            participants: HashMap::new(),
            keys_by_connection: HashMap::new(),
        }
    }

    /// Runs the actor event loop.
    ///
    /// Processes commands until the channel closes (all senders dropped).
    /// This is the main entry point - call this in a spawned task.
    pub async fn run(mut self) {
        info!("Registry actor starting");

        while let Some(cmd) = self.receiver.recv().await {
            self.handle_command(cmd);
        }

        info!(
            channels = self.hosts.len(),
            participants = self.participants.len(),
            "Registry actor stopped"
        );
    }

    /// Dispatches a command to the appropriate handler.
    fn handle_command(&mut self, cmd: RegistryCommand) {
        match cmd {
            RegistryCommand::RegisterHost {
                channel_id,
                connection,
                respond_to,
            } => {
                let result = self.handle_register_host(channel_id, connection);
                // Ignore send error - client may have dropped the receiver
                let _ = respond_to.send(result);
            }
            RegistryCommand::RegisterParticipant {
                participant_id,
                connection,
                respond_to,
            } => {
                let result = self.handle_register_participant(participant_id, connection);
                let _ = respond_to.send(result);
            }
            RegistryCommand::JoinChannel {
                channel_id,
                participant_id,
                connection,
                respond_to,
            } => {
                let result = self.handle_join_channel(&channel_id, participant_id, connection);
                let _ = respond_to.send(result);
            }
            RegistryCommand::LookupHost {
                channel_id,
                respond_to,
            } => {
                let _ = respond_to.send(self.hosts.get(&channel_id).cloned());
            }
            RegistryCommand::LookupParticipant {
                participant_id,
                respond_to,
            } => {
                let _ = respond_to.send(self.participants.get(&participant_id).cloned());
            }
            RegistryCommand::RemoveConnection {
                connection_id,
                respond_to,
            } => {
                let result = self.handle_remove_connection(connection_id);
                let _ = respond_to.send(result);
            }
            RegistryCommand::Stats { respond_to } => {
                let _ = respond_to.send(self.stats());
            }
        }
    }

    // ========================================================================
    // Command Handlers
    // ========================================================================

    /// Binds `connection` as host of `channel_id`, last write wins.
    fn handle_register_host(
        &mut self,
        channel_id: ChannelId,
        connection: ConnectionHandle,
    ) -> Option<ConnectionId> {
        let connection_id = connection.id();
        let replaced = self
            .hosts
            .insert(channel_id.clone(), connection)
            .map(|previous| previous.id())
            .filter(|previous| *previous != connection_id);

        if let Some(previous) = replaced {
            if let Some(keys) = self.keys_by_connection.get_mut(&previous) {
                keys.channels.remove(&channel_id);
            }
            self.prune_keys(previous);
            debug!(
                channel_id = %channel_id,
                previous = %previous,
                host = %connection_id,
                "Host binding replaced"
            );
        }

        self.keys_by_connection
            .entry(connection_id)
            .or_default()
            .channels
            .insert(channel_id);

        replaced
    }

    /// Binds `connection` to `participant_id`, last write wins.
    fn handle_register_participant(
        &mut self,
        participant_id: ParticipantId,
        connection: ConnectionHandle,
    ) -> Option<ConnectionId> {
        let connection_id = connection.id();
        let replaced = self
            .participants
            .insert(participant_id.clone(), connection)
            .map(|previous| previous.id())
            .filter(|previous| *previous != connection_id);

        if let Some(previous) = replaced {
            if let Some(keys) = self.keys_by_connection.get_mut(&previous) {
                keys.participants.remove(&participant_id);
            }
            self.prune_keys(previous);
            debug!(
                participant_id = %participant_id,
                previous = %previous,
                participant = %connection_id,
                "Participant binding replaced"
            );
        }

        self.keys_by_connection
            .entry(connection_id)
            .or_default()
            .participants
            .insert(participant_id);

        replaced
    }

    fn handle_join_channel(
        &mut self,
        channel_id: &ChannelId,
        participant_id: ParticipantId,
        connection: ConnectionHandle,
    ) -> Option<ConnectionHandle> {
        let host = self.hosts.get(channel_id).cloned()?;
        self.handle_register_participant(participant_id, connection);
        Some(host)
    }

    /// Removes every binding whose value is `connection_id`.
    fn handle_remove_connection(&mut self, connection_id: ConnectionId) -> Removal {
        let Some(keys) = self.keys_by_connection.remove(&connection_id) else {
            return Removal::default();
        };

        let mut removal = Removal::default();

        for channel_id in keys.channels {
            let owned = self
                .hosts
                .get(&channel_id)
                .is_some_and(|host| host.id() == connection_id);
            if owned {
                if let Some(host) = self.hosts.remove(&channel_id) {
                    let hosted_for = Utc::now() - host.connected_at();
                    debug!(
                        channel_id = %channel_id,
                        connection = %connection_id,
                        hosted_secs = hosted_for.num_seconds(),
                        "Channel closed"
                    );
                }
                removal.channels.push(channel_id);
            }
        }

        for participant_id in keys.participants {
            let owned = self
                .participants
                .get(&participant_id)
                .is_some_and(|participant| participant.id() == connection_id);
            if owned {
                self.participants.remove(&participant_id);
                removal.participants.push(participant_id);
            }
        }

        removal
    }

    fn prune_keys(&mut self, connection_id: ConnectionId) {
        if self
            .keys_by_connection
            .get(&connection_id)
            .is_some_and(ConnectionKeys::is_empty)
        {
            self.keys_by_connection.remove(&connection_id);
        }
    }

    fn stats(&self) -> RegistryStats {
        RegistryStats {
            channels: self.hosts.len(),
            participants: self.participants.len(),
            connections: self.keys_by_connection.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::{mpsc, oneshot};

    use beacon_protocol::OutboundMessage;

    fn create_actor() -> RegistryActor {
        let (_tx, rx) = mpsc::channel(10);
        RegistryActor::new(rx)
    }

    fn connection(id: u64) -> (ConnectionHandle, mpsc::Receiver<OutboundMessage>) {
        ConnectionHandle::channel(ConnectionId::new(id), 8)
    }

    async fn register_host(
        actor: &mut RegistryActor,
        channel: &str,
        conn: &ConnectionHandle,
    ) -> Option<ConnectionId> {
        let (tx, rx) = oneshot::channel();
        actor.handle_command(RegistryCommand::RegisterHost {
            channel_id: ChannelId::new(channel),
            connection: conn.clone(),
            respond_to: tx,
        });
        rx.await.unwrap()
    }

    async fn register_participant(
        actor: &mut RegistryActor,
        participant: &str,
        conn: &ConnectionHandle,
    ) -> Option<ConnectionId> {
        let (tx, rx) = oneshot::channel();
        actor.handle_command(RegistryCommand::RegisterParticipant {
            participant_id: ParticipantId::new(participant),
            connection: conn.clone(),
            respond_to: tx,
        });
        rx.await.unwrap()
    }

    async fn lookup_host(actor: &mut RegistryActor, channel: &str) -> Option<ConnectionHandle> {
        let (tx, rx) = oneshot::channel();
        actor.handle_command(RegistryCommand::LookupHost {
            channel_id: ChannelId::new(channel),
            respond_to: tx,
        });
        rx.await.unwrap()
    }

    async fn lookup_participant(
        actor: &mut RegistryActor,
        participant: &str,
    ) -> Option<ConnectionHandle> {
        let (tx, rx) = oneshot::channel();
        actor.handle_command(RegistryCommand::LookupParticipant {
            participant_id: ParticipantId::new(participant),
            respond_to: tx,
        });
        rx.await.unwrap()
    }

    async fn remove(actor: &mut RegistryActor, conn: &ConnectionHandle) -> Removal {
        let (tx, rx) = oneshot::channel();
        actor.handle_command(RegistryCommand::RemoveConnection {
            connection_id: conn.id(),
            respond_to: tx,
        });
        rx.await.unwrap()
    }

    #[tokio::test]
    async fn test_register_and_lookup_host() {
        let mut actor = create_actor();
        let (host, _rx) = connection(1);

        assert_eq!(register_host(&mut actor, "room1", &host).await, None);

        assert_eq!(lookup_host(&mut actor, "room1").await, Some(host));
        assert_eq!(lookup_host(&mut actor, "room2").await, None);
    }

    #[tokio::test]
    async fn test_register_host_last_write_wins() {
        let mut actor = create_actor();
        let (x, _rx_x) = connection(1);
        let (y, _rx_y) = connection(2);

        register_host(&mut actor, "room1", &x).await;
        let replaced = register_host(&mut actor, "room1", &y).await;

        assert_eq!(replaced, Some(x.id()));
        assert_eq!(lookup_host(&mut actor, "room1").await, Some(y));
        // The orphaned host no longer holds any key
        assert_eq!(actor.stats().connections, 1);
        assert!(remove(&mut actor, &x).await.is_empty());
    }

    #[tokio::test]
    async fn test_reregister_same_connection_is_not_a_replacement() {
        let mut actor = create_actor();
        let (host, _rx) = connection(1);

        register_host(&mut actor, "room1", &host).await;
        assert_eq!(register_host(&mut actor, "room1", &host).await, None);
        assert_eq!(actor.stats().channels, 1);
    }

    #[tokio::test]
    async fn test_register_participant_last_write_wins() {
        let mut actor = create_actor();
        let (first, _rx_a) = connection(1);
        let (second, _rx_b) = connection(2);

        register_participant(&mut actor, "p1", &first).await;
        let replaced = register_participant(&mut actor, "p1", &second).await;

        assert_eq!(replaced, Some(first.id()));
        assert_eq!(lookup_participant(&mut actor, "p1").await, Some(second.clone()));

        // Removing the overwritten connection must not touch the new binding
        assert!(remove(&mut actor, &first).await.is_empty());
        assert_eq!(lookup_participant(&mut actor, "p1").await, Some(second));
    }

    #[tokio::test]
    async fn test_remove_connection_clears_all_keys() {
        let mut actor = create_actor();
        let (conn, _rx) = connection(1);

        register_host(&mut actor, "room1", &conn).await;
        register_host(&mut actor, "room2", &conn).await;
        register_participant(&mut actor, "p1", &conn).await;

        let mut removal = remove(&mut actor, &conn).await;
        removal.channels.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        assert_eq!(
            removal.channels,
            vec![ChannelId::new("room1"), ChannelId::new("room2")]
        );
        assert_eq!(removal.participants, vec![ParticipantId::new("p1")]);

        assert_eq!(lookup_host(&mut actor, "room1").await, None);
        assert_eq!(lookup_host(&mut actor, "room2").await, None);
        assert_eq!(lookup_participant(&mut actor, "p1").await, None);
        assert_eq!(actor.stats(), RegistryStats::default());
    }

    #[tokio::test]
    async fn test_remove_connection_is_idempotent() {
        let mut actor = create_actor();
        let (conn, _rx) = connection(1);
        let (unknown, _rx_unknown) = connection(99);

        register_participant(&mut actor, "p1", &conn).await;

        assert!(!remove(&mut actor, &conn).await.is_empty());
        assert!(remove(&mut actor, &conn).await.is_empty());
        assert!(remove(&mut actor, &unknown).await.is_empty());
    }

    #[tokio::test]
    async fn test_remove_leaves_other_connections() {
        let mut actor = create_actor();
        let (host_a, _rx_a) = connection(1);
        let (host_b, _rx_b) = connection(2);
        let (part_a, _rx_c) = connection(3);

        register_host(&mut actor, "room-a", &host_a).await;
        register_host(&mut actor, "room-b", &host_b).await;
        register_participant(&mut actor, "pa", &part_a).await;

        remove(&mut actor, &host_a).await;

        assert_eq!(lookup_host(&mut actor, "room-a").await, None);
        assert_eq!(lookup_host(&mut actor, "room-b").await, Some(host_b));
        assert_eq!(lookup_participant(&mut actor, "pa").await, Some(part_a));
    }

    #[tokio::test]
    async fn test_join_channel_registers_only_when_hosted() {
        let mut actor = create_actor();
        let (host, _rx_h) = connection(1);
        let (participant, _rx_p) = connection(2);

        let (tx, rx) = oneshot::channel();
        actor.handle_command(RegistryCommand::JoinChannel {
            channel_id: ChannelId::new("room1"),
            participant_id: ParticipantId::new("p1"),
            connection: participant.clone(),
            respond_to: tx,
        });
        assert_eq!(rx.await.unwrap(), None);
        assert_eq!(lookup_participant(&mut actor, "p1").await, None);

        register_host(&mut actor, "room1", &host).await;

        let (tx, rx) = oneshot::channel();
        actor.handle_command(RegistryCommand::JoinChannel {
            channel_id: ChannelId::new("room1"),
            participant_id: ParticipantId::new("p1"),
            connection: participant.clone(),
            respond_to: tx,
        });
        assert_eq!(rx.await.unwrap(), Some(host));
        assert_eq!(lookup_participant(&mut actor, "p1").await, Some(participant));
    }

    #[tokio::test]
    async fn test_stats_counts_distinct_connections() {
        let mut actor = create_actor();
        let (host, _rx_h) = connection(1);
        let (participant, _rx_p) = connection(2);

        register_host(&mut actor, "room1", &host).await;
        register_participant(&mut actor, "p1", &participant).await;
        register_participant(&mut actor, "p2", &participant).await;

        let (tx, rx) = oneshot::channel();
        actor.handle_command(RegistryCommand::Stats { respond_to: tx });
        assert_eq!(
            rx.await.unwrap(),
            RegistryStats {
                channels: 1,
                participants: 2,
                connections: 2,
            }
        );
    }
}
