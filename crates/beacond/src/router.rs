//! Message routing between hosts and participants.
//!
//! The router holds no state of its own. For every decoded inbound message it
//! consults or updates the registry and queues zero or more outbound
//! messages on the connections involved.
//!
//! | client      | type         | effect                                              |
//! |-------------|--------------|-----------------------------------------------------|
//! | host        | `connection` | bind the sender as host of `channel_id`             |
//! | host        | `set_offer`  | relay `sdp` to the participant, drop if unbound     |
//! | participant | `connection` | join + notify host, or reply `not_found`            |
//! | participant | `set_answer` | relay `sdp` to the channel's host, drop if unbound  |
//!
//! Every other combination is consumed without effect.

use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info};

use beacon_core::{ChannelId, ConnectionId, ParticipantId};
use beacon_protocol::{InboundMessage, OutboundMessage};
use serde_json::Value;

use crate::conn::ConnectionHandle;
use crate::registry::{RegistryError, RegistryHandle};

/// What the router did with one inbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteOutcome {
    /// Sender is now host of a channel
    HostRegistered,

    /// Participant registered and the host was notified
    JoinRequested { host: ConnectionId },

    /// Offer or answer queued on the peer's connection
    Relayed { to: ConnectionId },

    /// Join refused; `not_found` sent back to the sender
    ChannelNotFound,

    /// Target had no binding, or its connection is gone; message dropped
    PeerUnreachable,

    /// No routing rule for this combination
    Ignored,
}

/// Errors that make further routing for a connection impossible.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RouterError {
    #[error("registry unavailable: {0}")]
    Registry(#[from] RegistryError),
}

/// Routes inbound messages according to the signaling table.
#[derive(Clone)]
pub struct MessageRouter {
    registry: RegistryHandle,

    /// Upper bound on waiting for room in a peer's outbound queue
    write_timeout: Duration,
}

impl MessageRouter {
    pub fn new(registry: RegistryHandle, write_timeout: Duration) -> Self {
        Self {
            registry,
            write_timeout,
        }
    }

    /// Routes one message received on `origin`.
    ///
    /// Undeliverable relays are dropped without notifying the sender; the
    /// only client-visible refusal is `not_found` for an unknown channel.
    ///
    /// # Errors
    ///
    /// - `RouterError::Registry` if the registry actor has shut down
    pub async fn route(
        &self,
        origin: &ConnectionHandle,
        message: InboundMessage,
    ) -> Result<RouteOutcome, RouterError> {
        match message {
            InboundMessage::HostConnect { channel_id } => {
                self.register_host(origin, channel_id).await
            }
            InboundMessage::HostSetOffer {
                participant_id,
                sdp,
            } => self.relay_offer(origin, participant_id, sdp).await,
            InboundMessage::ParticipantConnect {
                channel_id,
                participant_id,
            } => self.join(origin, channel_id, participant_id).await,
            InboundMessage::ParticipantSetAnswer {
                channel_id,
                participant_id,
                sdp,
            } => {
                self.relay_answer(origin, channel_id, participant_id, sdp)
                    .await
            }
            InboundMessage::Unrouted { client, kind } => {
                debug!(
                    connection = %origin.id(),
                    client = %client,
                    kind = %kind,
                    "No route for message, ignoring"
                );
                Ok(RouteOutcome::Ignored)
            }
        }
    }

    async fn register_host(
        &self,
        origin: &ConnectionHandle,
        channel_id: ChannelId,
    ) -> Result<RouteOutcome, RouterError> {
        let replaced = self
            .registry
            .register_host(channel_id.clone(), origin.clone())
            .await?;

        match replaced {
            Some(previous) => info!(
                channel_id = %channel_id,
                host = %origin.id(),
                previous = %previous,
                "Channel host replaced"
            ),
            None => info!(channel_id = %channel_id, host = %origin.id(), "Channel registered"),
        }

        Ok(RouteOutcome::HostRegistered)
    }

    async fn relay_offer(
        &self,
        origin: &ConnectionHandle,
        participant_id: ParticipantId,
        sdp: Value,
    ) -> Result<RouteOutcome, RouterError> {
        let Some(participant) = self
            .registry
            .lookup_participant(participant_id.clone())
            .await?
        else {
            debug!(
                connection = %origin.id(),
                participant_id = %participant_id,
                "Offer for unknown participant dropped"
            );
            return Ok(RouteOutcome::PeerUnreachable);
        };

        Ok(self
            .deliver(&participant, OutboundMessage::set_offer(sdp))
            .await)
    }

    async fn join(
        &self,
        origin: &ConnectionHandle,
        channel_id: ChannelId,
        participant_id: ParticipantId,
    ) -> Result<RouteOutcome, RouterError> {
        let host = self
            .registry
            .join_channel(channel_id.clone(), participant_id.clone(), origin.clone())
            .await?;

        let Some(host) = host else {
            info!(
                channel_id = %channel_id,
                participant_id = %participant_id,
                "Join for unknown channel"
            );
            if let Err(e) = origin
                .send(OutboundMessage::not_found(&channel_id), self.write_timeout)
                .await
            {
                debug!(error = %e, "Could not queue not_found reply");
            }
            return Ok(RouteOutcome::ChannelNotFound);
        };

        info!(
            channel_id = %channel_id,
            participant_id = %participant_id,
            participant = %origin.id(),
            host = %host.id(),
            "Participant joined channel"
        );

        match self
            .deliver(&host, OutboundMessage::send_offer(participant_id))
            .await
        {
            RouteOutcome::Relayed { to } => Ok(RouteOutcome::JoinRequested { host: to }),
            other => Ok(other),
        }
    }

    async fn relay_answer(
        &self,
        origin: &ConnectionHandle,
        channel_id: ChannelId,
        participant_id: ParticipantId,
        sdp: Value,
    ) -> Result<RouteOutcome, RouterError> {
        let Some(host) = self.registry.lookup_host(channel_id.clone()).await? else {
            debug!(
                connection = %origin.id(),
                channel_id = %channel_id,
                "Answer for unknown channel dropped"
            );
            return Ok(RouteOutcome::PeerUnreachable);
        };

        Ok(self
            .deliver(&host, OutboundMessage::set_answer(sdp, participant_id))
            .await)
    }

    /// Queues `message` on a peer; failures only affect the peer.
    async fn deliver(&self, peer: &ConnectionHandle, message: OutboundMessage) -> RouteOutcome {
        let kind = message.kind();
        match peer.send(message, self.write_timeout).await {
            Ok(()) => {
                debug!(to = %peer.id(), kind, "Message relayed");
                RouteOutcome::Relayed { to: peer.id() }
            }
            Err(e) => {
                debug!(to = %peer.id(), kind, error = %e, "Relay dropped");
                RouteOutcome::PeerUnreachable
            }
        }
    }
}
