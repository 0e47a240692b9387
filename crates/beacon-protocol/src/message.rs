//! Protocol message types for signaling.

use beacon_core::{ChannelId, ClientRole, ParticipantId};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Messages sent by clients to the broker.
///
/// One variant per routed `(client, type)` combination. Anything else that
/// still carries a `client` and a `type` decodes to [`InboundMessage::Unrouted`]
/// and is consumed without effect.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundMessage {
    /// Host advertises a channel
    HostConnect { channel_id: ChannelId },

    /// Host sends a session offer to one participant
    HostSetOffer {
        participant_id: ParticipantId,
        /// Opaque session description, relayed verbatim
        sdp: Value,
    },

    /// Participant asks to join a channel
    ParticipantConnect {
        channel_id: ChannelId,
        participant_id: ParticipantId,
    },

    /// Participant answers the host's offer
    ParticipantSetAnswer {
        channel_id: ChannelId,
        participant_id: ParticipantId,
        /// Opaque session description, relayed verbatim
        sdp: Value,
    },

    /// Well-formed envelope with no routing rule
    Unrouted {
        /// Raw `client` value
        client: String,
        /// Raw `type` value
        kind: String,
    },
}

impl InboundMessage {
    /// Creates a host channel registration.
    pub fn host_connect(channel_id: impl Into<ChannelId>) -> Self {
        Self::HostConnect {
            channel_id: channel_id.into(),
        }
    }

    /// Creates a host offer for a participant.
    pub fn host_set_offer(participant_id: impl Into<ParticipantId>, sdp: Value) -> Self {
        Self::HostSetOffer {
            participant_id: participant_id.into(),
            sdp,
        }
    }

    /// Creates a participant join request.
    pub fn participant_connect(
        channel_id: impl Into<ChannelId>,
        participant_id: impl Into<ParticipantId>,
    ) -> Self {
        Self::ParticipantConnect {
            channel_id: channel_id.into(),
            participant_id: participant_id.into(),
        }
    }

    /// Creates a participant answer.
    pub fn participant_set_answer(
        channel_id: impl Into<ChannelId>,
        participant_id: impl Into<ParticipantId>,
        sdp: Value,
    ) -> Self {
        Self::ParticipantSetAnswer {
            channel_id: channel_id.into(),
            participant_id: participant_id.into(),
            sdp,
        }
    }

    /// Returns the sender's role, or `None` for an unrecognised `client` value.
    pub fn role(&self) -> Option<ClientRole> {
        match self {
            Self::HostConnect { .. } | Self::HostSetOffer { .. } => Some(ClientRole::Host),
            Self::ParticipantConnect { .. } | Self::ParticipantSetAnswer { .. } => {
                Some(ClientRole::Participant)
            }
            Self::Unrouted { client, .. } => ClientRole::from_wire(client),
        }
    }

    /// Returns the wire `type` value.
    pub fn kind(&self) -> &str {
        match self {
            Self::HostConnect { .. } | Self::ParticipantConnect { .. } => "connection",
            Self::HostSetOffer { .. } => "set_offer",
            Self::ParticipantSetAnswer { .. } => "set_answer",
            Self::Unrouted { kind, .. } => kind.as_str(),
        }
    }

    /// Renders the message in its wire shape.
    pub fn to_json(&self) -> Value {
        match self {
            Self::HostConnect { channel_id } => json!({
                "client": "host",
                "type": "connection",
                "channel_id": channel_id,
            }),
            Self::HostSetOffer {
                participant_id,
                sdp,
            } => json!({
                "client": "host",
                "type": "set_offer",
                "participant_id": participant_id,
                "sdp": sdp,
            }),
            Self::ParticipantConnect {
                channel_id,
                participant_id,
            } => json!({
                "client": "participant",
                "type": "connection",
                "channel_id": channel_id,
                "participant_id": participant_id,
            }),
            Self::ParticipantSetAnswer {
                channel_id,
                participant_id,
                sdp,
            } => json!({
                "client": "participant",
                "type": "set_answer",
                "channel_id": channel_id,
                "participant_id": participant_id,
                "sdp": sdp,
            }),
            Self::Unrouted { client, kind } => json!({
                "client": client,
                "type": kind,
            }),
        }
    }
}

/// Messages sent from the broker to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundMessage {
    /// Host's offer, relayed to a participant
    SetOffer { sdp: Value },

    /// Join request, sent to the host
    SendOffer { participant_id: ParticipantId },

    /// Requested channel has no host
    NotFound { message: String },

    /// Participant's answer, relayed to the host
    SetAnswer {
        sdp: Value,
        participant_id: ParticipantId,
    },
}

impl OutboundMessage {
    /// Creates a relayed offer.
    pub fn set_offer(sdp: Value) -> Self {
        Self::SetOffer { sdp }
    }

    /// Creates a join notification for the host.
    pub fn send_offer(participant_id: ParticipantId) -> Self {
        Self::SendOffer { participant_id }
    }

    /// Creates the reply for a join against an unknown channel.
    pub fn not_found(channel_id: &ChannelId) -> Self {
        Self::NotFound {
            message: format!("Channel ID {channel_id} not found."),
        }
    }

    /// Creates a relayed answer.
    pub fn set_answer(sdp: Value, participant_id: ParticipantId) -> Self {
        Self::SetAnswer {
            sdp,
            participant_id,
        }
    }

    /// Returns the wire `type` value.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::SetOffer { .. } => "set_offer",
            Self::SendOffer { .. } => "send_offer",
            Self::NotFound { .. } => "not_found",
            Self::SetAnswer { .. } => "set_answer",
        }
    }

    /// Serializes the message to a JSON text frame.
    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_message_text() {
        let msg = OutboundMessage::not_found(&ChannelId::new("nope"));
        let value: Value = serde_json::from_str(&msg.encode().unwrap()).unwrap();
        assert_eq!(
            value,
            json!({"type": "not_found", "message": "Channel ID nope not found."})
        );
    }

    #[test]
    fn test_outbound_shapes() {
        let offer = OutboundMessage::set_offer(json!("OFFER_X"));
        let value: Value = serde_json::from_str(&offer.encode().unwrap()).unwrap();
        assert_eq!(value, json!({"type": "set_offer", "sdp": "OFFER_X"}));

        let join = OutboundMessage::send_offer(ParticipantId::new("p1"));
        let value: Value = serde_json::from_str(&join.encode().unwrap()).unwrap();
        assert_eq!(value, json!({"type": "send_offer", "participant_id": "p1"}));

        let answer = OutboundMessage::set_answer(json!({"a": 1}), ParticipantId::new("p1"));
        let value: Value = serde_json::from_str(&answer.encode().unwrap()).unwrap();
        assert_eq!(
            value,
            json!({"type": "set_answer", "sdp": {"a": 1}, "participant_id": "p1"})
        );
    }

    #[test]
    fn test_sdp_is_relayed_verbatim() {
        let sdp = json!({"type": "offer", "sdp": "v=0\r\no=- 1 2 IN IP4 127.0.0.1\r\n"});
        let msg = OutboundMessage::set_offer(sdp.clone());
        let parsed: OutboundMessage = serde_json::from_str(&msg.encode().unwrap()).unwrap();
        assert_eq!(parsed, OutboundMessage::SetOffer { sdp });
    }

    #[test]
    fn test_inbound_role_and_kind() {
        let msg = InboundMessage::participant_connect("room1", "p1");
        assert_eq!(msg.role(), Some(ClientRole::Participant));
        assert_eq!(msg.kind(), "connection");

        let msg = InboundMessage::Unrouted {
            client: "observer".to_string(),
            kind: "connection".to_string(),
        };
        assert_eq!(msg.role(), None);
    }

    #[test]
    fn test_inbound_to_json_shape() {
        let msg = InboundMessage::host_set_offer("p1", json!("OFFER_X"));
        assert_eq!(
            msg.to_json(),
            json!({
                "client": "host",
                "type": "set_offer",
                "participant_id": "p1",
                "sdp": "OFFER_X",
            })
        );
    }
}
