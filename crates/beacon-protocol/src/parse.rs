//! Decoding inbound text frames into typed messages.
//!
//! A frame is decoded exactly once, at the connection boundary. Field
//! presence is checked here so the router only ever sees complete messages.

use beacon_core::{ChannelId, ClientRole, ParticipantId};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::message::InboundMessage;

/// Errors produced while decoding an inbound frame.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// Frame is not valid JSON.
    #[error("malformed JSON: {0}")]
    Malformed(String),

    /// Frame is valid JSON but not an object.
    #[error("message is not a JSON object")]
    NotAnObject,

    /// A field required for this message type is absent.
    #[error("missing field `{field}`")]
    MissingField { field: &'static str },

    /// A field is present but has the wrong JSON type.
    #[error("field `{field}` must be a string")]
    InvalidField { field: &'static str },

    /// Frame carried binary data instead of text.
    #[error("binary frames are not supported")]
    NonText,
}

impl DecodeError {
    /// Creates a malformed-JSON error from any error type.
    pub fn malformed<E: std::fmt::Display>(err: E) -> Self {
        Self::Malformed(err.to_string())
    }
}

/// Decodes one text frame.
///
/// # Errors
///
/// - `DecodeError::Malformed` / `NotAnObject` if the frame is not a JSON object
/// - `DecodeError::MissingField` if `client`, `type`, or a field required by a
///   routed combination is absent
/// - `DecodeError::InvalidField` if an identifier field is not a string
pub fn decode(text: &str) -> Result<InboundMessage, DecodeError> {
    let value: Value = serde_json::from_str(text).map_err(DecodeError::malformed)?;
    let Value::Object(map) = value else {
        return Err(DecodeError::NotAnObject);
    };

    let client = string_field(&map, "client")?;
    let kind = string_field(&map, "type")?;

    let message = match (ClientRole::from_wire(client), kind) {
        (Some(ClientRole::Host), "connection") => InboundMessage::HostConnect {
            channel_id: channel_id(&map)?,
        },
        (Some(ClientRole::Host), "set_offer") => InboundMessage::HostSetOffer {
            participant_id: participant_id(&map)?,
            sdp: sdp(&map)?,
        },
        (Some(ClientRole::Participant), "connection") => InboundMessage::ParticipantConnect {
            channel_id: channel_id(&map)?,
            participant_id: participant_id(&map)?,
        },
        (Some(ClientRole::Participant), "set_answer") => InboundMessage::ParticipantSetAnswer {
            channel_id: channel_id(&map)?,
            participant_id: participant_id(&map)?,
            sdp: sdp(&map)?,
        },
        _ => InboundMessage::Unrouted {
            client: client.to_string(),
            kind: kind.to_string(),
        },
    };

    Ok(message)
}

fn string_field<'a>(map: &'a Map<String, Value>, field: &'static str) -> Result<&'a str, DecodeError> {
    match map.get(field) {
        Some(Value::String(s)) => Ok(s.as_str()),
        Some(_) => Err(DecodeError::InvalidField { field }),
        None => Err(DecodeError::MissingField { field }),
    }
}

fn channel_id(map: &Map<String, Value>) -> Result<ChannelId, DecodeError> {
    string_field(map, "channel_id").map(ChannelId::from)
}

fn participant_id(map: &Map<String, Value>) -> Result<ParticipantId, DecodeError> {
    string_field(map, "participant_id").map(ParticipantId::from)
}

/// The payload may be any JSON value, `null` included, but the key must exist.
fn sdp(map: &Map<String, Value>) -> Result<Value, DecodeError> {
    map.get("sdp")
        .cloned()
        .ok_or(DecodeError::MissingField { field: "sdp" })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_host_connection() {
        let msg = decode(r#"{"client":"host","type":"connection","channel_id":"room1"}"#).unwrap();
        assert_eq!(msg, InboundMessage::host_connect("room1"));
    }

    #[test]
    fn test_decode_host_set_offer() {
        let msg = decode(
            r#"{"client":"host","type":"set_offer","participant_id":"p1","sdp":{"type":"offer","sdp":"v=0"}}"#,
        )
        .unwrap();
        assert_eq!(
            msg,
            InboundMessage::host_set_offer("p1", json!({"type": "offer", "sdp": "v=0"}))
        );
    }

    #[test]
    fn test_decode_participant_connection() {
        let msg = decode(
            r#"{"client":"participant","type":"connection","channel_id":"room1","participant_id":"p1"}"#,
        )
        .unwrap();
        assert_eq!(msg, InboundMessage::participant_connect("room1", "p1"));
    }

    #[test]
    fn test_decode_participant_set_answer() {
        let msg = decode(
            r#"{"client":"participant","type":"set_answer","channel_id":"room1","participant_id":"p1","sdp":"ANSWER_Y"}"#,
        )
        .unwrap();
        assert_eq!(
            msg,
            InboundMessage::participant_set_answer("room1", "p1", json!("ANSWER_Y"))
        );
    }

    #[test]
    fn test_decode_null_sdp_is_accepted() {
        let msg = decode(r#"{"client":"host","type":"set_offer","participant_id":"p1","sdp":null}"#)
            .unwrap();
        assert_eq!(msg, InboundMessage::host_set_offer("p1", Value::Null));
    }

    #[test]
    fn test_decode_extra_fields_ignored() {
        let msg = decode(
            r#"{"client":"host","type":"connection","channel_id":"room1","extra":[1,2,3]}"#,
        )
        .unwrap();
        assert_eq!(msg, InboundMessage::host_connect("room1"));
    }

    #[test]
    fn test_decode_unlisted_combinations_are_unrouted() {
        let msg = decode(r#"{"client":"host","type":"set_answer"}"#).unwrap();
        assert_eq!(
            msg,
            InboundMessage::Unrouted {
                client: "host".to_string(),
                kind: "set_answer".to_string(),
            }
        );

        let msg = decode(r#"{"client":"participant","type":"set_offer","sdp":"x"}"#).unwrap();
        assert!(matches!(msg, InboundMessage::Unrouted { .. }));

        let msg = decode(r#"{"client":"observer","type":"connection"}"#).unwrap();
        assert!(matches!(msg, InboundMessage::Unrouted { .. }));
    }

    #[test]
    fn test_decode_rejects_invalid_json() {
        let err = decode("not json").unwrap_err();
        assert!(matches!(err, DecodeError::Malformed(_)));
    }

    #[test]
    fn test_decode_rejects_non_object() {
        assert_eq!(decode("[1,2]").unwrap_err(), DecodeError::NotAnObject);
        assert_eq!(decode("\"host\"").unwrap_err(), DecodeError::NotAnObject);
    }

    #[test]
    fn test_decode_missing_envelope_fields() {
        assert_eq!(
            decode(r#"{"type":"connection"}"#).unwrap_err(),
            DecodeError::MissingField { field: "client" }
        );
        assert_eq!(
            decode(r#"{"client":"host"}"#).unwrap_err(),
            DecodeError::MissingField { field: "type" }
        );
    }

    #[test]
    fn test_decode_missing_routed_fields() {
        assert_eq!(
            decode(r#"{"client":"host","type":"connection"}"#).unwrap_err(),
            DecodeError::MissingField { field: "channel_id" }
        );
        assert_eq!(
            decode(r#"{"client":"host","type":"set_offer","participant_id":"p1"}"#).unwrap_err(),
            DecodeError::MissingField { field: "sdp" }
        );
        assert_eq!(
            decode(r#"{"client":"participant","type":"connection","channel_id":"room1"}"#)
                .unwrap_err(),
            DecodeError::MissingField {
                field: "participant_id"
            }
        );
    }

    #[test]
    fn test_decode_rejects_non_string_ids() {
        assert_eq!(
            decode(r#"{"client":"host","type":"connection","channel_id":42}"#).unwrap_err(),
            DecodeError::InvalidField { field: "channel_id" }
        );
        assert_eq!(
            decode(r#"{"client":1,"type":"connection"}"#).unwrap_err(),
            DecodeError::InvalidField { field: "client" }
        );
    }

    #[test]
    fn test_decode_accepts_to_json_output() {
        let original = InboundMessage::participant_set_answer("room1", "p1", json!({"k": "v"}));
        let decoded = decode(&original.to_json().to_string()).unwrap();
        assert_eq!(decoded, original);
    }

    #[test]
    fn test_decode_error_display() {
        assert_eq!(
            DecodeError::MissingField { field: "sdp" }.to_string(),
            "missing field `sdp`"
        );
        assert_eq!(
            DecodeError::NonText.to_string(),
            "binary frames are not supported"
        );
    }
}
