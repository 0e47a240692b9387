//! Client role identification.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Role a client plays in a signaling exchange.
///
/// Carried in the `client` field of every inbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientRole {
    /// Advertises a channel and produces offers
    Host,

    /// Joins a channel and answers offers
    Participant,
}

impl ClientRole {
    /// Parses a wire value, returning `None` for anything unrecognised.
    pub fn from_wire(s: &str) -> Option<Self> {
        match s {
            "host" => Some(Self::Host),
            "participant" => Some(Self::Participant),
            _ => None,
        }
    }

    /// Returns the wire representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Host => "host",
            Self::Participant => "participant",
        }
    }
}

impl fmt::Display for ClientRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_parsing() {
        assert_eq!(ClientRole::from_wire("host"), Some(ClientRole::Host));
        assert_eq!(
            ClientRole::from_wire("participant"),
            Some(ClientRole::Participant)
        );
        assert_eq!(ClientRole::from_wire("Host"), None);
        assert_eq!(ClientRole::from_wire("observer"), None);
    }

    #[test]
    fn test_role_serde_matches_wire() {
        let json = serde_json::to_string(&ClientRole::Participant).unwrap();
        assert_eq!(json, "\"participant\"");
        assert_eq!(ClientRole::Host.to_string(), "host");
    }
}
