use serde_derive::{Deserialize, Serialize};

use crate::election::Snapshot;

/// A peer's advertised `(host, port)`. Ordering is lexicographic on
/// `(host, port)`, which is exactly the ring order the spec requires:
/// peers are sorted by this key and each node's neighbor is the one
/// immediately following it, wrapping around.
#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Endpoint {
            host: host.into(),
            port,
        }
    }
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// A node identifier: a random 64-bit integer, sole tie-breaker in LCR.
pub type NodeId = u64;

/// Messages exchanged on the UDP broadcast domain.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BroadcastMessage {
    /// An "I'm alive" beacon, emitted every 500ms by every node.
    Ring { host: String, port: u16 },
    /// The leader's heartbeat, carrying a full snapshot of all elections.
    Leader {
        host: String,
        port: u16,
        elections: Vec<Snapshot>,
    },
}

/// Messages exchanged over TCP, both on the peer endpoint (`lcr` only) and
/// on the leader endpoint (everything else). One JSON object per
/// connection; the connection closes after the (optional) reply.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Create a new election. Rejected if `id` already exists.
    Election {
        id: String,
        candidates: Vec<String>,
        authorized_users: Vec<String>,
    },
    /// Cast a single vote.
    Vote {
        election_id: String,
        id: String,
        candidate: String,
    },
    /// Tally and remove an election, replying with the winner.
    EndElection { id: String },
    /// An LCR election token, forwarded around the ring. No reply.
    Lcr { id: NodeId },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ring_message_wire_shape_matches_original_protocol() {
        let msg = BroadcastMessage::Ring {
            host: "10.0.0.1".into(),
            port: 9000,
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "ring");
        assert_eq!(json["host"], "10.0.0.1");
        assert_eq!(json["port"], 9000);
    }

    #[test]
    fn client_message_tags_round_trip() {
        let raw = r#"{"type":"vote","election_id":"E1","id":"u1","candidate":"A"}"#;
        let msg: ClientMessage = serde_json::from_str(raw).unwrap();
        match msg {
            ClientMessage::Vote {
                election_id,
                id,
                candidate,
            } => {
                assert_eq!(election_id, "E1");
                assert_eq!(id, "u1");
                assert_eq!(candidate, "A");
            }
            other => panic!("unexpected variant: {:?}", other),
        }
    }

    #[test]
    fn lcr_message_carries_a_numeric_id() {
        let raw = r#"{"type":"lcr","id":42}"#;
        let msg: ClientMessage = serde_json::from_str(raw).unwrap();
        assert!(matches!(msg, ClientMessage::Lcr { id: 42 }));
    }

    #[test]
    fn endpoint_ordering_is_lexicographic() {
        let a = Endpoint::new("10.0.0.1", 9000);
        let b = Endpoint::new("10.0.0.1", 9001);
        let c = Endpoint::new("10.0.0.2", 9000);
        assert!(a < b);
        assert!(b < c);
    }
}
