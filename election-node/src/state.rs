use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use election_core::{Election, Endpoint, NodeId};
use parking_lot::Mutex;

/// The four states a node cycles through (§4.2).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Role {
    FollowerWithLeader,
    FollowerNoLeader,
    Electing,
    Leader,
}

/// Everything mutated under the node's single lock (§5): ring membership,
/// role/election-protocol bookkeeping, and the election dataset itself.
///
/// The Election Model owns `elections`: on the leader it is mutated only by
/// the request router's critical section, on a follower only by replication
/// ingress. No other component writes it.
pub struct NodeState {
    pub node_id: NodeId,
    pub self_endpoint: Endpoint,
    pub role: Role,
    pub election_in_progress: bool,
    pub last_leader_heartbeat: Instant,
    pub ring_table: HashMap<Endpoint, Instant>,
    pub neighbor: Option<Endpoint>,
    pub elections: HashMap<String, Election>,
    /// When the current LCR round was entered. Used only to detect a round
    /// stuck on a failed neighbor send so the leader-loss timer can abandon
    /// and retry it (§4.2's "neighbor unreachable" failure case); not part
    /// of the externally observable node state.
    pub election_started_at: Option<Instant>,
}

/// Shared handle to a node's state, guarded by a single lock per §5's
/// "single node-wide lock is sufficient and expected".
pub type SharedState = Arc<Mutex<NodeState>>;

impl NodeState {
    pub fn new(node_id: NodeId, self_endpoint: Endpoint) -> Self {
        let now = Instant::now();
        let mut ring_table = HashMap::new();
        ring_table.insert(self_endpoint.clone(), now);
        NodeState {
            node_id,
            self_endpoint,
            role: Role::FollowerNoLeader,
            election_in_progress: false,
            last_leader_heartbeat: now,
            ring_table,
            neighbor: None,
            elections: HashMap::new(),
            election_started_at: None,
        }
    }

    pub fn is_leader(&self) -> bool {
        self.role == Role::Leader
    }

    /// Refreshes the local ring entry, evicts peers stale for more than
    /// `peer_timeout`, and recomputes `neighbor` from the lexicographic
    /// order of what remains (§4.1).
    ///
    /// The local endpoint is inserted before the eviction sweep, so the
    /// `position` lookup below always succeeds: this is the guard the spec's
    /// design notes call for against the original's crash on `index()` being
    /// called before the node has discovered itself.
    pub fn refresh_ring(&mut self, peer_timeout: Duration) {
        let now = Instant::now();
        self.ring_table.insert(self.self_endpoint.clone(), now);
        self.ring_table
            .retain(|_, last_seen| now.duration_since(*last_seen) <= peer_timeout);

        let mut members: Vec<&Endpoint> = self.ring_table.keys().collect();
        members.sort();
        if let Some(pos) = members.iter().position(|e| **e == self.self_endpoint) {
            let next = (pos + 1) % members.len();
            self.neighbor = Some(members[next].clone());
        }
    }

    /// True exactly in the single-node case: the ring contains only this node.
    pub fn is_alone(&self) -> bool {
        self.neighbor.as_ref() == Some(&self.self_endpoint)
    }
}
