//! LCR-style leader election over the logical ring (§4.2).

use std::sync::Arc;
use std::time::Instant;

use election_core::{ClientMessage, Endpoint, NodeId};
use tokio::net::TcpStream;
use tokio::time;
use tracing::{info, warn};

use crate::config::NodeConfig;
use crate::shutdown::Shutdown;
use crate::state::{Role, SharedState};

/// Handles receipt of a `leader` broadcast (§4.3): any state but our own
/// leadership transitions to `FollowerWithLeader`, clearing
/// `election_in_progress`.
///
/// A node that is itself the leader ignores its own broadcast rather than
/// demoting itself; every other node accepts the new leader unconditionally,
/// even mid-election, which is how a concurrent election is superseded by a
/// heartbeat that already resolved it.
pub fn on_leader_broadcast(state: &SharedState, leader: &Endpoint) {
    let mut guard = state.lock();
    if guard.is_leader() && &guard.self_endpoint == leader {
        return;
    }
    guard.last_leader_heartbeat = Instant::now();
    guard.election_in_progress = false;
    guard.election_started_at = None;
    guard.role = Role::FollowerWithLeader;
}

/// Drives the leader-loss timer: demotes a stale `FollowerWithLeader`, and
/// (re)initiates an LCR round for a `FollowerNoLeader` node that has none in
/// flight. A round stuck longer than `leader_timeout` (its neighbor send
/// failed, per §4.2's failure case) is abandoned and retried, which is the
/// self-healing fallback the specification relies on.
pub async fn run_leader_timer(
    state: SharedState,
    config: Arc<NodeConfig>,
    mut shutdown: Shutdown,
) {
    let mut ticker = time::interval(config.beacon_interval);
    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = shutdown.recv() => return,
        }

        let action = {
            let mut guard = state.lock();
            match guard.role {
                Role::FollowerWithLeader => {
                    if guard.last_leader_heartbeat.elapsed() > config.leader_timeout {
                        guard.role = Role::FollowerNoLeader;
                        info!(node_id = guard.node_id, "leader heartbeat lost");
                    }
                    None
                }
                Role::FollowerNoLeader => {
                    if !guard.election_in_progress {
                        guard.election_in_progress = true;
                        guard.role = Role::Electing;
                        guard.election_started_at = Some(Instant::now());
                        let alone = guard.is_alone();
                        Some((guard.node_id, guard.neighbor.clone(), alone))
                    } else {
                        None
                    }
                }
                Role::Electing => {
                    // A round whose neighbor send failed never gets a reply;
                    // abandon it after one leader_timeout and let the next
                    // tick re-enter FollowerNoLeader to retry from scratch.
                    let stuck = guard
                        .election_started_at
                        .map(|started| started.elapsed() > config.leader_timeout)
                        .unwrap_or(false);
                    if stuck {
                        guard.role = Role::FollowerNoLeader;
                        guard.election_in_progress = false;
                        guard.election_started_at = None;
                    }
                    None
                }
                Role::Leader => None,
            }
        };

        let Some((node_id, neighbor, alone)) = action else {
            continue;
        };

        if alone {
            become_leader(&state, node_id);
            continue;
        }

        let Some(neighbor) = neighbor else {
            // Not yet discovered by the ring: nothing to send to, retry next tick.
            let mut guard = state.lock();
            guard.role = Role::FollowerNoLeader;
            guard.election_in_progress = false;
            guard.election_started_at = None;
            continue;
        };

        info!(node_id, "starting leader election");
        send_lcr(&neighbor, node_id).await;
    }
}

/// Handles an `lcr` token received on the peer endpoint (§4.2).
pub async fn handle_lcr(state: SharedState, k: NodeId) {
    let (node_id, neighbor, already_leader) = {
        let guard = state.lock();
        (guard.node_id, guard.neighbor.clone(), guard.is_leader())
    };

    if already_leader {
        // Stale election token for a ring that already has a leader; drop it.
        return;
    }

    if k == node_id {
        become_leader(&state, node_id);
        return;
    }

    let forwarded = k.max(node_id);
    // Forwarding does not reset election_in_progress; the token continues
    // its lap regardless of who started it.
    {
        let mut guard = state.lock();
        guard.election_in_progress = true;
        if guard.role != Role::Leader {
            if guard.role != Role::Electing {
                guard.election_started_at = Some(Instant::now());
            }
            guard.role = Role::Electing;
        }
    }

    let Some(neighbor) = neighbor else {
        warn!(node_id, "dropping lcr token: neighbor not yet known");
        return;
    };
    send_lcr(&neighbor, forwarded).await;
}

fn become_leader(state: &SharedState, node_id: NodeId) {
    let mut guard = state.lock();
    guard.role = Role::Leader;
    guard.election_in_progress = false;
    guard.election_started_at = None;
    info!(node_id, "declared self leader");
}

/// Sends `{type:"lcr", id}` to `neighbor` over TCP. A failed send is logged
/// and the round abandoned (§4.2); the leader-loss timer provides the retry.
async fn send_lcr(neighbor: &Endpoint, id: NodeId) {
    let addr = format!("{}:{}", neighbor.host, neighbor.port);
    let result: election_core::Result<()> = async {
        let mut stream = TcpStream::connect(&addr).await?;
        crate::net::write_frame(&mut stream, &ClientMessage::Lcr { id }).await
    }
    .await;

    if let Err(err) = result {
        warn!(cause = %err, %neighbor, "failed to forward lcr to neighbor, abandoning round");
    }
}
