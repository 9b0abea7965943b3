//! Leader-driven replication of the full election dataset (§4.3).

use std::sync::Arc;

use election_core::{BroadcastMessage, Election, Snapshot};
use tokio::net::UdpSocket;
use tokio::time;
use tracing::warn;

use crate::config::NodeConfig;
use crate::shutdown::Shutdown;
use crate::state::SharedState;

/// Once per second, if this node is the leader, broadcasts
/// `{type:"leader", host, port, elections:[snapshot,...]}`.
pub async fn run_heartbeat_emit(
    state: SharedState,
    socket: Arc<UdpSocket>,
    config: Arc<NodeConfig>,
    mut shutdown: Shutdown,
) {
    let mut ticker = time::interval(config.heartbeat_interval);
    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = shutdown.recv() => return,
        }

        let snapshot = {
            let guard = state.lock();
            if !guard.is_leader() {
                continue;
            }
            let elections: Vec<Snapshot> = guard.elections.values().map(Election::to_snapshot).collect();
            (guard.self_endpoint.clone(), elections)
        };
        let (endpoint, elections) = snapshot;
        let msg = BroadcastMessage::Leader {
            host: endpoint.host,
            port: endpoint.port,
            elections,
        };
        let (bhost, bport) = config.broadcast_addr();
        if let Err(err) = crate::net::send_udp(&socket, &bhost, bport, &msg).await {
            warn!(cause = %err, "failed to broadcast leader heartbeat");
        }
    }
}

/// Atomically replaces the local `elections` map from a leader's heartbeat
/// payload, unless this node is itself the leader (§4.3).
///
/// Decoding already happened in the caller; a decode failure there leaves
/// the prior snapshot untouched by never calling this function at all,
/// which is the "partial updates are forbidden" guarantee the spec asks for.
pub fn apply_snapshot(state: &SharedState, elections: Vec<Snapshot>) {
    let mut guard = state.lock();
    if guard.is_leader() {
        return;
    }
    guard.elections = elections
        .into_iter()
        .map(|snapshot| (snapshot.election_id.clone(), Election::from_snapshot(snapshot)))
        .collect();
}
