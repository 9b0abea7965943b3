//! Peer discovery (§4.1): periodic `ring` beacons, ring-table maintenance,
//! and ingestion of both `ring` and `leader` broadcasts.

use std::sync::Arc;
use std::time::Duration;

use election_core::{BroadcastMessage, Endpoint};
use tokio::net::UdpSocket;
use tokio::time::{self, timeout};
use tracing::{debug, info, warn};

use crate::config::NodeConfig;
use crate::shutdown::Shutdown;
use crate::state::SharedState;
use crate::{leader_election, replication};

const RECV_BUF: usize = 64 * 1024;
const RECV_TIMEOUT: Duration = Duration::from_secs(1);

/// Emits `{type:"ring", host, port}` every `beacon_interval` (§4.1).
pub async fn run_beacon_emit(
    state: SharedState,
    socket: Arc<UdpSocket>,
    config: Arc<NodeConfig>,
    mut shutdown: Shutdown,
) {
    let mut ticker = time::interval(config.beacon_interval);
    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = shutdown.recv() => return,
        }
        let endpoint = { state.lock().self_endpoint.clone() };
        let msg = BroadcastMessage::Ring {
            host: endpoint.host,
            port: endpoint.port,
        };
        let (bhost, bport) = config.broadcast_addr();
        if let Err(err) = crate::net::send_udp(&socket, &bhost, bport, &msg).await {
            warn!(cause = %err, "failed to broadcast ring beacon");
        }
    }
}

/// Refreshes the local ring entry, evicts stale peers, and recomputes
/// `neighbor`, at least every `beacon_interval` (§4.1).
pub async fn run_ring_maintenance(
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
        let mut guard = state.lock();
        guard.refresh_ring(config.peer_timeout);
        debug!(neighbor = ?guard.neighbor, ring_size = guard.ring_table.len(), "ring maintenance tick");
    }
}

/// Ingests `ring` and `leader` broadcasts on the shared discovery socket.
///
/// Decode failures are logged and dropped, leaving state unchanged (§7).
/// `leader` broadcasts are handed to the leader-election and replication
/// components, which own the transitions and snapshot application they
/// trigger.
pub async fn run_broadcast_ingress(
    state: SharedState,
    socket: Arc<UdpSocket>,
    mut shutdown: Shutdown,
) {
    let mut buf = vec![0u8; RECV_BUF];
    loop {
        if shutdown.is_shutdown() {
            return;
        }
        let recv = tokio::select! {
            res = timeout(RECV_TIMEOUT, socket.recv_from(&mut buf)) => res,
            _ = shutdown.recv() => return,
        };
        let (len, from) = match recv {
            Ok(Ok(pair)) => pair,
            Ok(Err(err)) => {
                warn!(cause = %err, "error receiving broadcast message");
                continue;
            }
            Err(_) => continue, // recv timeout, loop back around
        };
        let msg: BroadcastMessage = match serde_json::from_slice(&buf[..len]) {
            Ok(msg) => msg,
            Err(err) => {
                warn!(cause = %err, %from, "dropping malformed broadcast message");
                continue;
            }
        };
        match msg {
            BroadcastMessage::Ring { host, port } => {
                let endpoint = Endpoint::new(host, port);
                state.lock().ring_table.insert(endpoint, std::time::Instant::now());
            }
            BroadcastMessage::Leader {
                host,
                port,
                elections,
            } => {
                let leader = Endpoint::new(host, port);
                leader_election::on_leader_broadcast(&state, &leader);
                replication::apply_snapshot(&state, elections);
            }
        }
    }
}

pub fn log_startup(config: &NodeConfig, endpoint: &Endpoint, node_id: u64) {
    info!(
        %endpoint,
        node_id,
        broadcast = %format!("{}:{}", config.broadcast_host, config.broadcast_port),
        "node starting"
    );
}
