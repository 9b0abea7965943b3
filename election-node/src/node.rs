//! Assembles the five concurrent activities (§5) around one shared
//! [`NodeState`] and drives them until shutdown.

use std::sync::Arc;

use election_core::{Endpoint, NodeId, Result};
use parking_lot::Mutex;
use rand::Rng;
use tokio::net::UdpSocket;
use tokio::signal;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::info;

use crate::config::NodeConfig;
use crate::shutdown::Shutdown;
use crate::state::{NodeState, Role, SharedState};
use crate::{discovery, leader_election, net, replication, router};

/// A running node: owns the shared state and the broadcast UDP socket, and
/// spawns every concurrent activity described in §5 when run.
pub struct Node {
    config: Arc<NodeConfig>,
    state: SharedState,
}

/// A spawned node's concurrent activities, plus a handle to trigger and wait
/// out shutdown. Also gives test code direct read access to the node's
/// state without going over the wire.
pub struct NodeHandle {
    state: SharedState,
    notify_shutdown: broadcast::Sender<()>,
    tasks: Vec<JoinHandle<()>>,
}

impl NodeHandle {
    pub fn state(&self) -> &SharedState {
        &self.state
    }

    pub fn node_id(&self) -> NodeId {
        self.state.lock().node_id
    }

    pub fn endpoint(&self) -> Endpoint {
        self.state.lock().self_endpoint.clone()
    }

    pub fn role(&self) -> Role {
        self.state.lock().role
    }

    pub fn is_leader(&self) -> bool {
        self.state.lock().is_leader()
    }

    /// Signals every activity to stop and waits for each to exit (§5).
    pub async fn shutdown(self) {
        let _ = self.notify_shutdown.send(());
        for task in self.tasks {
            let _ = task.await;
        }
    }
}

impl Node {
    /// Builds a node from its configuration, auto-detecting `host` and
    /// sampling a random `node_id` if not already set.
    pub fn new(mut config: NodeConfig) -> Result<Self> {
        if config.host.is_none() {
            config.host = Some(detect_local_host());
        }
        let host = config.host.clone().expect("just set above");
        let self_endpoint = Endpoint::new(host, config.port);
        let node_id: u64 = rand::thread_rng().gen_range(1..=i64::MAX as u64);

        discovery::log_startup(&config, &self_endpoint, node_id);

        Ok(Node {
            config: Arc::new(config),
            state: Arc::new(Mutex::new(NodeState::new(node_id, self_endpoint))),
        })
    }

    /// Spawns every concurrent activity described in §5 and returns a
    /// handle for inspecting node state and triggering shutdown. This is
    /// the entry point integration tests drive directly.
    pub fn spawn(self) -> Result<NodeHandle> {
        let broadcast_socket = Arc::new(net::bind_broadcast_socket(self.config.broadcast_port)?);
        let peer_endpoint = self.state.lock().self_endpoint.clone();

        let (notify_shutdown, _) = broadcast::channel(1);
        let mut tasks = Vec::new();

        macro_rules! spawn_activity {
            ($future:expr) => {
                tasks.push(tokio::spawn($future));
            };
        }

        spawn_activity!(discovery::run_beacon_emit(
            self.state.clone(),
            broadcast_socket.clone(),
            self.config.clone(),
            Shutdown::new(notify_shutdown.subscribe()),
        ));
        spawn_activity!(discovery::run_ring_maintenance(
            self.state.clone(),
            self.config.clone(),
            Shutdown::new(notify_shutdown.subscribe()),
        ));
        spawn_activity!(discovery::run_broadcast_ingress(
            self.state.clone(),
            broadcast_socket.clone(),
            Shutdown::new(notify_shutdown.subscribe()),
        ));
        spawn_activity!(leader_election::run_leader_timer(
            self.state.clone(),
            self.config.clone(),
            Shutdown::new(notify_shutdown.subscribe()),
        ));
        spawn_activity!(replication::run_heartbeat_emit(
            self.state.clone(),
            broadcast_socket.clone(),
            self.config.clone(),
            Shutdown::new(notify_shutdown.subscribe()),
        ));
        spawn_activity!(router::run_leader_listener_supervisor(
            self.state.clone(),
            self.config.clone(),
            Shutdown::new(notify_shutdown.subscribe()),
        ));

        let peer_listener_state = self.state.clone();
        let peer_listener_shutdown = Shutdown::new(notify_shutdown.subscribe());
        let peer_listener = tokio::spawn(async move {
            if let Err(err) =
                router::run_peer_listener(peer_listener_state, peer_endpoint, peer_listener_shutdown).await
            {
                tracing::error!(cause = %err, "peer endpoint failed");
            }
        });
        tasks.push(peer_listener);

        Ok(NodeHandle {
            state: self.state,
            notify_shutdown,
            tasks,
        })
    }

    /// Runs until a Ctrl-C is received, then waits for every activity to
    /// observe shutdown and exit (§5). Used by the `electiond` binary.
    pub async fn run(self) -> Result<()> {
        let handle = self.spawn()?;
        signal::ctrl_c().await.ok();
        info!("shutdown signal received");
        handle.shutdown().await;
        Ok(())
    }
}

/// Host-IP auto-detection (§10.3): picks the first non-loopback, non-APIPA
/// IPv4 address available. Falls back to loopback if nothing else is found,
/// matching the original's acceptance of a `None` local IP as a degraded
/// single-machine mode rather than a fatal error.
fn detect_local_host() -> String {
    match if_addrs::get_if_addrs() {
        Ok(addrs) => addrs
            .into_iter()
            .map(|iface| iface.ip())
            .find(|ip| ip.is_ipv4() && !ip.is_loopback() && !is_link_local(ip))
            .map(|ip| ip.to_string())
            .unwrap_or_else(|| "127.0.0.1".to_string()),
        Err(_) => "127.0.0.1".to_string(),
    }
}

fn is_link_local(ip: &std::net::IpAddr) -> bool {
    match ip {
        std::net::IpAddr::V4(v4) => v4.octets()[0] == 169 && v4.octets()[1] == 254,
        std::net::IpAddr::V6(_) => false,
    }
}
