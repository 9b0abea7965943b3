use std::time::Duration;

use clap::Args;
use election_core::Endpoint;
use serde_derive::Deserialize;

const DEFAULT_BROADCAST_HOST: &str = "255.255.255.255";
const DEFAULT_BROADCAST_PORT: u16 = 9090;
const DEFAULT_LEADER_HOST: &str = "0.0.0.0";
const DEFAULT_LEADER_PORT: u16 = 9091;
const DEFAULT_PEER_TIMEOUT_MS: u64 = 2_000;
const DEFAULT_LEADER_TIMEOUT_MS: u64 = 5_000;
const DEFAULT_BEACON_INTERVAL_MS: u64 = 500;
const DEFAULT_HEARTBEAT_INTERVAL_MS: u64 = 1_000;

/// Cluster-wide constants and per-node overrides (§6, §10.3).
///
/// Defaults match the values fixed by the specification. They can be
/// overridden from the command line, or layered once per deployment from a
/// TOML file via [`NodeConfig::overlay_file`] (see that method for the
/// precedence rule).
#[derive(Clone, Debug, Args)]
pub struct NodeConfig {
    /// Broadcast address the cluster's discovery and replication traffic is sent to.
    #[arg(long, default_value = DEFAULT_BROADCAST_HOST)]
    pub broadcast_host: String,

    /// UDP port shared by every node for `ring` and `leader` broadcasts.
    #[arg(long, default_value_t = DEFAULT_BROADCAST_PORT)]
    pub broadcast_port: u16,

    /// Well-known host the leader's client-facing TCP endpoint is advertised on.
    #[arg(long, default_value = DEFAULT_LEADER_HOST)]
    pub leader_host: String,

    /// Well-known port the leader's client-facing TCP endpoint binds while LEADER.
    #[arg(long, default_value_t = DEFAULT_LEADER_PORT)]
    pub leader_port: u16,

    /// This node's own host. Auto-detected from a non-loopback interface if omitted.
    #[arg(long)]
    pub host: Option<String>,

    /// This node's own TCP port, used for the always-bound peer endpoint.
    #[arg(long)]
    pub port: u16,

    /// How long a ring peer may go unheard-from before it is evicted.
    #[arg(long, value_parser = parse_millis, default_value_t = Duration::from_millis(DEFAULT_PEER_TIMEOUT_MS))]
    pub peer_timeout: Duration,

    /// How long without a leader heartbeat before a follower starts an election.
    #[arg(long, value_parser = parse_millis, default_value_t = Duration::from_millis(DEFAULT_LEADER_TIMEOUT_MS))]
    pub leader_timeout: Duration,

    /// Interval between `ring` discovery beacons.
    #[arg(long, value_parser = parse_millis, default_value_t = Duration::from_millis(DEFAULT_BEACON_INTERVAL_MS))]
    pub beacon_interval: Duration,

    /// Interval between leader `leader` heartbeats.
    #[arg(long, value_parser = parse_millis, default_value_t = Duration::from_millis(DEFAULT_HEARTBEAT_INTERVAL_MS))]
    pub heartbeat_interval: Duration,
}

fn parse_millis(raw: &str) -> Result<Duration, std::num::ParseIntError> {
    raw.parse::<u64>().map(Duration::from_millis)
}

/// The subset of [`NodeConfig`] an operator may pin in a TOML file. Every
/// field is optional; only fields present in the file are considered.
#[derive(Debug, Default, Deserialize)]
struct FileOverrides {
    broadcast_host: Option<String>,
    broadcast_port: Option<u16>,
    leader_host: Option<String>,
    leader_port: Option<u16>,
    host: Option<String>,
    peer_timeout_ms: Option<u64>,
    leader_timeout_ms: Option<u64>,
    beacon_interval_ms: Option<u64>,
    heartbeat_interval_ms: Option<u64>,
}

impl NodeConfig {
    /// The well-known leader endpoint clients may connect to directly.
    pub fn leader_endpoint(&self) -> Endpoint {
        Endpoint::new(self.leader_host.clone(), self.leader_port)
    }

    /// The UDP broadcast socket address shared by the whole cluster.
    pub fn broadcast_addr(&self) -> (String, u16) {
        (self.broadcast_host.clone(), self.broadcast_port)
    }

    /// Layers a TOML file's settings under the CLI flags (§10.3).
    ///
    /// A field is only taken from the file when the CLI value still equals
    /// its built-in default, i.e. the operator did not pass that flag
    /// explicitly. This lets a deployment pin the cluster's endpoints once
    /// in a file while individual invocations can still override any field.
    pub fn overlay_file(mut self, path: &str) -> anyhow::Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .build()?;
        let overrides: FileOverrides = settings.try_deserialize().unwrap_or_default();

        if self.broadcast_host == DEFAULT_BROADCAST_HOST {
            if let Some(v) = overrides.broadcast_host {
                self.broadcast_host = v;
            }
        }
        if self.broadcast_port == DEFAULT_BROADCAST_PORT {
            if let Some(v) = overrides.broadcast_port {
                self.broadcast_port = v;
            }
        }
        if self.leader_host == DEFAULT_LEADER_HOST {
            if let Some(v) = overrides.leader_host {
                self.leader_host = v;
            }
        }
        if self.leader_port == DEFAULT_LEADER_PORT {
            if let Some(v) = overrides.leader_port {
                self.leader_port = v;
            }
        }
        if self.host.is_none() {
            self.host = overrides.host;
        }
        if self.peer_timeout == Duration::from_millis(DEFAULT_PEER_TIMEOUT_MS) {
            if let Some(v) = overrides.peer_timeout_ms {
                self.peer_timeout = Duration::from_millis(v);
            }
        }
        if self.leader_timeout == Duration::from_millis(DEFAULT_LEADER_TIMEOUT_MS) {
            if let Some(v) = overrides.leader_timeout_ms {
                self.leader_timeout = Duration::from_millis(v);
            }
        }
        if self.beacon_interval == Duration::from_millis(DEFAULT_BEACON_INTERVAL_MS) {
            if let Some(v) = overrides.beacon_interval_ms {
                self.beacon_interval = Duration::from_millis(v);
            }
        }
        if self.heartbeat_interval == Duration::from_millis(DEFAULT_HEARTBEAT_INTERVAL_MS) {
            if let Some(v) = overrides.heartbeat_interval_ms {
                self.heartbeat_interval = Duration::from_millis(v);
            }
        }
        Ok(self)
    }
}
