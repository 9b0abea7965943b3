//! The request router (§4.4): the always-bound peer endpoint, the
//! leader-only client endpoint that is bound and unbound as role changes,
//! and per-message dispatch against the election model.

use std::sync::Arc;
use std::time::Duration;

use election_core::{ClientMessage, Election, Endpoint, Result};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time;
use tracing::{info, warn};

use crate::config::NodeConfig;
use crate::leader_election;
use crate::shutdown::Shutdown;
use crate::state::SharedState;

const LEADER_SOCKET_POLL: Duration = Duration::from_millis(200);

/// Serves the node's own peer endpoint, bound for the process lifetime.
/// Used for `lcr` tokens; any other message type is dispatched exactly like
/// the leader endpoint would (diagnostic pass-through, §4.4).
pub async fn run_peer_listener(
    state: SharedState,
    endpoint: Endpoint,
    mut shutdown: Shutdown,
) -> Result<()> {
    let listener = TcpListener::bind((endpoint.host.as_str(), endpoint.port)).await?;
    info!(%endpoint, "peer endpoint bound");
    loop {
        tokio::select! {
            res = listener.accept() => accept_one(res, &state),
            _ = shutdown.recv() => return Ok(()),
        }
    }
}

/// Binds and unbinds the client-facing leader endpoint as this node's role
/// changes, so it is listening if and only if the node is currently LEADER.
pub async fn run_leader_listener_supervisor(
    state: SharedState,
    config: Arc<NodeConfig>,
    mut shutdown: Shutdown,
) {
    let mut ticker = time::interval(LEADER_SOCKET_POLL);
    let mut active: Option<(JoinHandle<()>, broadcast::Sender<()>)> = None;

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = shutdown.recv() => {
                unbind(&mut active).await;
                return;
            }
        }

        let is_leader = state.lock().is_leader();
        match (is_leader, active.is_some()) {
            (true, false) => {
                match TcpListener::bind((config.leader_host.as_str(), config.leader_port)).await {
                    Ok(listener) => {
                        info!(host = %config.leader_host, port = config.leader_port, "leader endpoint bound");
                        let (stop_tx, stop_rx) = broadcast::channel(1);
                        let state = state.clone();
                        let handle = tokio::spawn(async move {
                            serve(listener, state, Shutdown::new(stop_rx)).await;
                        });
                        active = Some((handle, stop_tx));
                    }
                    Err(err) => warn!(cause = %err, "failed to bind leader endpoint"),
                }
            }
            (false, true) => {
                unbind(&mut active).await;
                info!("leader endpoint unbound");
            }
            _ => {}
        }
    }
}

async fn unbind(active: &mut Option<(JoinHandle<()>, broadcast::Sender<()>)>) {
    if let Some((handle, stop)) = active.take() {
        let _ = stop.send(());
        let _ = handle.await;
    }
}

async fn serve(listener: TcpListener, state: SharedState, mut shutdown: Shutdown) {
    loop {
        tokio::select! {
            res = listener.accept() => accept_one(res, &state),
            _ = shutdown.recv() => return,
        }
    }
}

fn accept_one(res: std::io::Result<(TcpStream, std::net::SocketAddr)>, state: &SharedState) {
    match res {
        Ok((stream, _addr)) => {
            let state = state.clone();
            tokio::spawn(async move { handle_connection(stream, state).await });
        }
        Err(err) => warn!(cause = %err, "error accepting client connection"),
    }
}

/// Recognized `type` tags, matching `ClientMessage`'s `rename_all = "snake_case"` variants.
const KNOWN_TYPES: &[&str] = &["election", "vote", "end_election", "lcr"];

/// The result of parsing a raw client frame: either a usable message, or one
/// of the two distinct failure categories §7 calls out. A **decode error**
/// (the bytes aren't JSON at all) is dropped silently; a **protocol error**
/// (the JSON parses but the `type` tag is missing/unknown, or a recognized
/// type is missing a required field) gets a descriptive reply.
#[derive(Debug)]
enum ParsedMessage {
    Ok(ClientMessage),
    ProtocolError(String),
}

/// Parses a raw frame in two steps so a protocol error can be told apart
/// from a genuine decode error: first as a bare [`serde_json::Value`] (a
/// failure here is a decode error, per §7 logged and dropped with no reply),
/// then checked against the known `type` tags and only afterwards decoded
/// into [`ClientMessage`] (a failure here — unknown tag, or a recognized tag
/// missing a required field — is a protocol error, per §7 replied to).
fn parse_client_message(bytes: &[u8]) -> Result<ParsedMessage> {
    let value: serde_json::Value = serde_json::from_slice(bytes)?;

    let tag = value.get("type").and_then(serde_json::Value::as_str);
    let tag = match tag {
        Some(tag) if KNOWN_TYPES.contains(&tag) => tag,
        Some(tag) => {
            return Ok(ParsedMessage::ProtocolError(format!(
                "Error: unknown message type '{tag}'"
            )))
        }
        None => {
            return Ok(ParsedMessage::ProtocolError(
                "Error: message is missing a 'type' field".to_string(),
            ))
        }
    };

    match serde_json::from_value::<ClientMessage>(value) {
        Ok(msg) => Ok(ParsedMessage::Ok(msg)),
        Err(err) => Ok(ParsedMessage::ProtocolError(format!(
            "Error: malformed '{tag}' message: {err}"
        ))),
    }
}

/// Reads one request off `stream`, dispatches it, and (for everything but
/// `lcr`) writes the response back on the same connection (§4.4).
///
/// Decoding happens outside the node's lock; the decoded request is
/// dispatched under the lock; the reply is written back outside it (§5).
async fn handle_connection(mut stream: TcpStream, state: SharedState) {
    let bytes = match crate::net::read_frame_bytes(&mut stream).await {
        Ok(bytes) => bytes,
        Err(err) => {
            warn!(cause = %err, "dropping malformed client frame");
            return;
        }
    };

    let msg = match parse_client_message(&bytes) {
        Ok(ParsedMessage::Ok(msg)) => msg,
        Ok(ParsedMessage::ProtocolError(reply)) => {
            if let Err(err) = crate::net::write_text(&mut stream, &reply).await {
                warn!(cause = %err, "failed to write protocol-error reply");
            }
            return;
        }
        Err(err) => {
            warn!(cause = %err, "dropping malformed client message");
            return;
        }
    };

    if let ClientMessage::Lcr { id } = msg {
        leader_election::handle_lcr(state, id).await;
        return;
    }

    let reply = dispatch_mutation(&state, msg);
    if let Err(err) = crate::net::write_text(&mut stream, &reply).await {
        warn!(cause = %err, "failed to write client reply");
    }
}

/// Applies `msg` against the election model under the node's lock, checking
/// the LEADER flag inside the same critical section so a concurrent LCR
/// round that demotes this node can't race a mutation through (§4.4).
fn dispatch_mutation(state: &SharedState, msg: ClientMessage) -> String {
    let mut guard = state.lock();
    if !guard.is_leader() {
        return "Error: this node is not the current leader; sniff a leader broadcast and retry"
            .to_string();
    }

    match msg {
        ClientMessage::Election {
            id,
            candidates,
            authorized_users,
        } => {
            if guard.elections.contains_key(&id) {
                format!("Election id {id} already exists")
            } else {
                guard
                    .elections
                    .insert(id.clone(), Election::new(id.clone(), candidates, authorized_users));
                format!("Election {id} added successfully.")
            }
        }
        ClientMessage::Vote {
            election_id,
            id,
            candidate,
        } => match guard.elections.get_mut(&election_id) {
            Some(election) => election.register_vote(&id, &candidate).to_string(),
            None => format!("Error: Election id {election_id} unknown"),
        },
        ClientMessage::EndElection { id } => match guard.elections.get(&id) {
            Some(election) => {
                let winner = election.winner().unwrap_or_default().to_string();
                guard.elections.remove(&id);
                format!("Election {id} ended. The winner is {winner}.")
            }
            None => format!("Election id {id} not found"),
        },
        ClientMessage::Lcr { .. } => unreachable!("lcr is handled before dispatch_mutation"),
    }
}
