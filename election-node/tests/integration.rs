//! End-to-end scenarios over real loopback UDP/TCP traffic between
//! in-process node instances, per the specification's test matrix.

use std::net::TcpListener as StdTcpListener;
use std::time::Duration;

use election_core::{ClientMessage, Endpoint};
use election_node::config::NodeConfig;
use election_node::node::NodeHandle;
use election_node::Node;
use tokio::net::TcpStream;
use tokio::time::{sleep, timeout, Instant};

fn free_port() -> u16 {
    StdTcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port()
}

/// Short, test-friendly timing constants: the protocol's shape is identical
/// at any scale, and short intervals keep the suite fast.
fn test_config(broadcast_port: u16) -> NodeConfig {
    NodeConfig {
        broadcast_host: "127.255.255.255".to_string(),
        broadcast_port,
        leader_host: "127.0.0.1".to_string(),
        leader_port: free_port(),
        host: Some("127.0.0.1".to_string()),
        port: free_port(),
        peer_timeout: Duration::from_millis(800),
        leader_timeout: Duration::from_millis(1_200),
        beacon_interval: Duration::from_millis(100),
        heartbeat_interval: Duration::from_millis(200),
    }
}

fn spawn_node(config: NodeConfig) -> NodeHandle {
    Node::new(config)
        .expect("node construction cannot fail")
        .spawn()
        .expect("binding sockets cannot fail on a fresh ephemeral port")
}

async fn wait_for_leader(handles: &[&NodeHandle], bound: Duration) -> Option<usize> {
    let start = Instant::now();
    loop {
        if let Some(i) = handles.iter().position(|h| h.is_leader()) {
            return Some(i);
        }
        if start.elapsed() > bound {
            return None;
        }
        sleep(Duration::from_millis(30)).await;
    }
}

async fn request(endpoint: &Endpoint, msg: &ClientMessage) -> String {
    let mut stream = TcpStream::connect((endpoint.host.as_str(), endpoint.port))
        .await
        .expect("connect to leader");
    election_node::net::write_frame(&mut stream, msg)
        .await
        .expect("write request");
    election_node::net::read_text(&mut stream)
        .await
        .expect("read reply")
}

#[tokio::test]
async fn single_node_create_vote_end() {
    let broadcast_port = free_port();
    let handle = spawn_node(test_config(broadcast_port));

    let became_leader = wait_for_leader(&[&handle], Duration::from_secs(3)).await;
    assert!(became_leader.is_some(), "a lone node must self-elect");

    let leader = handle.endpoint();

    let reply = request(
        &leader,
        &ClientMessage::Election {
            id: "E1".into(),
            candidates: vec!["A".into(), "B".into()],
            authorized_users: vec!["u1".into(), "u2".into()],
        },
    )
    .await;
    assert!(reply.contains("added successfully"), "got: {reply}");

    let reply = request(
        &leader,
        &ClientMessage::Vote {
            election_id: "E1".into(),
            id: "u1".into(),
            candidate: "A".into(),
        },
    )
    .await;
    assert!(reply.contains("registered"), "got: {reply}");

    let reply = request(&leader, &ClientMessage::EndElection { id: "E1".into() }).await;
    assert_eq!(reply, "Election E1 ended. The winner is A.");

    handle.shutdown().await;
}

#[tokio::test]
async fn unauthorized_voter_is_rejected() {
    let handle = spawn_node(test_config(free_port()));
    wait_for_leader(&[&handle], Duration::from_secs(3))
        .await
        .expect("a lone node must self-elect");
    let leader = handle.endpoint();

    request(
        &leader,
        &ClientMessage::Election {
            id: "E2".into(),
            candidates: vec!["A".into(), "B".into()],
            authorized_users: vec!["u1".into(), "u2".into()],
        },
    )
    .await;

    let reply = request(
        &leader,
        &ClientMessage::Vote {
            election_id: "E2".into(),
            id: "u3".into(),
            candidate: "A".into(),
        },
    )
    .await;
    assert!(reply.starts_with("Error:"), "got: {reply}");
    assert!(reply.contains("u3"), "got: {reply}");

    let tally = {
        let guard = handle.state().lock();
        guard.elections["E2"].tally.clone()
    };
    assert_eq!(tally["A"], 0);

    handle.shutdown().await;
}

#[tokio::test]
async fn duplicate_vote_is_idempotent() {
    let handle = spawn_node(test_config(free_port()));
    wait_for_leader(&[&handle], Duration::from_secs(3))
        .await
        .expect("a lone node must self-elect");
    let leader = handle.endpoint();

    request(
        &leader,
        &ClientMessage::Election {
            id: "E3".into(),
            candidates: vec!["A".into(), "B".into()],
            authorized_users: vec!["u1".into(), "u2".into()],
        },
    )
    .await;
    request(
        &leader,
        &ClientMessage::Vote {
            election_id: "E3".into(),
            id: "u1".into(),
            candidate: "A".into(),
        },
    )
    .await;

    let reply = request(
        &leader,
        &ClientMessage::Vote {
            election_id: "E3".into(),
            id: "u1".into(),
            candidate: "B".into(),
        },
    )
    .await;
    assert!(reply.contains("already voted"), "got: {reply}");

    let tally = {
        let guard = handle.state().lock();
        guard.elections["E3"].tally.clone()
    };
    assert_eq!(tally["A"], 1);
    assert_eq!(tally["B"], 0);

    handle.shutdown().await;
}

#[tokio::test]
async fn tie_is_resolved_by_declaration_order() {
    let handle = spawn_node(test_config(free_port()));
    wait_for_leader(&[&handle], Duration::from_secs(3))
        .await
        .expect("a lone node must self-elect");
    let leader = handle.endpoint();

    request(
        &leader,
        &ClientMessage::Election {
            id: "E4".into(),
            candidates: vec!["X".into(), "Y".into()],
            authorized_users: vec!["u1".into(), "u2".into()],
        },
    )
    .await;
    request(
        &leader,
        &ClientMessage::Vote {
            election_id: "E4".into(),
            id: "u1".into(),
            candidate: "X".into(),
        },
    )
    .await;
    request(
        &leader,
        &ClientMessage::Vote {
            election_id: "E4".into(),
            id: "u2".into(),
            candidate: "Y".into(),
        },
    )
    .await;

    let reply = request(&leader, &ClientMessage::EndElection { id: "E4".into() }).await;
    assert_eq!(reply, "Election E4 ended. The winner is X.");

    handle.shutdown().await;
}

#[tokio::test]
async fn three_node_cluster_elects_one_leader_and_fails_over() {
    let broadcast_port = free_port();
    let n1 = spawn_node(test_config(broadcast_port));
    let n2 = spawn_node(test_config(broadcast_port));
    let n3 = spawn_node(test_config(broadcast_port));
    let handles = [&n1, &n2, &n3];

    let leader_idx = wait_for_leader(&handles, Duration::from_secs(6))
        .await
        .expect("a stable 3-node ring must elect exactly one leader");
    for (i, h) in handles.iter().enumerate() {
        assert_eq!(h.is_leader(), i == leader_idx);
    }

    let survivors: Vec<&NodeHandle> = handles
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != leader_idx)
        .map(|(_, h)| *h)
        .collect();

    // Kill the leader; the survivors must crown a new one.
    match leader_idx {
        0 => n1.shutdown().await,
        1 => n2.shutdown().await,
        _ => n3.shutdown().await,
    }

    let new_leader_idx = wait_for_leader(&survivors, Duration::from_secs(8))
        .await
        .expect("a survivor must take over leadership within a bounded window");
    let new_leader = survivors[new_leader_idx];

    let reply = request(
        &new_leader.endpoint(),
        &ClientMessage::Election {
            id: "failover".into(),
            candidates: vec!["A".into()],
            authorized_users: vec!["u1".into()],
        },
    )
    .await;
    assert!(reply.contains("added successfully"), "got: {reply}");

    for h in survivors {
        h.shutdown().await;
    }
}

#[tokio::test]
async fn follower_converges_to_leader_snapshot_within_heartbeats() {
    let broadcast_port = free_port();
    let n1 = spawn_node(test_config(broadcast_port));
    let n2 = spawn_node(test_config(broadcast_port));
    let handles = [&n1, &n2];

    let leader_idx = wait_for_leader(&handles, Duration::from_secs(5))
        .await
        .expect("a stable 2-node ring must elect exactly one leader");
    let leader = handles[leader_idx];
    let follower = handles[1 - leader_idx];

    request(
        &leader.endpoint(),
        &ClientMessage::Election {
            id: "E5".into(),
            candidates: vec!["A".into(), "B".into()],
            authorized_users: vec!["u1".into(), "u2".into(), "u3".into()],
        },
    )
    .await;
    request(
        &leader.endpoint(),
        &ClientMessage::Vote {
            election_id: "E5".into(),
            id: "u1".into(),
            candidate: "A".into(),
        },
    )
    .await;
    request(
        &leader.endpoint(),
        &ClientMessage::Vote {
            election_id: "E5".into(),
            id: "u2".into(),
            candidate: "A".into(),
        },
    )
    .await;
    request(
        &leader.endpoint(),
        &ClientMessage::Vote {
            election_id: "E5".into(),
            id: "u3".into(),
            candidate: "B".into(),
        },
    )
    .await;

    let converged = timeout(Duration::from_secs(3), async {
        loop {
            let matches = {
                let leader_state = leader.state().lock();
                let follower_state = follower.state().lock();
                follower_state.elections.get("E5") == leader_state.elections.get("E5")
            };
            if matches {
                return;
            }
            sleep(Duration::from_millis(50)).await;
        }
    })
    .await;
    assert!(converged.is_ok(), "follower never converged to leader's snapshot");

    let follower_tally = follower.state().lock().elections["E5"].tally.clone();
    assert_eq!(follower_tally["A"], 2);
    assert_eq!(follower_tally["B"], 1);

    n1.shutdown().await;
    n2.shutdown().await;
}
