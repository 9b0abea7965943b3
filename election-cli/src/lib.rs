//! Shared plumbing for the three client binaries: constructing a request,
//! locating the leader, sending it, and printing the reply. Mirrors the
//! original `vote_system`'s `utils.py`, kept deliberately simple per §1 —
//! these are external collaborators to the coordination core, not part of
//! it.

use std::io::{Read, Write};
use std::net::{TcpStream, UdpSocket};
use std::time::Duration;

use byteorder::{BigEndian, ByteOrder};
use clap::Args;
use election_core::{BroadcastMessage, ClientMessage, Endpoint};

/// Flags shared by all three client binaries for locating the leader.
#[derive(Args, Debug)]
pub struct ConnectArgs {
    /// Leader host to connect to directly, bypassing broadcast discovery.
    #[arg(long, default_value = "127.0.0.1")]
    pub leader_host: String,

    /// Leader port to connect to directly.
    #[arg(long, default_value_t = 9091)]
    pub leader_port: u16,

    /// Discover the leader by sniffing a broadcast instead of connecting
    /// to the well-known leader endpoint directly.
    #[arg(long)]
    pub sniff: bool,

    /// Broadcast port to listen on when `--sniff` is set.
    #[arg(long, default_value_t = 9090)]
    pub broadcast_port: u16,
}

impl ConnectArgs {
    /// Resolves the endpoint to send a request to, per the two strategies
    /// §4.4 allows: sniff a `leader` broadcast, or connect to the
    /// well-known leader endpoint directly.
    pub fn resolve_leader(&self) -> anyhow::Result<Endpoint> {
        if self.sniff {
            sniff_leader(self.broadcast_port, Duration::from_secs(5))
        } else {
            Ok(well_known_leader(&self.leader_host, self.leader_port))
        }
    }
}

/// Default well-known leader endpoint: the router binds its leader socket
/// here whenever (and only while) a node holds leadership, so a client can
/// connect directly without first discovering the cluster (§4.4).
pub fn well_known_leader(host: &str, port: u16) -> Endpoint {
    Endpoint::new(host, port)
}

/// Listens on the broadcast port until a `leader` message arrives and
/// returns its advertised endpoint. An alternative to [`well_known_leader`]
/// for clients that want to reach the current leader directly rather than
/// through its well-known address.
pub fn sniff_leader(broadcast_port: u16, timeout: Duration) -> anyhow::Result<Endpoint> {
    let socket = UdpSocket::bind(("0.0.0.0", broadcast_port))?;
    socket.set_broadcast(true)?;
    socket.set_read_timeout(Some(timeout))?;

    let mut buf = vec![0u8; 64 * 1024];
    loop {
        let (len, _from) = socket.recv_from(&mut buf)?;
        if let Ok(BroadcastMessage::Leader { host, port, .. }) =
            serde_json::from_slice(&buf[..len])
        {
            return Ok(Endpoint::new(host, port));
        }
    }
}

/// Sends `msg` to `endpoint` and returns its text reply.
pub fn send_msg(endpoint: &Endpoint, msg: &ClientMessage) -> anyhow::Result<String> {
    let mut stream = TcpStream::connect((endpoint.host.as_str(), endpoint.port))?;
    write_frame(&mut stream, msg)?;
    read_text_frame(&mut stream)
}

fn write_frame(stream: &mut TcpStream, msg: &ClientMessage) -> anyhow::Result<()> {
    let bytes = serde_json::to_vec(msg)?;
    let mut len_buf = [0u8; 4];
    BigEndian::write_u32(&mut len_buf, bytes.len() as u32);
    stream.write_all(&len_buf)?;
    stream.write_all(&bytes)?;
    Ok(())
}

fn read_text_frame(stream: &mut TcpStream) -> anyhow::Result<String> {
    let mut len_buf = [0u8; 4];
    stream.read_exact(&mut len_buf)?;
    let len = BigEndian::read_u32(&len_buf) as usize;
    let mut buf = vec![0u8; len];
    stream.read_exact(&mut buf)?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}
