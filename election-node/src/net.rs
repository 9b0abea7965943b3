//! Transport glue: the shared UDP broadcast socket and the length-prefixed
//! TCP framing used by both the leader and peer endpoints.
//!
//! The original implementation read a fixed 1024-byte buffer per client
//! connection, which truncates any request or response larger than that.
//! Per the specification's design notes this is corrected here with a
//! 4-byte big-endian length prefix ahead of each JSON payload, on both the
//! request and the reply, so a connection carries exactly one message each
//! way regardless of size.

use std::net::SocketAddr;

use byteorder::{BigEndian, ByteOrder};
use serde::Serialize;
use socket2::{Domain, Socket, Type};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpStream, UdpSocket};

use election_core::{NodeError, Result};

const MAX_FRAME_LEN: u32 = 16 * 1024 * 1024;

/// Binds the UDP socket shared by discovery and replication: broadcast-
/// enabled, address-reuse enabled, bound to `port` on every interface,
/// matching the original's `SO_BROADCAST`/`SO_REUSEADDR` socket (§4.1).
pub fn bind_broadcast_socket(port: u16) -> Result<UdpSocket> {
    let socket = Socket::new(Domain::IPV4, Type::DGRAM, None)?;
    socket.set_reuse_address(true)?;
    socket.set_broadcast(true)?;
    socket.set_nonblocking(true)?;
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    socket.bind(&addr.into())?;
    let socket = UdpSocket::from_std(socket.into())?;
    Ok(socket)
}

/// Serializes `msg` and sends it to `(host, port)` on `socket`.
///
/// Broadcast/peer send failures are transient per §7: callers log and
/// continue rather than treat this as fatal.
pub async fn send_udp<T: Serialize>(socket: &UdpSocket, host: &str, port: u16, msg: &T) -> Result<()> {
    let bytes = serde_json::to_vec(msg)?;
    socket.send_to(&bytes, (host, port)).await?;
    Ok(())
}

/// Writes a length-prefixed JSON frame to `stream`.
pub async fn write_frame<T: Serialize>(stream: &mut TcpStream, msg: &T) -> Result<()> {
    let bytes = serde_json::to_vec(msg)?;
    let mut len_buf = [0u8; 4];
    BigEndian::write_u32(&mut len_buf, bytes.len() as u32);
    stream.write_all(&len_buf).await?;
    stream.write_all(&bytes).await?;
    stream.flush().await?;
    Ok(())
}

/// Writes a plain UTF-8 text reply (used for the client-facing responses,
/// which are human-readable strings rather than JSON per §4.4).
pub async fn write_text(stream: &mut TcpStream, text: &str) -> Result<()> {
    let bytes = text.as_bytes();
    let mut len_buf = [0u8; 4];
    BigEndian::write_u32(&mut len_buf, bytes.len() as u32);
    stream.write_all(&len_buf).await?;
    stream.write_all(bytes).await?;
    stream.flush().await?;
    Ok(())
}

/// Reads one length-prefixed text reply from `stream`.
pub async fn read_text(stream: &mut TcpStream) -> Result<String> {
    let bytes = read_frame_bytes(stream).await?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Reads one length-prefixed frame from `stream` without decoding it,
/// so a caller can distinguish a genuine parse failure from a
/// recognized-but-malformed message (§4.4/§7's "protocol error" category).
pub async fn read_frame_bytes(stream: &mut TcpStream) -> Result<Vec<u8>> {
    let mut len_buf = [0u8; 4];
    stream.read_exact(&mut len_buf).await?;
    let len = BigEndian::read_u32(&len_buf);
    if len > MAX_FRAME_LEN {
        return Err(NodeError::Protocol(format!(
            "frame of {len} bytes exceeds the {MAX_FRAME_LEN} byte limit"
        )));
    }
    let mut buf = vec![0u8; len as usize];
    stream.read_exact(&mut buf).await?;
    Ok(buf)
}
