use thiserror::Error;

/// Errors surfaced across the node's crate boundaries.
///
/// Precondition failures in the election model (unauthorized voter, duplicate
/// vote, unknown election id, ...) are *not* represented here: per the
/// protocol's error policy they are ordinary refusals with their own
/// human-readable text, not errors of the server.
#[derive(Debug, Error)]
pub enum NodeError {
    #[error("malformed message: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("network error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid address: {0}")]
    Addr(#[from] std::net::AddrParseError),

    #[error("protocol error: {0}")]
    Protocol(String),
}

pub type Result<T> = std::result::Result<T, NodeError>;
