//! Domain types shared by the election node and its client tools:
//! the wire protocol (tagged JSON messages), the election tally model,
//! and the crate's error type. No networking or async runtime lives here.

mod election;
mod error;
mod message;

pub use election::{Election, Snapshot, VoteOutcome};
pub use error::{NodeError, Result};
pub use message::{BroadcastMessage, ClientMessage, Endpoint, NodeId};
