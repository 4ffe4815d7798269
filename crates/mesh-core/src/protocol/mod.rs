//! Wire protocol for the local broadcast channel.
//!
//! Peers share no state besides the messages defined here:
//! - `position_update`: a peer's current absolute window origin
//! - `disconnect`: best-effort notice that a peer is going away

pub mod message;

pub use message::{MAX_MESSAGE_SIZE, MeshMessage, ProtocolError};
