//! BroadcastTransport trait for the local broadcast medium.
//!
//! Implementations:
//! - [`crate::channel::LocalChannel`]: named in-process channel shared by
//!   every peer on the same host

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Broadcast transport unavailable: {0}")]
    Unavailable(String),

    #[error("Transport closed")]
    Closed,
}

pub type Result<T> = std::result::Result<T, TransportError>;

/// An unreliable, unordered, at-most-once broadcast channel.
///
/// Messages reach every other open endpoint on the same channel, never the
/// sender. Delivery is fire-and-forget: there is no acknowledgment and
/// messages may be dropped silently.
#[async_trait]
pub trait BroadcastTransport: Send + Sync {
    /// Send `data` to every other endpoint.
    ///
    /// Only fails if this endpoint has been closed.
    async fn broadcast(&self, data: &[u8]) -> Result<()>;

    /// Wait for the next message from another endpoint.
    ///
    /// Returns `None` once the endpoint is closed. Must be cancel-safe.
    async fn recv(&mut self) -> Option<Vec<u8>>;

    /// Release the endpoint. Nothing is sent or received afterwards.
    fn close(&mut self);

    fn is_closed(&self) -> bool;
}
