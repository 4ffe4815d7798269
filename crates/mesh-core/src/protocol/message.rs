//! Typed wire messages.
//!
//! Messages are JSON objects tagged on `type`:
//!
//! ```text
//! {"type":"position_update","id":"a1b2c3d4e5f67890","screenX":120,"screenY":48}
//! {"type":"disconnect","id":"a1b2c3d4e5f67890"}
//! ```
//!
//! Receivers ignore extra fields and decode any other `type` as
//! [`MeshMessage::Unknown`] so newer peers can add message kinds.

use crate::PeerId;
use crate::geometry::ScreenPosition;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Maximum accepted message size (64KB). Real messages are well under 200 bytes.
pub const MAX_MESSAGE_SIZE: usize = 64 * 1024;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("Message too large: {0} bytes (max {MAX_MESSAGE_SIZE})")]
    TooLarge(usize),
    #[error("Invalid message: {0}")]
    Invalid(#[from] serde_json::Error),
}

/// A message exchanged over the broadcast channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MeshMessage {
    /// Announcement of a peer's absolute window origin.
    PositionUpdate {
        id: PeerId,
        #[serde(rename = "screenX")]
        screen_x: f64,
        #[serde(rename = "screenY")]
        screen_y: f64,
    },
    /// The peer is shutting down.
    Disconnect { id: PeerId },
    /// Any message kind this version does not understand. Receive-only.
    #[serde(other, skip_serializing)]
    Unknown,
}

impl MeshMessage {
    pub fn position_update(id: PeerId, position: ScreenPosition) -> Self {
        Self::PositionUpdate {
            id,
            screen_x: position.x,
            screen_y: position.y,
        }
    }

    pub fn disconnect(id: PeerId) -> Self {
        Self::Disconnect { id }
    }

    /// Sender id, if this kind carries one we understand.
    pub fn sender(&self) -> Option<&PeerId> {
        match self {
            Self::PositionUpdate { id, .. } | Self::Disconnect { id } => Some(id),
            Self::Unknown => None,
        }
    }

    /// Wire name of the message kind, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::PositionUpdate { .. } => "position_update",
            Self::Disconnect { .. } => "disconnect",
            Self::Unknown => "unknown",
        }
    }

    /// Serialize to JSON bytes.
    ///
    /// Fails for [`MeshMessage::Unknown`], which is never sent.
    pub fn encode(&self) -> Result<Vec<u8>, ProtocolError> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Parse from JSON bytes.
    pub fn decode(data: &[u8]) -> Result<Self, ProtocolError> {
        if data.len() > MAX_MESSAGE_SIZE {
            return Err(ProtocolError::TooLarge(data.len()));
        }
        Ok(serde_json::from_slice(data)?)
    }
}
