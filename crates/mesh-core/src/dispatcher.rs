//! Inbound message dispatch.
//!
//! Every received frame goes through [`Dispatcher::dispatch`], which decodes
//! it, drops anything from our own id, and routes the rest to the peer
//! table. Failures are contained here: a bad frame never affects the
//! handling of any other frame.

use crate::PeerId;
use crate::geometry::ScreenPosition;
use crate::peers::{PeerRecord, PeerTable, Timestamp, Upsert};
use crate::protocol::MeshMessage;
use tracing::{debug, trace};

/// What a dispatched frame did to the table.
#[derive(Debug, Clone, PartialEq)]
pub enum Dispatch {
    /// A `position_update` was applied
    Upserted { id: PeerId, outcome: Upsert },
    /// A `disconnect` removed a tracked peer
    Removed(PeerRecord),
    /// A `disconnect` for a peer we were not tracking
    AlreadyGone(PeerId),
    /// The frame carried our own id
    SelfEcho,
    /// Unrecognized message kind
    Unknown,
    /// Could not be decoded
    Malformed,
}

/// Counters for handled and dropped frames.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchStats {
    pub accepted: u64,
    /// Decoded updates the table refused (non-finite positions)
    pub rejected: u64,
    pub self_echoes: u64,
    pub unknown: u64,
    pub malformed: u64,
}

/// Routes decoded messages to the peer table.
#[derive(Debug, Default)]
pub struct Dispatcher {
    stats: DispatchStats,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stats(&self) -> DispatchStats {
        self.stats
    }

    /// Decode and apply a raw frame.
    pub fn dispatch(&mut self, table: &mut PeerTable, data: &[u8], now: Timestamp) -> Dispatch {
        match MeshMessage::decode(data) {
            Ok(message) => self.apply(table, message, now),
            Err(e) => {
                debug!("Dropping malformed message ({} bytes): {}", data.len(), e);
                self.stats.malformed += 1;
                Dispatch::Malformed
            }
        }
    }

    /// Apply an already-decoded message.
    pub fn apply(
        &mut self,
        table: &mut PeerTable,
        message: MeshMessage,
        now: Timestamp,
    ) -> Dispatch {
        if message.sender() == Some(table.local_id()) {
            trace!("Dropping own {} message", message.kind());
            self.stats.self_echoes += 1;
            return Dispatch::SelfEcho;
        }

        match message {
            MeshMessage::PositionUpdate {
                id,
                screen_x,
                screen_y,
            } => {
                let outcome = table.upsert(&id, ScreenPosition::new(screen_x, screen_y), now);
                match outcome {
                    Upsert::Joined | Upsert::Updated => self.stats.accepted += 1,
                    Upsert::Rejected => self.stats.rejected += 1,
                    Upsert::SelfIgnored => self.stats.self_echoes += 1,
                }
                Dispatch::Upserted { id, outcome }
            }
            MeshMessage::Disconnect { id } => {
                self.stats.accepted += 1;
                match table.remove(&id) {
                    Some(record) => {
                        debug!("Peer {} disconnected", id);
                        Dispatch::Removed(record)
                    }
                    None => Dispatch::AlreadyGone(id),
                }
            }
            MeshMessage::Unknown => {
                trace!("Ignoring unknown message kind");
                self.stats.unknown += 1;
                Dispatch::Unknown
            }
        }
    }
}
