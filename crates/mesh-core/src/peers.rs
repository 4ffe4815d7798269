//! Peer table: the local view of every other live peer.
//!
//! `PeerTable` is the only place peer records are created, changed or
//! deleted. Callers get read-only access through [`PeerTable::all`] and
//! [`PeerTable::snapshot`].
//!
//! The table also holds the current [`LocalFrame`] so that every record's
//! derived position is always computed from the latest local anchor and
//! window origin.

use crate::PeerId;
use crate::geometry::{LocalAnchor, LocalFrame, Point, ScreenPosition};
use serde::Serialize;
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// Milliseconds since Unix epoch.
pub type Timestamp = u64;

/// Tracked state for a remote peer.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PeerRecord {
    pub id: PeerId,
    /// Most recent window origin announced by the peer
    pub last_known_absolute: ScreenPosition,
    /// Where the peer lands in our surface space
    pub derived_local: Point,
    /// When the last accepted announcement arrived
    pub last_seen: Timestamp,
    /// When the peer was first seen in this session
    pub first_seen: Timestamp,
    /// Accepted announcements since the peer was first seen
    pub announcements: u64,
}

/// Result of [`PeerTable::upsert`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upsert {
    /// First accepted announcement from this peer
    Joined,
    /// Existing record refreshed
    Updated,
    /// The id is our own
    SelfIgnored,
    /// Position was non-finite or reconciled to a non-finite point
    Rejected,
}

/// Read-only view of the table handed to renderers.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MeshSnapshot {
    pub local_id: Option<PeerId>,
    pub anchor: LocalAnchor,
    /// Sorted by peer id
    pub peers: Vec<PeerRecord>,
}

impl MeshSnapshot {
    pub fn peer_count(&self) -> usize {
        self.peers.len()
    }
}

/// Authoritative local view of all other known peers.
pub struct PeerTable {
    local_id: PeerId,
    frame: LocalFrame,
    peers: HashMap<PeerId, PeerRecord>,
}

impl PeerTable {
    pub fn new(local_id: PeerId, frame: LocalFrame) -> Self {
        Self {
            local_id,
            frame,
            peers: HashMap::new(),
        }
    }

    pub fn local_id(&self) -> &PeerId {
        &self.local_id
    }

    pub fn frame(&self) -> LocalFrame {
        self.frame
    }

    /// Record an announcement from `id`.
    ///
    /// Own id is ignored. A non-finite position leaves any existing record
    /// untouched, including `last_seen`.
    pub fn upsert(&mut self, id: &PeerId, absolute: ScreenPosition, now: Timestamp) -> Upsert {
        if *id == self.local_id {
            return Upsert::SelfIgnored;
        }

        if !absolute.is_finite() {
            warn!("Ignoring non-finite position from {}: {:?}", id, absolute);
            return Upsert::Rejected;
        }

        let Some(derived) = self.frame.place(absolute).finite() else {
            warn!(
                "Position for {} reconciled to a non-finite point (remote {:?}, frame {:?})",
                id, absolute, self.frame
            );
            return Upsert::Rejected;
        };

        if let Some(record) = self.peers.get_mut(id) {
            record.last_known_absolute = absolute;
            record.derived_local = derived;
            record.last_seen = now;
            record.announcements += 1;
            Upsert::Updated
        } else {
            debug!("New peer {} at {:?}", id, absolute);
            self.peers.insert(
                id.clone(),
                PeerRecord {
                    id: id.clone(),
                    last_known_absolute: absolute,
                    derived_local: derived,
                    last_seen: now,
                    first_seen: now,
                    announcements: 1,
                },
            );
            Upsert::Joined
        }
    }

    /// Delete the record for `id`. Absent ids are a no-op.
    pub fn remove(&mut self, id: &PeerId) -> Option<PeerRecord> {
        self.peers.remove(id)
    }

    /// Evict every record not seen for more than `timeout_ms`.
    ///
    /// Returns the evicted ids.
    pub fn reap(&mut self, now: Timestamp, timeout_ms: u64) -> Vec<PeerId> {
        let mut evicted = Vec::new();
        self.peers.retain(|id, record| {
            let stale = now.saturating_sub(record.last_seen) > timeout_ms;
            if stale {
                info!("Peer {} removed due to inactivity", id);
                evicted.push(id.clone());
            }
            !stale
        });
        evicted.sort();
        evicted
    }

    /// Replace the local frame and recompute every derived position.
    ///
    /// Returns false (and keeps the previous frame) only if the frame itself
    /// is not finite. A record that would land on a non-finite point keeps
    /// its previous position; every other record is recomputed.
    pub fn set_frame(&mut self, frame: LocalFrame) -> bool {
        if !frame.is_finite() {
            warn!("Refusing non-finite local frame {:?}", frame);
            return false;
        }
        if frame == self.frame {
            return true;
        }

        self.frame = frame;
        for (id, record) in self.peers.iter_mut() {
            match frame.place(record.last_known_absolute).finite() {
                Some(point) => record.derived_local = point,
                None => warn!(
                    "Position for {} is not finite in frame {:?}, keeping {:?}",
                    id, frame, record.derived_local
                ),
            }
        }
        true
    }

    pub fn get(&self, id: &PeerId) -> Option<&PeerRecord> {
        self.peers.get(id)
    }

    pub fn contains(&self, id: &PeerId) -> bool {
        self.peers.contains_key(id)
    }

    /// All current records.
    pub fn all(&self) -> impl Iterator<Item = &PeerRecord> {
        self.peers.values()
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    /// Owned copy for consumers outside the peer's task.
    pub fn snapshot(&self) -> MeshSnapshot {
        let mut peers: Vec<_> = self.peers.values().cloned().collect();
        peers.sort_by(|a, b| a.id.cmp(&b.id));
        MeshSnapshot {
            local_id: Some(self.local_id.clone()),
            anchor: self.frame.anchor,
            peers,
        }
    }
}
