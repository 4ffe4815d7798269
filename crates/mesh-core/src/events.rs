//! Membership events and the bus that carries them.
//!
//! `MeshEvent`s describe changes to a peer's view of the mesh; they are
//! for monitoring and never feed back into the protocol. `EventBus` is
//! shared behind an `Arc` and is safe to emit from any task.

use crate::PeerId;
use crate::geometry::{LocalAnchor, Point};
use serde::Serialize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock, Weak};

/// Why a peer left the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum LeaveReason {
    /// Peer sent a disconnect message
    Disconnected,
    /// No announcement within the staleness timeout
    TimedOut,
}

/// Events emitted by a mesh node.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum MeshEvent {
    /// First accepted announcement from a peer.
    PeerJoined {
        #[serde(rename = "peerId")]
        peer_id: PeerId,
        position: Point,
        /// Milliseconds since Unix epoch.
        timestamp: u64,
    },
    /// A peer was removed from the table.
    PeerLeft {
        #[serde(rename = "peerId")]
        peer_id: PeerId,
        reason: LeaveReason,
        /// Milliseconds since Unix epoch.
        timestamp: u64,
    },
    /// The local anchor or window origin changed and positions were recomputed.
    FrameChanged {
        anchor: LocalAnchor,
        /// Milliseconds since Unix epoch.
        timestamp: u64,
    },
}

/// Subscription handle that unsubscribes automatically when dropped.
///
/// Hold this value to keep receiving events, drop it to unsubscribe.
pub struct Subscription {
    bus: Weak<EventBus>,
    id: usize,
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(bus) = self.bus.upgrade() {
            bus.unsubscribe(self.id);
        }
    }
}

type Callback = Arc<dyn Fn(MeshEvent) + Send + Sync>;

/// Event bus for publishing mesh events to subscribers.
///
/// Wrap in `Arc` to enable subscriptions.
#[derive(Default)]
pub struct EventBus {
    callbacks: RwLock<Vec<(usize, Callback)>>,
    next_id: AtomicUsize,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to events. Returns `Subscription` that unsubscribes on drop.
    pub fn subscribe(
        self: &Arc<Self>,
        callback: impl Fn(MeshEvent) + Send + Sync + 'static,
    ) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.callbacks
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push((id, Arc::new(callback)));
        Subscription {
            bus: Arc::downgrade(self),
            id,
        }
    }

    fn unsubscribe(&self, id: usize) {
        // try_write: Drop may run during unwinding while emit holds a read lock
        if let Ok(mut guard) = self.callbacks.try_write() {
            guard.retain(|(i, _)| *i != id);
        }
    }

    /// Emit an event to all subscribers.
    pub fn emit(&self, event: MeshEvent) {
        // Clone the list so a callback may subscribe without deadlocking
        let callbacks: Vec<_> = self
            .callbacks
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .map(|(_, cb)| Arc::clone(cb))
            .collect();

        for callback in callbacks {
            callback(event.clone());
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.callbacks
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }
}
