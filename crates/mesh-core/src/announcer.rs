//! Position announcements.
//!
//! The announcer decides *when* to broadcast; the node does the sending.
//! Triggers:
//! - periodic tick, only while the window is visible
//! - local resize or window move, only while visible
//! - hidden → visible transition, immediately
//! - shutdown: a best-effort disconnect
//!
//! A hidden window never announces, so no peer sees geometry the host may
//! not report reliably while the window is in the background.

use crate::PeerId;
use crate::geometry::ScreenPosition;
use crate::protocol::MeshMessage;
use tracing::debug;

/// What caused an announcement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    Startup,
    Tick,
    Resize,
    Moved,
    Shown,
}

/// Announcement state machine for one peer.
#[derive(Debug)]
pub struct Announcer {
    id: PeerId,
    visible: bool,
    sent: u64,
    shut_down: bool,
}

impl Announcer {
    pub fn new(id: PeerId, visible: bool) -> Self {
        Self {
            id,
            visible,
            sent: 0,
            shut_down: false,
        }
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    /// Position announcements produced so far.
    pub fn announcements_sent(&self) -> u64 {
        self.sent
    }

    /// Initial announcement when the peer comes up.
    pub fn on_start(&mut self, origin: ScreenPosition) -> Option<MeshMessage> {
        self.announce(origin, Trigger::Startup)
    }

    /// Periodic announcement.
    pub fn on_tick(&mut self, origin: ScreenPosition) -> Option<MeshMessage> {
        self.announce(origin, Trigger::Tick)
    }

    /// The drawing surface was resized.
    pub fn on_resize(&mut self, origin: ScreenPosition) -> Option<MeshMessage> {
        self.announce(origin, Trigger::Resize)
    }

    /// The window origin moved on screen.
    pub fn on_move(&mut self, origin: ScreenPosition) -> Option<MeshMessage> {
        self.announce(origin, Trigger::Moved)
    }

    /// Visibility changed. Announces only on hidden → visible.
    pub fn on_visibility(&mut self, visible: bool, origin: ScreenPosition) -> Option<MeshMessage> {
        let was_visible = std::mem::replace(&mut self.visible, visible);
        if visible && !was_visible {
            debug!("Window visible again, re-announcing");
            self.announce(origin, Trigger::Shown)
        } else {
            None
        }
    }

    /// Final disconnect. Returns `None` if already shut down.
    pub fn on_shutdown(&mut self) -> Option<MeshMessage> {
        if std::mem::replace(&mut self.shut_down, true) {
            return None;
        }
        Some(MeshMessage::disconnect(self.id.clone()))
    }

    fn announce(&mut self, origin: ScreenPosition, trigger: Trigger) -> Option<MeshMessage> {
        if self.shut_down || !self.visible {
            return None;
        }
        if !origin.is_finite() {
            debug!("Skipping {:?} announcement: origin {:?} not finite", trigger, origin);
            return None;
        }
        self.sent += 1;
        Some(MeshMessage::position_update(self.id.clone(), origin))
    }
}
