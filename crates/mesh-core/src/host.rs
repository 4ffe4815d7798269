//! Host environment abstraction.
//!
//! The host supplies everything a peer learns about its own window: a wall
//! clock, the absolute window origin, the drawing surface size and whether
//! the window is visible. Geometry is volatile and is re-read on every use.
//!
//! `SimulatedWindow` is an in-memory host for native runs and tests.

use crate::geometry::{LocalFrame, ScreenPosition, Viewport};
use crate::peers::Timestamp;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use tokio::sync::mpsc;
use tracing::debug;
use web_time::{SystemTime, UNIX_EPOCH};

/// Window-level notifications delivered to a running node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostEvent {
    /// Drawing surface size changed
    Resized,
    /// Window origin moved on screen
    Moved,
    /// Window was shown or hidden
    VisibilityChanged,
    /// Window is about to go away
    BeforeUnload,
}

pub type HostEvents = mpsc::UnboundedReceiver<HostEvent>;

pub trait HostEnvironment: Send + Sync {
    /// Wall clock, milliseconds since Unix epoch.
    fn now_ms(&self) -> Timestamp;

    /// Absolute on-screen origin of the window.
    fn window_origin(&self) -> ScreenPosition;

    /// Current drawing surface size.
    fn viewport(&self) -> Viewport;

    fn is_visible(&self) -> bool;

    /// Local frame derived from the current geometry.
    fn frame(&self) -> LocalFrame {
        LocalFrame::from_window(self.viewport(), self.window_origin())
    }
}

/// Milliseconds since Unix epoch from the system clock.
pub fn system_now_ms() -> Timestamp {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Time source for a simulated window.
#[derive(Debug, Clone)]
pub enum Clock {
    /// System wall clock
    System,
    /// Set explicitly by the test
    Manual(Arc<AtomicU64>),
    /// Follows tokio's clock from a fixed base, so paused-time tests see it advance
    Tokio {
        base_ms: Timestamp,
        started: tokio::time::Instant,
    },
}

impl Clock {
    pub fn manual(start_ms: Timestamp) -> Self {
        Self::Manual(Arc::new(AtomicU64::new(start_ms)))
    }

    pub fn tokio(base_ms: Timestamp) -> Self {
        Self::Tokio {
            base_ms,
            started: tokio::time::Instant::now(),
        }
    }

    pub fn now_ms(&self) -> Timestamp {
        match self {
            Self::System => system_now_ms(),
            Self::Manual(ms) => ms.load(Ordering::SeqCst),
            Self::Tokio { base_ms, started } => base_ms + started.elapsed().as_millis() as u64,
        }
    }

    /// Move a manual clock forward. No-op for other clocks.
    pub fn advance(&self, ms: u64) {
        if let Self::Manual(now) = self {
            now.fetch_add(ms, Ordering::SeqCst);
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct WindowState {
    origin: ScreenPosition,
    viewport: Viewport,
    visible: bool,
}

/// In-memory window on a shared virtual screen.
///
/// Clones share the same window. Mutators update the geometry first and
/// then notify the attached node, mirroring how a real host fires events
/// after the change is observable.
#[derive(Clone)]
pub struct SimulatedWindow {
    state: Arc<RwLock<WindowState>>,
    clock: Clock,
    events: mpsc::UnboundedSender<HostEvent>,
}

impl SimulatedWindow {
    /// Create a visible window. The receiver goes to the node's run loop.
    pub fn new(origin: ScreenPosition, viewport: Viewport, clock: Clock) -> (Self, HostEvents) {
        let (events, rx) = mpsc::unbounded_channel();
        let window = Self {
            state: Arc::new(RwLock::new(WindowState {
                origin,
                viewport,
                visible: true,
            })),
            clock,
            events,
        };
        (window, rx)
    }

    pub fn clock(&self) -> &Clock {
        &self.clock
    }

    pub fn move_to(&self, origin: ScreenPosition) {
        self.write(|s| s.origin = origin);
        self.notify(HostEvent::Moved);
    }

    pub fn resize(&self, viewport: Viewport) {
        self.write(|s| s.viewport = viewport);
        self.notify(HostEvent::Resized);
    }

    pub fn set_visible(&self, visible: bool) {
        let changed = self.write(|s| std::mem::replace(&mut s.visible, visible) != visible);
        if changed {
            self.notify(HostEvent::VisibilityChanged);
        }
    }

    /// Signal that the window is closing.
    pub fn unload(&self) {
        self.notify(HostEvent::BeforeUnload);
    }

    fn write<R>(&self, f: impl FnOnce(&mut WindowState) -> R) -> R {
        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        f(&mut state)
    }

    fn read(&self) -> WindowState {
        *self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    fn notify(&self, event: HostEvent) {
        if self.events.send(event).is_err() {
            debug!("No node attached for {:?}", event);
        }
    }
}

impl HostEnvironment for SimulatedWindow {
    fn now_ms(&self) -> Timestamp {
        self.clock.now_ms()
    }

    fn window_origin(&self) -> ScreenPosition {
        self.read().origin
    }

    fn viewport(&self) -> Viewport {
        self.read().viewport
    }

    fn is_visible(&self) -> bool {
        self.read().visible
    }
}
