//! Coordinate types and the position reconciler.
//!
//! Two coordinate spaces are in play:
//! - **Screen space**: absolute positions on the shared physical display,
//!   as reported by the host for each window's origin.
//! - **Surface space**: a peer's own drawing surface, where its local anchor
//!   sits at the center.
//!
//! [`reconcile`] maps a remote window's screen position into local surface
//! space using the physical offset between the two window origins.

use serde::{Deserialize, Serialize};
use std::ops::{Add, Sub};

/// A point in a peer's drawing-surface coordinate space.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }

    /// Returns `Some(self)` only if both components are finite.
    pub fn finite(self) -> Option<Self> {
        self.is_finite().then_some(self)
    }

    pub fn distance_to(&self, other: Point) -> f64 {
        ((other.x - self.x).powi(2) + (other.y - self.y).powi(2)).sqrt()
    }
}

/// Componentwise difference between two screen positions.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Offset {
    pub dx: f64,
    pub dy: f64,
}

impl Add<Offset> for Point {
    type Output = Point;

    fn add(self, offset: Offset) -> Point {
        Point::new(self.x + offset.dx, self.y + offset.dy)
    }
}

/// Absolute on-screen position of a window origin.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ScreenPosition {
    pub x: f64,
    pub y: f64,
}

impl ScreenPosition {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

impl Sub for ScreenPosition {
    type Output = Offset;

    fn sub(self, rhs: ScreenPosition) -> Offset {
        Offset {
            dx: self.x - rhs.x,
            dy: self.y - rhs.y,
        }
    }
}

/// Size of a peer's drawing surface.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
}

impl Viewport {
    pub const fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

/// The local peer's reference point in its own surface space.
///
/// Always derived from the viewport, never stored independently of it.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct LocalAnchor(pub Point);

impl LocalAnchor {
    /// Anchor at the midpoint of the viewport.
    pub fn centered(viewport: Viewport) -> Self {
        Self(Point::new(viewport.width / 2.0, viewport.height / 2.0))
    }

    pub fn point(&self) -> Point {
        self.0
    }
}

/// Everything on the local side that reconciliation depends on.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LocalFrame {
    pub anchor: LocalAnchor,
    pub origin: ScreenPosition,
}

impl LocalFrame {
    pub fn new(anchor: LocalAnchor, origin: ScreenPosition) -> Self {
        Self { anchor, origin }
    }

    /// Frame for a window at `origin` with the given viewport.
    pub fn from_window(viewport: Viewport, origin: ScreenPosition) -> Self {
        Self::new(LocalAnchor::centered(viewport), origin)
    }

    pub fn is_finite(&self) -> bool {
        self.anchor.point().is_finite() && self.origin.is_finite()
    }

    /// Map a remote window origin into this frame.
    pub fn place(&self, remote: ScreenPosition) -> Point {
        reconcile(self.anchor, self.origin, remote)
    }
}

/// Place a remote window in local surface space.
///
/// Returns `local_anchor + (remote_absolute - local_absolute)`. The result
/// tracks the physical displacement between the two window origins, so it
/// stays correct when either window is dragged, as long as fresh absolute
/// positions are supplied.
pub fn reconcile(
    local_anchor: LocalAnchor,
    local_absolute: ScreenPosition,
    remote_absolute: ScreenPosition,
) -> Point {
    local_anchor.point() + (remote_absolute - local_absolute)
}
