//! Virtual desktop holding the simulated windows.
//!
//! Windows are tiled on a fixed-size screen and can be dragged, hidden and
//! shown. Every change goes through the window's `SimulatedWindow`, which
//! notifies the node that owns it.

use mesh_core::{Clock, HostEnvironment, HostEvents, ScreenPosition, SimulatedWindow, Viewport};
use rand::Rng;
use tracing::debug;

/// Size of the virtual screen.
pub const SCREEN: Viewport = Viewport::new(1920.0, 1080.0);

/// Largest distance a single drag step moves a window on each axis.
pub const MAX_DRAG_STEP: f64 = 40.0;

/// Origins and viewports for `count` windows tiled on `screen`.
///
/// Windows get a grid cell each, inset by a tenth of the cell on every side.
pub fn tile(count: usize, screen: Viewport) -> Vec<(ScreenPosition, Viewport)> {
    if count == 0 {
        return Vec::new();
    }
    let cols = (count as f64).sqrt().ceil() as usize;
    let rows = count.div_ceil(cols);
    let cell_w = screen.width / cols as f64;
    let cell_h = screen.height / rows as f64;

    (0..count)
        .map(|i| {
            let (col, row) = (i % cols, i / cols);
            let origin = ScreenPosition::new(
                col as f64 * cell_w + cell_w * 0.1,
                row as f64 * cell_h + cell_h * 0.1,
            );
            (origin, Viewport::new(cell_w * 0.8, cell_h * 0.8))
        })
        .collect()
}

pub struct Desktop {
    screen: Viewport,
    windows: Vec<SimulatedWindow>,
}

impl Desktop {
    pub fn new(screen: Viewport) -> Self {
        Self {
            screen,
            windows: Vec::new(),
        }
    }

    /// Open a visible window. The returned events go to the window's node.
    pub fn open(
        &mut self,
        origin: ScreenPosition,
        viewport: Viewport,
        clock: Clock,
    ) -> (SimulatedWindow, HostEvents) {
        let (window, events) = SimulatedWindow::new(origin, viewport, clock);
        self.windows.push(window.clone());
        (window, events)
    }

    pub fn windows(&self) -> &[SimulatedWindow] {
        &self.windows
    }

    pub fn len(&self) -> usize {
        self.windows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }

    /// Move window `index` by a random step, keeping it on screen.
    pub fn drag<R: Rng + ?Sized>(&self, index: usize, rng: &mut R) -> Option<ScreenPosition> {
        let window = self.windows.get(index)?;
        let origin = window.window_origin();
        let viewport = window.viewport();
        let max_x = (self.screen.width - viewport.width).max(0.0);
        let max_y = (self.screen.height - viewport.height).max(0.0);

        let next = ScreenPosition::new(
            (origin.x + rng.random_range(-MAX_DRAG_STEP..=MAX_DRAG_STEP)).clamp(0.0, max_x),
            (origin.y + rng.random_range(-MAX_DRAG_STEP..=MAX_DRAG_STEP)).clamp(0.0, max_y),
        );
        window.move_to(next);
        debug!("Window {} dragged to ({:.0}, {:.0})", index, next.x, next.y);
        Some(next)
    }

    /// Flip visibility of window `index`. Returns the new state.
    pub fn toggle_visibility(&self, index: usize) -> Option<bool> {
        let window = self.windows.get(index)?;
        let visible = !window.is_visible();
        window.set_visible(visible);
        debug!(
            "Window {} {}",
            index,
            if visible { "shown" } else { "hidden" }
        );
        Some(visible)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mesh_core::HostEvent;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn test_tile_fits_screen() {
        for count in 1..=16 {
            let tiles = tile(count, SCREEN);
            assert_eq!(tiles.len(), count);
            for (origin, viewport) in tiles {
                assert!(origin.x >= 0.0 && origin.y >= 0.0);
                assert!(origin.x + viewport.width <= SCREEN.width);
                assert!(origin.y + viewport.height <= SCREEN.height);
            }
        }
    }

    #[test]
    fn test_tile_two_side_by_side() {
        let tiles = tile(2, SCREEN);
        assert_eq!(tiles[0].0, ScreenPosition::new(96.0, 108.0));
        assert_eq!(tiles[1].0, ScreenPosition::new(1056.0, 108.0));
        assert_eq!(tiles[0].1, Viewport::new(768.0, 864.0));
    }

    #[test]
    fn test_tile_empty() {
        assert!(tile(0, SCREEN).is_empty());
    }

    #[test]
    fn test_drag_stays_on_screen() {
        let mut desktop = Desktop::new(SCREEN);
        let (_window, _events) = desktop.open(
            ScreenPosition::new(0.0, 0.0),
            Viewport::new(800.0, 600.0),
            Clock::manual(0),
        );
        let mut rng = StdRng::seed_from_u64(7);

        for _ in 0..200 {
            let p = desktop.drag(0, &mut rng).unwrap();
            assert!((0.0..=1120.0).contains(&p.x));
            assert!((0.0..=480.0).contains(&p.y));
        }
        assert_eq!(desktop.drag(1, &mut rng), None);
    }

    #[test]
    fn test_drag_notifies_window_owner() {
        let mut desktop = Desktop::new(SCREEN);
        let (window, mut events) = desktop.open(
            ScreenPosition::new(500.0, 500.0),
            Viewport::new(400.0, 300.0),
            Clock::manual(0),
        );
        let next = desktop.drag(0, &mut StdRng::seed_from_u64(1)).unwrap();
        assert_eq!(window.window_origin(), next);
        assert_eq!(events.try_recv().unwrap(), HostEvent::Moved);
    }

    #[test]
    fn test_toggle_visibility() {
        let mut desktop = Desktop::new(SCREEN);
        let (window, _events) = desktop.open(
            ScreenPosition::new(0.0, 0.0),
            Viewport::new(400.0, 300.0),
            Clock::manual(0),
        );
        assert_eq!(desktop.toggle_visibility(0), Some(false));
        assert!(!window.is_visible());
        assert_eq!(desktop.toggle_visibility(0), Some(true));
        assert_eq!(desktop.toggle_visibility(3), None);
    }
}
