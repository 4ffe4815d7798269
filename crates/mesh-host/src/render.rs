//! Text renderer for a window's view of the mesh.
//!
//! The renderer only reads: it holds a `watch::Receiver<MeshSnapshot>` and
//! never touches the peer table.

use mesh_core::{MeshSnapshot, Point, Viewport};
use std::fmt::Write;
use std::future::Future;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{MissedTickBehavior, interval};

/// Links shorter than this are not drawn.
pub const MIN_LINK_LENGTH: f64 = 10.0;

/// A line from the local anchor to a peer's derived position.
#[derive(Debug, Clone, PartialEq)]
pub struct Link {
    pub peer: String,
    pub from: Point,
    pub to: Point,
}

/// Links worth drawing for `snapshot`.
pub fn links(snapshot: &MeshSnapshot) -> Vec<Link> {
    let anchor = snapshot.anchor.point();
    if !anchor.is_finite() {
        return Vec::new();
    }
    snapshot
        .peers
        .iter()
        .filter(|p| p.derived_local.is_finite())
        .filter(|p| anchor.distance_to(p.derived_local) >= MIN_LINK_LENGTH)
        .map(|p| Link {
            peer: p.id.short().to_string(),
            from: anchor,
            to: p.derived_local,
        })
        .collect()
}

/// Render one frame of text for a window.
pub fn render(
    label: &str,
    snapshot: &MeshSnapshot,
    viewport: Viewport,
    debug_overlay: bool,
) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "[{}] Active connections: {}",
        label,
        snapshot.peer_count()
    );

    if debug_overlay {
        let anchor = snapshot.anchor.point();
        let _ = writeln!(
            out,
            "  Screen: {}x{}",
            viewport.width.round(),
            viewport.height.round()
        );
        let _ = writeln!(out, "  Anchor: ({}, {})", anchor.x.round(), anchor.y.round());
        for peer in &snapshot.peers {
            let p = peer.derived_local;
            let _ = writeln!(
                out,
                "  Peer {}: ({}, {})",
                peer.id.short(),
                p.x.round(),
                p.y.round()
            );
        }
        for link in links(snapshot) {
            let _ = writeln!(
                out,
                "  Link -> {} ({:.0} px)",
                link.peer,
                link.from.distance_to(link.to)
            );
        }
    }
    out
}

/// Print `label`'s view every `every` until `shutdown` resolves or the node goes away.
pub async fn run_renderer<F>(
    label: String,
    mut view: watch::Receiver<MeshSnapshot>,
    viewport: impl Fn() -> Viewport,
    every: Duration,
    debug_overlay: bool,
    shutdown: F,
) where
    F: Future<Output = ()>,
{
    let mut ticker = interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let frame = render(&label, &view.borrow_and_update(), viewport(), debug_overlay);
                print!("{}", frame);
            }
            changed = view.changed() => {
                // Node dropped its sender: nothing left to draw
                if changed.is_err() {
                    break;
                }
            }
            _ = &mut shutdown => break,
        }
    }
}
