//! End-to-end tests for mesh-host.
//!
//! Launches whole simulations on a paused clock and checks what each
//! window ends up seeing.

use std::time::Duration;

use mesh_core::{
    Clock, HostEnvironment, LocalHub, MeshConfig, MeshSnapshot, Point, ScreenPosition, reconcile,
};
use mesh_host::{SCREEN, Simulation, render, tile};
use tokio::sync::watch;
use tokio::time::{sleep, timeout};

// ============================================================================
// Helpers
// ============================================================================

async fn launch(hub: &LocalHub, windows: usize) -> Simulation {
    Simulation::launch(hub, &MeshConfig::default(), windows, SCREEN, Clock::tokio(0))
        .await
        .expect("Failed to launch simulation")
}

/// Wait in virtual time until `view` satisfies `pred`.
async fn wait_until(
    view: &mut watch::Receiver<MeshSnapshot>,
    within: Duration,
    pred: impl FnMut(&MeshSnapshot) -> bool,
) {
    timeout(within, view.wait_for(pred))
        .await
        .expect("Timed out waiting for snapshot")
        .expect("Node stopped");
}

fn expected(sim: &Simulation, observer: usize, other: usize) -> Point {
    let windows = sim.desktop().windows();
    let local = &windows[observer];
    reconcile(
        local.frame().anchor,
        local.window_origin(),
        windows[other].window_origin(),
    )
}

// ============================================================================
// Discovery
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_every_window_sees_every_other() {
    let hub = LocalHub::new();
    let sim = launch(&hub, 4).await;

    for i in 0..sim.len() {
        let mut view = sim.view(i).unwrap();
        wait_until(&mut view, Duration::from_secs(1), |s| s.peer_count() == 3).await;

        let snapshot = view.borrow().clone();
        for j in (0..sim.len()).filter(|&j| j != i) {
            let id = sim.id(j).unwrap();
            let record = snapshot
                .peers
                .iter()
                .find(|p| &p.id == id)
                .expect("Peer missing from view");
            assert_eq!(record.derived_local, expected(&sim, i, j));
        }
    }

    sim.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_tiled_neighbors_positions() {
    let hub = LocalHub::new();
    let sim = launch(&hub, 2).await;
    let mut view = sim.view(0).unwrap();
    wait_until(&mut view, Duration::from_secs(1), |s| s.peer_count() == 1).await;

    // Window 0 at (96, 108) with a 768x864 surface; window 1 at (1056, 108)
    let tiles = tile(2, SCREEN);
    assert_eq!(tiles[1].0, ScreenPosition::new(1056.0, 108.0));
    assert_eq!(
        view.borrow().peers[0].derived_local,
        Point::new(384.0 + 960.0, 432.0)
    );

    sim.shutdown().await;
}

// ============================================================================
// Window activity
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_drag_is_reflected_in_other_views() {
    let hub = LocalHub::new();
    let sim = launch(&hub, 2).await;
    let mut view = sim.view(0).unwrap();
    wait_until(&mut view, Duration::from_secs(1), |s| s.peer_count() == 1).await;

    let mut rng = rand::rng();
    for _ in 0..5 {
        sim.desktop().drag(1, &mut rng);
    }
    let target = expected(&sim, 0, 1);
    wait_until(&mut view, Duration::from_millis(200), |s| {
        s.peers.first().map(|p| p.derived_local) == Some(target)
    })
    .await;

    sim.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_hidden_window_keeps_peers_but_stops_announcing() {
    let hub = LocalHub::new();
    let sim = launch(&hub, 2).await;
    let mut view0 = sim.view(0).unwrap();
    let mut view1 = sim.view(1).unwrap();
    wait_until(&mut view0, Duration::from_secs(1), |s| s.peer_count() == 1).await;

    assert_eq!(sim.desktop().toggle_visibility(1), Some(false));

    // Window 1 goes quiet and is evicted by window 0...
    wait_until(&mut view0, Duration::from_secs(14), |s| s.peer_count() == 0).await;
    // ...while window 1 still hears window 0
    assert_eq!(view1.borrow_and_update().peer_count(), 1);

    assert_eq!(sim.desktop().toggle_visibility(1), Some(true));
    wait_until(&mut view0, Duration::from_millis(50), |s| s.peer_count() == 1).await;

    sim.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_crashed_window_evicted_everywhere() {
    let hub = LocalHub::new();
    let mut sim = launch(&hub, 3).await;
    let mut views: Vec<_> = (0..3).map(|i| sim.view(i).unwrap()).collect();
    for view in &mut views {
        wait_until(view, Duration::from_secs(1), |s| s.peer_count() == 2).await;
    }

    assert!(sim.crash(2));
    sleep(Duration::from_secs(5)).await;
    assert_eq!(views[0].borrow().peer_count(), 2);

    for view in &mut views[..2] {
        wait_until(view, Duration::from_secs(9), |s| s.peer_count() == 1).await;
    }
    assert_eq!(sim.alive().collect::<Vec<_>>(), vec![0, 1]);

    let summaries = sim.shutdown().await;
    assert_eq!(summaries.len(), 2);
    assert!(summaries.iter().all(|s| s.peers_evicted == 1));
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_disconnects_promptly() {
    let hub = LocalHub::new();
    let sim = launch(&hub, 3).await;
    let mut view = sim.view(0).unwrap();
    wait_until(&mut view, Duration::from_secs(1), |s| s.peer_count() == 2).await;

    let summaries = timeout(Duration::from_millis(100), sim.shutdown())
        .await
        .expect("Shutdown took too long");
    assert_eq!(summaries.len(), 3);
    assert!(summaries.iter().all(|s| s.announcements_sent > 0));
    assert_eq!(hub.endpoint_count("window-mesh"), 0);
}

// ============================================================================
// Rendering
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_render_live_view() {
    let hub = LocalHub::new();
    let sim = launch(&hub, 2).await;
    let mut view = sim.view(0).unwrap();
    wait_until(&mut view, Duration::from_secs(1), |s| s.peer_count() == 1).await;

    let viewport = sim.viewport(0).unwrap();
    let text = render("w0", &view.borrow(), viewport, true);
    assert!(text.starts_with("[w0] Active connections: 1\n"));
    assert!(text.contains("Screen: 768x864"));
    assert!(text.contains(&format!("Peer {}:", sim.id(1).unwrap().short())));
    assert!(text.contains("Link ->"));

    sim.shutdown().await;
}
