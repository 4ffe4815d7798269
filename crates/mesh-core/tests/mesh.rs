//! End-to-end tests for mesh-core.
//!
//! Runs several nodes on one hub with tokio's clock paused, so announce and
//! reap timers fire deterministically.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use mesh_core::{
    BroadcastTransport, Clock, EventBus, LeaveReason, LocalHub, MeshConfig, MeshError,
    MeshEvent, MeshNode, MeshSnapshot, NodeSummary, PeerId, Point, ScreenPosition,
    SimulatedWindow, Viewport,
};
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};

const BASE_MS: u64 = 1_700_000_000_000;

/// A running node plus the handles a test needs to poke at it.
struct TestWindow {
    host: SimulatedWindow,
    id: PeerId,
    view: watch::Receiver<MeshSnapshot>,
    seen: Arc<Mutex<Vec<MeshEvent>>>,
    _events: Arc<EventBus>,
    _subscription: mesh_core::Subscription,
    stop: Option<oneshot::Sender<()>>,
    task: JoinHandle<NodeSummary>,
}

impl TestWindow {
    async fn open(hub: &LocalHub, x: f64, y: f64) -> Self {
        Self::open_with(hub, x, y, true).await
    }

    async fn open_with(hub: &LocalHub, x: f64, y: f64, visible: bool) -> Self {
        let (host, host_events) = SimulatedWindow::new(
            ScreenPosition::new(x, y),
            Viewport::new(1000.0, 800.0),
            Clock::tokio(BASE_MS),
        );
        if !visible {
            host.set_visible(false);
        }

        let node = MeshNode::join(hub, MeshConfig::default(), host.clone())
            .await
            .expect("Failed to join mesh");
        let id = node.id().clone();
        let view = node.subscribe();

        let events = node.events();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = Arc::clone(&seen);
        let subscription = events.subscribe(move |event| {
            seen_clone.lock().unwrap().push(event);
        });

        let (stop, stopped) = oneshot::channel::<()>();
        let task = tokio::spawn(node.run(host_events, async move {
            let _ = stopped.await;
        }));

        Self {
            host,
            id,
            view,
            seen,
            _events: events,
            _subscription: subscription,
            stop: Some(stop),
            task,
        }
    }

    /// Wait until the snapshot satisfies `pred`, in virtual time.
    async fn wait_for(&mut self, within: Duration, pred: impl FnMut(&MeshSnapshot) -> bool) {
        timeout(within, self.view.wait_for(pred))
            .await
            .expect("Timed out waiting for snapshot")
            .expect("Node dropped its snapshot sender");
    }

    fn position_of(&self, peer: &PeerId) -> Option<Point> {
        self.view
            .borrow()
            .peers
            .iter()
            .find(|p| &p.id == peer)
            .map(|p| p.derived_local)
    }

    fn peer_count(&self) -> usize {
        self.view.borrow().peer_count()
    }

    async fn close(mut self) -> NodeSummary {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        self.task.await.expect("Node task panicked")
    }

    /// Kill the node without letting it say goodbye.
    async fn crash(self) {
        self.task.abort();
        let _ = self.task.await;
    }
}

#[tokio::test(start_paused = true)]
async fn test_two_windows_discover_each_other() {
    let hub = LocalHub::new();
    let mut a = TestWindow::open(&hub, 100.0, 100.0).await;
    let mut b = TestWindow::open(&hub, 150.0, 80.0).await;

    let b_id = b.id.clone();
    let a_id = a.id.clone();
    a.wait_for(Duration::from_millis(500), |s| s.peer_count() == 1).await;
    b.wait_for(Duration::from_millis(500), |s| s.peer_count() == 1).await;

    assert_eq!(a.position_of(&b_id), Some(Point::new(550.0, 380.0)));
    assert_eq!(b.position_of(&a_id), Some(Point::new(450.0, 420.0)));

    assert!(matches!(
        a.seen.lock().unwrap().first(),
        Some(MeshEvent::PeerJoined { peer_id, .. }) if *peer_id == b_id
    ));

    a.close().await;
    b.close().await;
}

#[tokio::test(start_paused = true)]
async fn test_disconnect_removes_peer_without_waiting_for_timeout() {
    let hub = LocalHub::new();
    let mut a = TestWindow::open(&hub, 0.0, 0.0).await;
    let b = TestWindow::open(&hub, 500.0, 0.0).await;
    a.wait_for(Duration::from_millis(500), |s| s.peer_count() == 1).await;

    let summary = b.close().await;
    assert!(summary.announcements_sent >= 1);

    // Far less than the 10s staleness timeout
    a.wait_for(Duration::from_millis(50), |s| s.peer_count() == 0).await;
    assert!(a.seen.lock().unwrap().iter().any(|e| matches!(
        e,
        MeshEvent::PeerLeft {
            reason: LeaveReason::Disconnected,
            ..
        }
    )));

    a.close().await;
}

#[tokio::test(start_paused = true)]
async fn test_crashed_peer_evicted_after_timeout() {
    let hub = LocalHub::new();
    let mut a = TestWindow::open(&hub, 0.0, 0.0).await;
    let b = TestWindow::open(&hub, 500.0, 0.0).await;
    let b_id = b.id.clone();
    a.wait_for(Duration::from_millis(500), |s| s.peer_count() == 1).await;

    b.crash().await;

    // Still tracked well inside the timeout
    sleep(Duration::from_secs(5)).await;
    assert_eq!(a.peer_count(), 1);

    // Gone within timeout + one reap interval
    a.wait_for(Duration::from_secs(9), |s| s.peer_count() == 0).await;
    assert!(a.seen.lock().unwrap().iter().any(|e| matches!(
        e,
        MeshEvent::PeerLeft {
            peer_id,
            reason: LeaveReason::TimedOut,
            ..
        } if *peer_id == b_id
    )));

    let summary = a.close().await;
    assert_eq!(summary.peers_evicted, 1);
    assert_eq!(summary.peers_at_exit, 0);
}

#[tokio::test(start_paused = true)]
async fn test_hidden_window_announces_only_when_shown() {
    let hub = LocalHub::new();
    let mut a = TestWindow::open(&hub, 0.0, 0.0).await;
    let c = TestWindow::open_with(&hub, 300.0, 200.0, false).await;

    sleep(Duration::from_secs(2)).await;
    assert_eq!(a.peer_count(), 0);

    c.host.set_visible(true);
    a.wait_for(Duration::from_millis(50), |s| s.peer_count() == 1).await;
    assert_eq!(a.position_of(&c.id), Some(Point::new(800.0, 600.0)));

    a.close().await;
    c.close().await;
}

#[tokio::test(start_paused = true)]
async fn test_resize_recenters_existing_peers() {
    let hub = LocalHub::new();
    let mut a = TestWindow::open(&hub, 100.0, 100.0).await;
    let b = TestWindow::open(&hub, 150.0, 80.0).await;
    let b_id = b.id.clone();
    a.wait_for(Duration::from_millis(500), |s| s.peer_count() == 1).await;

    a.host.resize(Viewport::new(1280.0, 720.0));
    a.wait_for(Duration::from_millis(50), |s| {
        s.anchor.point() == Point::new(640.0, 360.0)
    })
    .await;
    assert_eq!(a.position_of(&b_id), Some(Point::new(690.0, 340.0)));

    a.close().await;
    b.close().await;
}

#[tokio::test(start_paused = true)]
async fn test_remote_drag_tracked() {
    let hub = LocalHub::new();
    let mut a = TestWindow::open(&hub, 0.0, 0.0).await;
    let b = TestWindow::open(&hub, 200.0, 0.0).await;
    let b_id = b.id.clone();
    a.wait_for(Duration::from_millis(500), |s| s.peer_count() == 1).await;

    b.host.move_to(ScreenPosition::new(-400.0, 300.0));
    let target = Point::new(100.0, 700.0);
    a.wait_for(Duration::from_millis(50), |s| {
        s.peers.first().map(|p| p.derived_local) == Some(target)
    })
    .await;
    assert_eq!(a.position_of(&b_id), Some(target));

    a.close().await;
    b.close().await;
}

#[tokio::test(start_paused = true)]
async fn test_garbage_on_channel_does_not_disturb_mesh() {
    let hub = LocalHub::new();
    let mut a = TestWindow::open(&hub, 0.0, 0.0).await;
    let noise = hub.open("window-mesh").unwrap();
    noise.broadcast(b"not json").await.unwrap();
    noise.broadcast(br#"{"type":"ping","id":"x"}"#).await.unwrap();
    noise
        .broadcast(br#"{"type":"position_update","id":"zz9","screenX":10,"screenY":20}"#)
        .await
        .unwrap();

    a.wait_for(Duration::from_millis(50), |s| s.peer_count() == 1).await;
    let summary = a.close().await;
    assert_eq!(summary.dispatch.malformed, 1);
    assert_eq!(summary.dispatch.unknown, 1);
}

#[tokio::test(start_paused = true)]
async fn test_separate_channels_are_isolated() {
    let hub = LocalHub::new();
    let mut a = TestWindow::open(&hub, 0.0, 0.0).await;

    let (host, host_events) = SimulatedWindow::new(
        ScreenPosition::new(10.0, 10.0),
        Viewport::new(800.0, 600.0),
        Clock::tokio(BASE_MS),
    );
    let config = MeshConfig {
        channel: "other-mesh".to_string(),
        ..Default::default()
    };
    let other = MeshNode::join(&hub, config, host).await.unwrap();
    let (stop, stopped) = oneshot::channel::<()>();
    let task = tokio::spawn(other.run(host_events, async move {
        let _ = stopped.await;
    }));

    sleep(Duration::from_secs(1)).await;
    assert_eq!(a.peer_count(), 0);

    let _ = stop.send(());
    task.await.unwrap();
    a.close().await;
}

#[tokio::test]
async fn test_unavailable_broadcast_fails_startup() {
    let (host, _events) = SimulatedWindow::new(
        ScreenPosition::new(0.0, 0.0),
        Viewport::new(800.0, 600.0),
        Clock::manual(BASE_MS),
    );
    let result = MeshNode::join(&LocalHub::unavailable(), MeshConfig::default(), host).await;
    assert!(matches!(result, Err(MeshError::TransportUnavailable(_))));
}
