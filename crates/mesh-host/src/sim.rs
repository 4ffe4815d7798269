//! A set of mesh nodes, one per simulated window, sharing one hub.

use crate::screen::{Desktop, tile};
use futures::future::join_all;
use mesh_core::{
    Clock, HostEnvironment, LocalHub, MeshConfig, MeshError, MeshNode, MeshSnapshot, NodeSummary,
    PeerId, Subscription, Viewport,
};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

struct Running {
    id: PeerId,
    view: watch::Receiver<MeshSnapshot>,
    task: Option<JoinHandle<NodeSummary>>,
    _subscription: Subscription,
}

pub struct Simulation {
    desktop: Desktop,
    nodes: Vec<Running>,
}

impl Simulation {
    /// Tile `windows` windows on `screen` and start a node for each.
    ///
    /// Must be called from within a tokio runtime.
    pub async fn launch(
        hub: &LocalHub,
        config: &MeshConfig,
        windows: usize,
        screen: Viewport,
        clock: Clock,
    ) -> Result<Self, MeshError> {
        let mut desktop = Desktop::new(screen);
        let mut nodes = Vec::with_capacity(windows);

        for (index, (origin, viewport)) in tile(windows, screen).into_iter().enumerate() {
            let (window, host_events) = desktop.open(origin, viewport, clock.clone());
            let node = MeshNode::join(hub, config.clone(), window).await?;
            let id = node.id().clone();
            info!(
                "Window {} ({}) opened at ({:.0}, {:.0}), {}x{}",
                index,
                id.short(),
                origin.x,
                origin.y,
                viewport.width,
                viewport.height
            );

            let label = id.short().to_string();
            let subscription = node.events().subscribe(move |event| {
                match serde_json::to_string(&event) {
                    Ok(json) => debug!("[{}] {}", label, json),
                    Err(e) => warn!("[{}] Failed to serialize event: {}", label, e),
                }
            });

            let view = node.subscribe();
            let task = tokio::spawn(node.run(host_events, std::future::pending()));
            nodes.push(Running {
                id,
                view,
                task: Some(task),
                _subscription: subscription,
            });
        }

        Ok(Self { desktop, nodes })
    }

    pub fn desktop(&self) -> &Desktop {
        &self.desktop
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn id(&self, index: usize) -> Option<&PeerId> {
        self.nodes.get(index).map(|n| &n.id)
    }

    /// Snapshot receiver for window `index`.
    pub fn view(&self, index: usize) -> Option<watch::Receiver<MeshSnapshot>> {
        self.nodes.get(index).map(|n| n.view.clone())
    }

    /// Windows whose node is still running.
    pub fn alive(&self) -> impl Iterator<Item = usize> + '_ {
        self.nodes
            .iter()
            .enumerate()
            .filter(|(_, n)| n.task.as_ref().is_some_and(|t| !t.is_finished()))
            .map(|(i, _)| i)
    }

    /// Kill window `index`'s node without a disconnect, like a crashed tab.
    pub fn crash(&mut self, index: usize) -> bool {
        let Some(task) = self.nodes.get_mut(index).and_then(|n| n.task.take()) else {
            return false;
        };
        task.abort();
        warn!("Window {} crashed", index);
        true
    }

    /// Unload every window and wait for the nodes to send their disconnects.
    pub async fn shutdown(mut self) -> Vec<NodeSummary> {
        for window in self.desktop.windows() {
            window.unload();
        }

        let tasks: Vec<_> = self.nodes.iter_mut().filter_map(|n| n.task.take()).collect();
        let mut summaries = Vec::with_capacity(tasks.len());
        for result in join_all(tasks).await {
            match result {
                Ok(summary) => summaries.push(summary),
                Err(e) => warn!("Node task failed: {}", e),
            }
        }
        summaries
    }

    /// Current viewport of window `index`.
    pub fn viewport(&self, index: usize) -> Option<Viewport> {
        self.desktop.windows().get(index).map(|w| w.viewport())
    }
}
