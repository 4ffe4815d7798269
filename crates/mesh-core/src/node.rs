//! A single mesh peer.
//!
//! `MeshNode` owns the peer table and every component that touches it.
//! [`MeshNode::run`] drives them from one `tokio::select!` loop, so message
//! handling, timers and host events never interleave within a peer.
//!
//! The step methods (`handle_frame`, `announce_tick`, `reap_tick`,
//! `handle_host_event`) are what the loop calls; they are public so the
//! same behavior can be exercised without timers.

use crate::PeerId;
use crate::announcer::{Announcer, Trigger};
use crate::channel::{LocalChannel, LocalHub};
use crate::config::{ConfigError, MeshConfig};
use crate::dispatcher::{Dispatch, DispatchStats, Dispatcher};
use crate::events::{EventBus, LeaveReason, MeshEvent};
use crate::host::{HostEnvironment, HostEvent, HostEvents};
use crate::peers::{MeshSnapshot, PeerTable, Upsert};
use crate::protocol::MeshMessage;
use crate::reaper::Reaper;
use crate::transport::BroadcastTransport;
use std::future::Future;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::watch;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum MeshError {
    #[error("Broadcast transport unavailable: {0}")]
    TransportUnavailable(String),
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),
}

/// Whether the run loop should keep going after a host event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Stop,
}

/// Counters reported when a node shuts down.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeSummary {
    pub id: PeerId,
    pub announcements_sent: u64,
    pub dispatch: DispatchStats,
    pub peers_evicted: u64,
    pub peers_at_exit: usize,
}

pub struct MeshNode<T: BroadcastTransport, H: HostEnvironment> {
    config: MeshConfig,
    table: PeerTable,
    announcer: Announcer,
    reaper: Reaper,
    dispatcher: Dispatcher,
    transport: T,
    host: H,
    events: Arc<EventBus>,
    snapshot: watch::Sender<MeshSnapshot>,
}

impl<H: HostEnvironment> MeshNode<LocalChannel, H> {
    /// Open the configured channel on `hub` and start a node with a fresh id.
    ///
    /// Fails if the hub cannot provide a broadcast channel: without one the
    /// node could never discover anyone.
    pub async fn join(hub: &LocalHub, config: MeshConfig, host: H) -> Result<Self, MeshError> {
        config.validate()?;
        let transport = hub
            .open(&config.channel)
            .map_err(|e| MeshError::TransportUnavailable(e.to_string()))?;
        Self::start(config, transport, host).await
    }
}

impl<T: BroadcastTransport, H: HostEnvironment> MeshNode<T, H> {
    /// Start a node with a freshly generated id.
    pub async fn start(config: MeshConfig, transport: T, host: H) -> Result<Self, MeshError> {
        Self::start_with_id(PeerId::generate(), config, transport, host).await
    }

    /// Start a node and send its first announcement.
    pub async fn start_with_id(
        id: PeerId,
        config: MeshConfig,
        transport: T,
        host: H,
    ) -> Result<Self, MeshError> {
        config.validate()?;
        if transport.is_closed() {
            return Err(MeshError::TransportUnavailable(
                "transport already closed".to_string(),
            ));
        }

        let table = PeerTable::new(id.clone(), host.frame());
        let (snapshot, _) = watch::channel(table.snapshot());
        let mut node = Self {
            reaper: Reaper::new(&config.liveness),
            announcer: Announcer::new(id.clone(), host.is_visible()),
            config,
            table,
            dispatcher: Dispatcher::new(),
            transport,
            host,
            events: Arc::new(EventBus::new()),
            snapshot,
        };

        info!("Peer initialized with ID: {}", id);
        let origin = node.host.window_origin();
        if let Some(message) = node.announcer.on_start(origin) {
            node.send(&message).await;
        }
        Ok(node)
    }

    pub fn id(&self) -> &PeerId {
        self.table.local_id()
    }

    pub fn config(&self) -> &MeshConfig {
        &self.config
    }

    /// Read-only access to the peer table.
    pub fn table(&self) -> &PeerTable {
        &self.table
    }

    pub fn events(&self) -> Arc<EventBus> {
        Arc::clone(&self.events)
    }

    /// Receiver of table snapshots, updated after every change.
    pub fn subscribe(&self) -> watch::Receiver<MeshSnapshot> {
        self.snapshot.subscribe()
    }

    /// Handle one frame from the transport.
    pub fn handle_frame(&mut self, data: &[u8]) -> Dispatch {
        self.refresh_frame();
        let now = self.host.now_ms();
        let result = self.dispatcher.dispatch(&mut self.table, data, now);

        match &result {
            Dispatch::Upserted {
                id,
                outcome: Upsert::Joined,
            } => {
                if let Some(record) = self.table.get(id) {
                    info!("Peer {} joined at {:?}", id, record.derived_local);
                    self.events.emit(MeshEvent::PeerJoined {
                        peer_id: id.clone(),
                        position: record.derived_local,
                        timestamp: now,
                    });
                }
            }
            Dispatch::Removed(record) => {
                info!("Peer {} left", record.id);
                self.events.emit(MeshEvent::PeerLeft {
                    peer_id: record.id.clone(),
                    reason: LeaveReason::Disconnected,
                    timestamp: now,
                });
            }
            _ => {}
        }

        self.publish();
        result
    }

    /// Periodic announcement.
    pub async fn announce_tick(&mut self) {
        self.refresh_frame();
        self.announce(Trigger::Tick).await;
    }

    /// Periodic reaping. Returns the evicted ids.
    pub fn reap_tick(&mut self) -> Vec<PeerId> {
        let now = self.host.now_ms();
        let evicted = self.reaper.reap(&mut self.table, now);
        for peer_id in &evicted {
            self.events.emit(MeshEvent::PeerLeft {
                peer_id: peer_id.clone(),
                reason: LeaveReason::TimedOut,
                timestamp: now,
            });
        }
        if !evicted.is_empty() {
            self.publish();
        }
        evicted
    }

    /// React to a window-level event from the host.
    pub async fn handle_host_event(&mut self, event: HostEvent) -> Flow {
        debug!("Host event: {:?}", event);
        let trigger = match event {
            HostEvent::Resized => Trigger::Resize,
            HostEvent::Moved => Trigger::Moved,
            HostEvent::VisibilityChanged => Trigger::Shown,
            HostEvent::BeforeUnload => return Flow::Stop,
        };
        self.refresh_frame();
        self.announce(trigger).await;
        Flow::Continue
    }

    /// Send the best-effort disconnect and close the transport.
    ///
    /// Safe to call more than once.
    pub async fn shutdown(&mut self) -> NodeSummary {
        if let Some(message) = self.announcer.on_shutdown() {
            self.send(&message).await;
            info!("Peer {} disconnecting", self.id());
        }
        self.transport.close();
        self.summary()
    }

    pub fn summary(&self) -> NodeSummary {
        NodeSummary {
            id: self.id().clone(),
            announcements_sent: self.announcer.announcements_sent(),
            dispatch: self.dispatcher.stats(),
            peers_evicted: self.reaper.total_evicted(),
            peers_at_exit: self.table.len(),
        }
    }

    /// Run until `shutdown` resolves, the host unloads, or the transport closes.
    ///
    /// Timers live inside this call and are dropped before it returns, so
    /// nothing touches the table after shutdown.
    pub async fn run<F>(mut self, mut host_events: HostEvents, shutdown: F) -> NodeSummary
    where
        F: Future<Output = ()>,
    {
        let liveness = self.config.liveness;
        let start = Instant::now();
        let mut announce = interval_at(
            start + liveness.announce_interval,
            liveness.announce_interval,
        );
        announce.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut reap = interval_at(start + liveness.reap_interval, liveness.reap_interval);
        reap.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tokio::pin!(shutdown);
        let mut host_attached = true;

        loop {
            tokio::select! {
                frame = self.transport.recv() => match frame {
                    Some(data) => {
                        self.handle_frame(&data);
                    }
                    None => {
                        warn!("Transport closed under peer {}, stopping", self.id());
                        break;
                    }
                },
                _ = announce.tick() => self.announce_tick().await,
                _ = reap.tick() => {
                    self.reap_tick();
                }
                event = host_events.recv(), if host_attached => match event {
                    Some(event) => {
                        if self.handle_host_event(event).await == Flow::Stop {
                            info!("Window unloading");
                            break;
                        }
                    }
                    None => {
                        debug!("Host event channel closed");
                        host_attached = false;
                    }
                },
                _ = &mut shutdown => {
                    info!("Shutdown requested");
                    break;
                }
            }
        }

        drop(announce);
        drop(reap);
        self.shutdown().await
    }

    /// Announce for `trigger`, gated on the host's visibility right now.
    ///
    /// Visibility events may still be queued behind a timer tick, so the
    /// announcer is synced with the host first. A hidden-to-visible change
    /// found this way produces the show announcement in place of `trigger`.
    async fn announce(&mut self, trigger: Trigger) {
        let origin = self.host.window_origin();
        let message = match self.announcer.on_visibility(self.host.is_visible(), origin) {
            Some(shown) => Some(shown),
            None => match trigger {
                Trigger::Tick => self.announcer.on_tick(origin),
                Trigger::Resize => self.announcer.on_resize(origin),
                Trigger::Moved => self.announcer.on_move(origin),
                Trigger::Startup | Trigger::Shown => None,
            },
        };
        if let Some(message) = message {
            self.send(&message).await;
        }
    }

    /// Re-read local geometry and recompute derived positions if it changed.
    fn refresh_frame(&mut self) {
        let frame = self.host.frame();
        if frame == self.table.frame() {
            return;
        }
        if self.table.set_frame(frame) {
            self.events.emit(MeshEvent::FrameChanged {
                anchor: frame.anchor,
                timestamp: self.host.now_ms(),
            });
            self.publish();
        }
    }

    fn publish(&self) {
        let next = self.table.snapshot();
        self.snapshot.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                *current = next;
                true
            }
        });
    }

    async fn send(&self, message: &MeshMessage) {
        let data = match message.encode() {
            Ok(data) => data,
            Err(e) => {
                warn!("Failed to encode {} message: {}", message.kind(), e);
                return;
            }
        };
        if let Err(e) = self.transport.broadcast(&data).await {
            debug!("Dropped {} message: {}", message.kind(), e);
        }
    }
}
