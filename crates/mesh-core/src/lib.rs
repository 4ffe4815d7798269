//! mesh-core: Peer discovery and window-position reconciliation for windows
//! sharing a local broadcast channel.
//!
//! This crate provides the core functionality for:
//! - Announcing each window's absolute screen origin to its peers
//! - Tracking peers and evicting the ones that go silent
//! - Mapping remote origins into the local window's coordinate space
//! - BroadcastTransport and HostEnvironment trait abstractions

pub mod announcer;
pub mod channel;
pub mod config;
pub mod dispatcher;
pub mod events;
pub mod geometry;
pub mod host;
pub mod node;
pub mod peer_id;
pub mod peers;
pub mod protocol;
pub mod reaper;
pub mod transport;

pub use channel::{LocalChannel, LocalHub};
pub use config::{ConfigError, MeshConfig};
pub use events::{EventBus, LeaveReason, MeshEvent, Subscription};
pub use geometry::{LocalAnchor, LocalFrame, Point, ScreenPosition, Viewport, reconcile};
pub use host::{Clock, HostEnvironment, HostEvent, HostEvents, SimulatedWindow};
pub use node::{Flow, MeshError, MeshNode, NodeSummary};
pub use peer_id::{PeerId, PeerIdError};
pub use peers::{MeshSnapshot, PeerRecord, PeerTable};
pub use protocol::MeshMessage;
pub use reaper::LivenessConfig;
pub use transport::{BroadcastTransport, TransportError};
