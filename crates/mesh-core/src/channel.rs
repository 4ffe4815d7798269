//! In-process named broadcast channels.
//!
//! `LocalHub` plays the role of the host's broadcast capability: every
//! endpoint opened under the same name hears every other endpoint on it.
//! Frames are tagged with the sending endpoint so a peer never receives
//! its own messages back.

use crate::transport::{BroadcastTransport, Result, TransportError};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;
use tracing::debug;

/// Default per-channel buffer. Receivers further behind than this lose messages.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone)]
struct Frame {
    from: u64,
    data: Arc<[u8]>,
}

struct HubInner {
    channels: HashMap<String, broadcast::Sender<Frame>>,
    next_endpoint: u64,
    available: bool,
}

/// Registry of named broadcast channels.
///
/// Cheap to clone; clones share the same channels.
#[derive(Clone)]
pub struct LocalHub {
    inner: Arc<Mutex<HubInner>>,
    capacity: usize,
}

impl Default for LocalHub {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }
}

impl LocalHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(HubInner {
                channels: HashMap::new(),
                next_endpoint: 1,
                available: true,
            })),
            capacity: capacity.max(1),
        }
    }

    /// A hub that refuses every `open`, like a host without broadcast support.
    pub fn unavailable() -> Self {
        let hub = Self::new();
        hub.shutdown();
        hub
    }

    /// Open an endpoint on the channel called `name`.
    pub fn open(&self, name: &str) -> Result<LocalChannel> {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        if !inner.available {
            return Err(TransportError::Unavailable(format!(
                "no broadcast support for channel {:?}",
                name
            )));
        }

        let endpoint = inner.next_endpoint;
        inner.next_endpoint += 1;

        let capacity = self.capacity;
        let tx = inner
            .channels
            .entry(name.to_string())
            .or_insert_with(|| broadcast::channel(capacity).0)
            .clone();
        let rx = tx.subscribe();

        debug!("Opened endpoint {} on channel {:?}", endpoint, name);
        Ok(LocalChannel {
            name: name.to_string(),
            endpoint,
            tx: Some(tx),
            rx: Some(rx),
        })
    }

    /// Stop handing out endpoints. Already-open endpoints keep working.
    pub fn shutdown(&self) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.available = false;
        inner.channels.clear();
    }

    /// Number of open endpoints on `name`.
    pub fn endpoint_count(&self, name: &str) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .channels
            .get(name)
            .map(|tx| tx.receiver_count())
            .unwrap_or(0)
    }
}

/// One endpoint on a named channel.
pub struct LocalChannel {
    name: String,
    endpoint: u64,
    tx: Option<broadcast::Sender<Frame>>,
    rx: Option<broadcast::Receiver<Frame>>,
}

impl LocalChannel {
    pub fn name(&self) -> &str {
        &self.name
    }
}

#[async_trait]
impl BroadcastTransport for LocalChannel {
    async fn broadcast(&self, data: &[u8]) -> Result<()> {
        let tx = self.tx.as_ref().ok_or(TransportError::Closed)?;
        let frame = Frame {
            from: self.endpoint,
            data: Arc::from(data),
        };
        // No receivers is not an error: nobody else is listening yet
        let _ = tx.send(frame);
        Ok(())
    }

    async fn recv(&mut self) -> Option<Vec<u8>> {
        let endpoint = self.endpoint;
        let rx = self.rx.as_mut()?;
        loop {
            match rx.recv().await {
                Ok(frame) if frame.from == endpoint => continue,
                Ok(frame) => return Some(frame.data.to_vec()),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    debug!(
                        "Endpoint {} on {:?} lagged, dropped {} message(s)",
                        endpoint, self.name, skipped
                    );
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    fn close(&mut self) {
        if self.tx.take().is_some() {
            debug!("Closed endpoint {} on channel {:?}", self.endpoint, self.name);
        }
        self.rx = None;
    }

    fn is_closed(&self) -> bool {
        self.tx.is_none()
    }
}
