//! Liveness reaping.
//!
//! Liveness is receiver-driven: a peer is alive as long as its
//! announcements keep arriving. There is no ping and no retry. The reaper
//! periodically evicts every peer whose last accepted announcement is older
//! than the staleness timeout. This is the only eviction path for peers
//! that vanish without sending a disconnect.

use crate::PeerId;
use crate::peers::{PeerTable, Timestamp};
use std::time::Duration;
use thiserror::Error;

/// Fewest announcement intervals the staleness timeout must span.
pub const MIN_ANNOUNCEMENTS_PER_TIMEOUT: u32 = 3;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LivenessError {
    #[error("{0} must be greater than zero")]
    ZeroInterval(&'static str),
    #[error(
        "stale timeout ({timeout:?}) must span at least {MIN_ANNOUNCEMENTS_PER_TIMEOUT} announce intervals ({announce:?})"
    )]
    TimeoutTooShort {
        timeout: Duration,
        announce: Duration,
    },
    #[error("reap interval ({reap:?}) must not exceed stale timeout ({timeout:?})")]
    ReapSlowerThanTimeout { reap: Duration, timeout: Duration },
}

/// Timing parameters for announcement and liveness.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LivenessConfig {
    /// How often a visible peer announces its position (default: 100ms)
    pub announce_interval: Duration,
    /// How often stale peers are reaped (default: 3s)
    pub reap_interval: Duration,
    /// Silence after which a peer is evicted (default: 10s)
    pub stale_timeout: Duration,
}

impl Default for LivenessConfig {
    fn default() -> Self {
        Self {
            announce_interval: Duration::from_millis(100),
            reap_interval: Duration::from_secs(3),
            stale_timeout: Duration::from_secs(10),
        }
    }
}

impl LivenessConfig {
    /// Check that the timeout tolerates lost announcements and that the
    /// reaper runs often enough to honor it.
    pub fn validate(&self) -> Result<(), LivenessError> {
        if self.announce_interval.is_zero() {
            return Err(LivenessError::ZeroInterval("announce interval"));
        }
        if self.reap_interval.is_zero() {
            return Err(LivenessError::ZeroInterval("reap interval"));
        }
        if self.stale_timeout < self.announce_interval * MIN_ANNOUNCEMENTS_PER_TIMEOUT {
            return Err(LivenessError::TimeoutTooShort {
                timeout: self.stale_timeout,
                announce: self.announce_interval,
            });
        }
        if self.reap_interval > self.stale_timeout {
            return Err(LivenessError::ReapSlowerThanTimeout {
                reap: self.reap_interval,
                timeout: self.stale_timeout,
            });
        }
        Ok(())
    }

    pub fn stale_timeout_ms(&self) -> u64 {
        self.stale_timeout.as_millis() as u64
    }
}

/// Evicts peers whose announcements have gone quiet.
///
/// The caller runs [`Reaper::reap`] every `reap_interval`.
#[derive(Debug, Clone)]
pub struct Reaper {
    timeout_ms: u64,
    total_evicted: u64,
}

impl Reaper {
    pub fn new(config: &LivenessConfig) -> Self {
        Self {
            timeout_ms: config.stale_timeout_ms(),
            total_evicted: 0,
        }
    }

    /// Evict stale peers from `table`. Returns the evicted ids.
    pub fn reap(&mut self, table: &mut PeerTable, now: Timestamp) -> Vec<PeerId> {
        let evicted = table.reap(now, self.timeout_ms);
        self.total_evicted += evicted.len() as u64;
        evicted
    }

    pub fn timeout_ms(&self) -> u64 {
        self.timeout_ms
    }

    /// Peers evicted over the reaper's lifetime.
    pub fn total_evicted(&self) -> u64 {
        self.total_evicted
    }
}
