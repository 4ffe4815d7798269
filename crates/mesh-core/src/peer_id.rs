//! PeerId: Opaque identifier for a peer in the local mesh.
//!
//! Locally generated ids are 64 random bits rendered as a 16-character
//! hex string. Ids received from other peers are treated as opaque strings,
//! so peers built by other implementations can still participate.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;
use thiserror::Error;

/// Longest id accepted from the wire.
pub const MAX_PEER_ID_LEN: usize = 64;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PeerIdError {
    #[error("Peer ID cannot be empty")]
    Empty,
    #[error("Peer ID too long: {0} chars (max {MAX_PEER_ID_LEN})")]
    TooLong(usize),
    #[error("Peer ID contains whitespace or control characters")]
    InvalidChars,
}

/// A unique identifier for a peer in the mesh.
///
/// # Examples
/// ```
/// use mesh_core::PeerId;
///
/// let peer_id = PeerId::generate();
/// assert_eq!(peer_id.as_str().len(), 16);
///
/// let parsed: PeerId = "k3x9q2z7a".parse().unwrap();
/// assert_eq!(parsed.as_str(), "k3x9q2z7a");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PeerId(String);

impl PeerId {
    /// Generate a new random peer ID.
    ///
    /// Never returns the all-zero id.
    pub fn generate() -> Self {
        use rand::Rng;
        loop {
            let id: u64 = rand::rng().random();
            if id != 0 {
                return Self(format!("{:016x}", id));
            }
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First four characters, for compact display.
    pub fn short(&self) -> &str {
        match self.0.char_indices().nth(4) {
            Some((idx, _)) => &self.0[..idx],
            None => &self.0,
        }
    }
}

impl Display for PeerId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for PeerId {
    type Err = PeerIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(PeerIdError::Empty);
        }
        let len = s.chars().count();
        if len > MAX_PEER_ID_LEN {
            return Err(PeerIdError::TooLong(len));
        }
        if s.chars().any(|c| c.is_whitespace() || c.is_control()) {
            return Err(PeerIdError::InvalidChars);
        }
        Ok(Self(s.to_string()))
    }
}

impl serde::Serialize for PeerId {
    fn serialize<S: serde::Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&self.0)
    }
}

impl<'de> serde::Deserialize<'de> for PeerId {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let s = String::deserialize(d)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
