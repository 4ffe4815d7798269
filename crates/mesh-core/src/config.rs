use crate::reaper::{LivenessConfig, LivenessError};

/// Channel name used when none is configured.
pub const DEFAULT_CHANNEL: &str = "window-mesh";

/// Configuration for a mesh node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MeshConfig {
    /// Name of the broadcast channel peers meet on
    pub channel: String,
    /// Announcement and liveness timing
    pub liveness: LivenessConfig,
}

impl Default for MeshConfig {
    fn default() -> Self {
        Self {
            channel: DEFAULT_CHANNEL.to_string(),
            liveness: LivenessConfig::default(),
        }
    }
}

impl MeshConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.channel.trim().is_empty() {
            return Err(ConfigError::EmptyChannel);
        }
        self.liveness.validate()?;
        Ok(())
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Channel name cannot be empty")]
    EmptyChannel,
    #[error("Invalid liveness settings: {0}")]
    Liveness(#[from] LivenessError),
}
