use clap::Parser;
use mesh_core::config::DEFAULT_CHANNEL;
use mesh_core::{ConfigError, LivenessConfig, MeshConfig};
use std::time::Duration;

/// Most windows that fit the virtual screen at a readable size.
pub const MAX_WINDOWS: usize = 16;

/// Command-line arguments. Every mesh setting can also come from the environment.
#[derive(Parser, Debug, Clone)]
#[command(name = "mesh-host")]
#[command(about = "Simulated windows discovering each other over a local broadcast channel")]
pub struct Args {
    /// Broadcast channel shared by all windows
    #[arg(long, env = "MESH_CHANNEL", default_value = DEFAULT_CHANNEL)]
    pub channel: String,

    /// Number of simulated windows
    #[arg(short = 'n', long, env = "MESH_WINDOWS", default_value_t = 3)]
    pub windows: usize,

    /// Position announcement interval in milliseconds
    #[arg(long, env = "MESH_ANNOUNCE_MS", default_value_t = 100)]
    pub announce_ms: u64,

    /// Stale peer sweep interval in milliseconds
    #[arg(long, env = "MESH_REAP_MS", default_value_t = 3000)]
    pub reap_ms: u64,

    /// Silence after which a peer is evicted, in milliseconds
    #[arg(long, env = "MESH_TIMEOUT_MS", default_value_t = 10000)]
    pub timeout_ms: u64,

    /// Print viewport, anchor and per-peer positions for each window
    #[arg(long)]
    pub debug_overlay: bool,

    /// Renderer refresh interval in milliseconds
    #[arg(long, default_value_t = 1000)]
    pub render_ms: u64,

    /// Drag a random window every this many milliseconds (0 disables)
    #[arg(long, default_value_t = 500)]
    pub drag_ms: u64,

    /// Hide or show the first window every this many seconds
    #[arg(long)]
    pub blink_secs: Option<u64>,

    /// Abort the last window after this many seconds, without a disconnect
    #[arg(long)]
    pub crash_after_secs: Option<u64>,

    /// Exit after this many seconds instead of waiting for Ctrl+C
    #[arg(long)]
    pub run_secs: Option<u64>,

    /// Enable verbose logging
    #[arg(long)]
    pub verbose: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum ArgsError {
    #[error("At least one window is required")]
    NoWindows,
    #[error("Too many windows: {0} (max {MAX_WINDOWS})")]
    TooManyWindows(usize),
    #[error("Render interval must be greater than zero")]
    ZeroRenderInterval,
    #[error("Blink interval must be greater than zero")]
    ZeroBlinkInterval,
    #[error(transparent)]
    Mesh(#[from] ConfigError),
}

impl Args {
    /// Build and validate the mesh configuration these arguments describe.
    pub fn mesh_config(&self) -> Result<MeshConfig, ArgsError> {
        match self.windows {
            0 => return Err(ArgsError::NoWindows),
            n if n > MAX_WINDOWS => return Err(ArgsError::TooManyWindows(n)),
            _ => {}
        }
        if self.render_ms == 0 {
            return Err(ArgsError::ZeroRenderInterval);
        }
        if self.blink_secs == Some(0) {
            return Err(ArgsError::ZeroBlinkInterval);
        }

        let config = MeshConfig {
            channel: self.channel.clone(),
            liveness: LivenessConfig {
                announce_interval: Duration::from_millis(self.announce_ms),
                reap_interval: Duration::from_millis(self.reap_ms),
                stale_timeout: Duration::from_millis(self.timeout_ms),
            },
        };
        config.validate()?;
        Ok(config)
    }

    pub fn render_interval(&self) -> Duration {
        Duration::from_millis(self.render_ms)
    }

    /// `None` when dragging is disabled.
    pub fn drag_interval(&self) -> Option<Duration> {
        (self.drag_ms > 0).then(|| Duration::from_millis(self.drag_ms))
    }
}
