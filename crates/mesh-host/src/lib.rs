//! mesh-host library: Exposes the host components for testing.
//!
//! This is a thin library layer over the binary, allowing integration
//! tests to drive simulated windows and the renderer directly.

pub mod config;
pub mod render;
pub mod screen;
pub mod sim;

// Re-export key types for convenience
pub use config::{Args, ArgsError};
pub use render::{Link, render, run_renderer};
pub use screen::{Desktop, SCREEN, tile};
pub use sim::Simulation;
