//! mesh-host: Runs a set of simulated windows that find each other over a
//! shared local broadcast channel and print where they see one another.

use anyhow::Result;
use clap::Parser;
use mesh_core::{Clock, HostEnvironment, LocalHub};
use rand::Rng;
use std::time::Duration;
use tokio::time::{MissedTickBehavior, interval, sleep};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use mesh_host::{Args, SCREEN, Simulation, run_renderer};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Set up logging - respects RUST_LOG env var, defaults to info (or debug with --verbose)
    let default_filter = if args.verbose {
        "debug,mesh_host=debug,mesh_core=debug"
    } else {
        "info,mesh_host=info"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = args.mesh_config()?;
    info!("Starting mesh-host");
    info!("Channel: {}", config.channel);
    info!(
        "Announce every {:?}, reap every {:?}, evict after {:?}",
        config.liveness.announce_interval,
        config.liveness.reap_interval,
        config.liveness.stale_timeout
    );

    let hub = LocalHub::new();
    let mut sim = Simulation::launch(&hub, &config, args.windows, SCREEN, Clock::System).await?;
    info!("{} window(s) running. Press Ctrl+C to stop.", sim.len());

    // Renderers stop on their own once their node is gone
    for index in 0..sim.len() {
        let (Some(id), Some(view), Some(window)) = (
            sim.id(index).cloned(),
            sim.view(index),
            sim.desktop().windows().get(index).cloned(),
        ) else {
            continue;
        };
        tokio::spawn(run_renderer(
            format!("window {} {}", index, id.short()),
            view,
            move || window.viewport(),
            args.render_interval(),
            args.debug_overlay,
            std::future::pending(),
        ));
    }

    let mut rng = rand::rng();
    let mut drag = interval(args.drag_interval().unwrap_or(Duration::from_secs(1)));
    drag.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let dragging = args.drag_interval().is_some();

    let mut blink = interval(Duration::from_secs(args.blink_secs.unwrap_or(1)));
    blink.set_missed_tick_behavior(MissedTickBehavior::Delay);
    blink.reset();
    let blinking = args.blink_secs.is_some();

    let crash = sleep(Duration::from_secs(args.crash_after_secs.unwrap_or(0)));
    tokio::pin!(crash);
    let mut crash_pending = args.crash_after_secs.is_some() && sim.len() > 1;

    let deadline = sleep(Duration::from_secs(args.run_secs.unwrap_or(0)));
    tokio::pin!(deadline);
    let timed = args.run_secs.is_some();

    // Main event loop
    loop {
        tokio::select! {
            _ = drag.tick(), if dragging => {
                let alive: Vec<usize> = sim.alive().collect();
                if !alive.is_empty() {
                    let index = alive[rng.random_range(0..alive.len())];
                    sim.desktop().drag(index, &mut rng);
                }
            }

            _ = blink.tick(), if blinking => {
                if let Some(visible) = sim.desktop().toggle_visibility(0) {
                    info!("Window 0 {}", if visible { "shown" } else { "hidden" });
                }
            }

            _ = &mut crash, if crash_pending => {
                crash_pending = false;
                sim.crash(sim.len() - 1);
            }

            _ = &mut deadline, if timed => {
                info!("Run time elapsed");
                break;
            }

            // Handle graceful shutdown
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown signal received");
                break;
            }
        }
    }

    info!("Shutting down");
    for summary in sim.shutdown().await {
        debug!("{:?}", summary);
        info!(
            "Window {}: sent {} announcement(s), evicted {} peer(s), {} peer(s) at exit",
            summary.id.short(),
            summary.announcements_sent,
            summary.peers_evicted,
            summary.peers_at_exit
        );
    }
    Ok(())
}
