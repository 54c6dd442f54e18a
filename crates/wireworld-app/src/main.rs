use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::info;
use wireworld_app::{
    SharedSimulation, loader,
    renderer::{Renderer, RendererContext},
    terminal::TerminalRenderer,
};
use wireworld_core::{Simulation, WireworldConfig};

fn main() -> Result<()> {
    init_tracing();
    let simulation = bootstrap_simulation()?;
    info!("Starting Wireworld simulation shell");

    let renderer = TerminalRenderer::default().with_tick_interval(tick_interval_from_env());
    renderer.run(RendererContext { simulation })
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

fn bootstrap_simulation() -> Result<SharedSimulation> {
    let config = WireworldConfig {
        width: env_u32("WIREWORLD_WIDTH").unwrap_or(90),
        height: env_u32("WIREWORLD_HEIGHT").unwrap_or(50),
        ..WireworldConfig::default()
    };
    config.validate()?;

    let board = match board_image_path() {
        Some(path) => loader::load_board(&config, &path)?,
        None => {
            info!("No board image supplied, using built-in demo circuit");
            loader::demo_board(&config)?
        }
    };

    let simulation =
        Simulation::new(config, board).context("failed to construct the simulation")?;
    let summary = simulation.latest_summary();
    info!(
        width = simulation.config().width,
        height = simulation.config().height,
        conductors = summary.conductors,
        heads = summary.heads,
        tails = summary.tails,
        "Initial board ready"
    );

    Ok(Arc::new(Mutex::new(simulation)))
}

/// Board image from `WIREWORLD_IMAGE` or the first CLI argument.
fn board_image_path() -> Option<PathBuf> {
    std::env::var_os("WIREWORLD_IMAGE")
        .filter(|raw| !raw.is_empty())
        .map(PathBuf::from)
        .or_else(|| std::env::args_os().nth(1).map(PathBuf::from))
}

fn tick_interval_from_env() -> Duration {
    std::env::var("WIREWORLD_TICK_MILLIS")
        .ok()
        .and_then(|raw| raw.trim().parse::<u64>().ok())
        .filter(|millis| *millis > 0)
        .map(Duration::from_millis)
        .unwrap_or(Duration::from_millis(400))
}

fn env_u32(key: &str) -> Option<u32> {
    std::env::var(key)
        .ok()
        .and_then(|raw| raw.trim().parse::<u32>().ok())
        .filter(|value| *value > 0)
}
