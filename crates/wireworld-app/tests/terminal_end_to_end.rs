use std::sync::{Arc, Mutex, OnceLock};

use anyhow::Result;
use serde::Deserialize;
use tempfile::tempdir;
use wireworld_app::{
    loader,
    renderer::{Renderer, RendererContext},
    terminal::TerminalRenderer,
};
use wireworld_core::{CellState, Simulation, WireworldConfig};

static ENV_GUARD: OnceLock<Mutex<()>> = OnceLock::new();

struct EnvCleanup {
    keys: Vec<String>,
}

impl EnvCleanup {
    fn new() -> Self {
        Self { keys: Vec::new() }
    }

    fn set(&mut self, key: &str, value: &str) {
        unsafe {
            std::env::set_var(key, value);
        }
        self.keys.push(key.to_string());
    }
}

impl Drop for EnvCleanup {
    fn drop(&mut self) {
        for key in &self.keys {
            unsafe {
                std::env::remove_var(key);
            }
        }
    }
}

#[allow(dead_code)]
#[derive(Debug, Deserialize)]
struct FrameStatsDto {
    tick: u64,
    conductors: usize,
    heads: usize,
    tails: usize,
    changed: usize,
}

#[allow(dead_code)]
#[derive(Debug, Deserialize)]
struct ReportSummaryDto {
    frame_count: usize,
    ticks_simulated: u64,
    final_tick: u64,
    final_conductors: usize,
    final_heads: usize,
    final_tails: usize,
    total_changed: usize,
    peak_electrons: usize,
}

#[derive(Debug, Deserialize)]
struct HeadlessReportDto {
    initial: FrameStatsDto,
    frames: Vec<FrameStatsDto>,
    summary: ReportSummaryDto,
}

#[test]
fn terminal_headless_generates_report() -> Result<()> {
    let _env_guard = ENV_GUARD
        .get_or_init(|| Mutex::new(()))
        .lock()
        .expect("env guard");

    let frames = 40usize;

    let report_dir = tempdir()?;
    let report_path = report_dir.path().join("terminal_report.json");

    let mut env = EnvCleanup::new();
    env.set("WIREWORLD_TERMINAL_HEADLESS", "1");
    let frames_env = frames.to_string();
    env.set("WIREWORLD_TERMINAL_HEADLESS_FRAMES", &frames_env);
    let report_env = report_path.to_string_lossy().into_owned();
    env.set("WIREWORLD_TERMINAL_HEADLESS_REPORT", &report_env);

    let config = WireworldConfig {
        width: 24,
        height: 10,
        history_capacity: 128,
    };
    let board = loader::demo_board(&config)?;
    let simulation = Simulation::new(config, board)?;
    let shared = Arc::new(Mutex::new(simulation));

    let renderer = TerminalRenderer::default();
    renderer.run(RendererContext {
        simulation: Arc::clone(&shared),
    })?;

    let report_contents = std::fs::read_to_string(&report_path)?;
    let report: HeadlessReportDto = serde_json::from_str(&report_contents)?;
    let summary = &report.summary;

    assert_eq!(
        summary.frame_count, frames,
        "headless renderer should honour requested frame budget"
    );
    assert_eq!(report.initial.tick, 0);
    assert_eq!(summary.final_tick, frames as u64);
    assert_eq!(summary.ticks_simulated, frames as u64);

    assert!(
        report.frames.iter().all(|frame| frame.changed > 0),
        "the demo electron should keep moving every generation"
    );
    assert!(
        summary.peak_electrons >= 2,
        "an electron is a head/tail pair (peak={})",
        summary.peak_electrons
    );
    let cell_budget = 24 * 10;
    assert!(
        report
            .frames
            .iter()
            .all(|frame| frame.conductors + frame.heads + frame.tails <= cell_budget),
        "census can never exceed the cell count"
    );

    {
        let guard = shared.lock().expect("simulation mutex");
        assert_eq!(guard.tick().0, summary.final_tick);
        let history: Vec<_> = guard.history().copied().collect();
        assert_eq!(
            history.len(),
            frames + 1,
            "history should retain the initial census plus one entry per frame"
        );
        let last = history.last().expect("history tail");
        assert_eq!(last.heads, summary.final_heads);
        assert_eq!(last.tails, summary.final_tails);
        assert_eq!(last.conductors, summary.final_conductors);
    }

    Ok(())
}

#[test]
fn loaded_image_drives_the_canonical_wire() -> Result<()> {
    let _env_guard = ENV_GUARD
        .get_or_init(|| Mutex::new(()))
        .lock()
        .expect("env guard");

    let dir = tempdir()?;
    let path = dir.path().join("wire.png");

    let mut img = image::RgbImage::new(3, 1);
    img.put_pixel(0, 0, image::Rgb(CellState::ElectronHead.rgb()));
    img.put_pixel(1, 0, image::Rgb(CellState::Conductor.rgb()));
    img.put_pixel(2, 0, image::Rgb(CellState::Conductor.rgb()));
    img.save(&path)?;

    let config = WireworldConfig {
        width: 3,
        height: 1,
        ..WireworldConfig::default()
    };
    let board = loader::load_board(&config, &path)?;
    let mut simulation = Simulation::new(config, board)?;

    use wireworld_core::CellState::{Conductor as C, ElectronHead as H, ElectronTail as T};
    let expected: [&[CellState]; 4] = [&[T, H, C], &[C, T, H], &[C, C, T], &[C, C, C]];
    for cells in expected {
        simulation.step();
        assert_eq!(simulation.board().cells(), cells);
    }

    Ok(())
}
