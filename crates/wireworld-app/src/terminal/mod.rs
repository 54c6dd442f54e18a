//! Terminal renderer and driver loop: colored board display, fixed-interval
//! pacing, interactive controls, and a headless mode for CI runs.

use std::{
    fs::{self, File},
    io::{self, Stdout},
    path::{Path, PathBuf},
    sync::Arc,
    time::{Duration, Instant},
};

use anyhow::{Context, Result};
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyModifiers},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{
    Frame, Terminal,
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Clear, Paragraph},
};
use serde::Serialize;
use supports_color::{ColorLevel, Stream, on_cached};
use tracing::info;
use wireworld_core::{Board, CellState, GenerationSummary};

use crate::{
    SharedSimulation,
    renderer::{Renderer, RendererContext},
};

const DEFAULT_TICK_MILLIS: u64 = 400;
const UI_TICK_MILLIS: u64 = 50;
const MAX_STEPS_PER_FRAME: usize = 32;
const DEFAULT_HEADLESS_FRAMES: usize = 12;
const MAX_HEADLESS_FRAMES: usize = 720;

pub struct TerminalRenderer {
    tick_interval: Duration,
    draw_interval: Duration,
}

impl Default for TerminalRenderer {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_millis(DEFAULT_TICK_MILLIS),
            draw_interval: Duration::from_millis(UI_TICK_MILLIS),
        }
    }
}

impl TerminalRenderer {
    /// Overrides the pacing interval between generations.
    #[must_use]
    pub fn with_tick_interval(mut self, interval: Duration) -> Self {
        self.tick_interval = interval;
        self
    }
}

impl Renderer for TerminalRenderer {
    fn name(&self) -> &'static str {
        "terminal"
    }

    fn run(&self, ctx: RendererContext) -> Result<()> {
        if std::env::var_os("WIREWORLD_TERMINAL_HEADLESS").is_some() {
            let report = self.run_headless(ctx)?;
            info!(
                target = "wireworld::terminal",
                frames = report.summary.frame_count,
                ticks_simulated = report.summary.ticks_simulated,
                final_tick = report.summary.final_tick,
                final_heads = report.summary.final_heads,
                final_tails = report.summary.final_tails,
                final_conductors = report.summary.final_conductors,
                total_changed = report.summary.total_changed,
                "Terminal headless run completed"
            );
            return Ok(());
        }

        let mut stdout = io::stdout();
        enable_raw_mode().context("failed to enable raw mode")?;
        execute!(stdout, EnterAlternateScreen).context("failed to enter alternate screen")?;

        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend).context("failed to build terminal backend")?;
        terminal.hide_cursor().ok();

        let result = run_event_loop(self, &mut terminal, ctx);

        terminal.show_cursor().ok();
        if let Err(err) = disable_raw_mode() {
            tracing::error!(?err, "failed to disable raw mode");
        }
        if let Err(err) = execute!(terminal.backend_mut(), LeaveAlternateScreen) {
            tracing::error!(?err, "failed to leave alternate screen");
        }

        result
    }
}

fn run_event_loop(
    renderer: &TerminalRenderer,
    terminal: &mut Terminal<CrosstermBackend<Stdout>>,
    ctx: RendererContext,
) -> Result<()> {
    let mut app = TerminalApp::new(renderer, ctx);

    loop {
        let now = Instant::now();
        app.maybe_step_simulation(now);

        if now.duration_since(app.last_draw) >= app.draw_interval {
            terminal.draw(|frame| app.draw(frame))?;
            app.last_draw = now;
        }

        let timeout = app
            .draw_interval
            .saturating_sub(now.duration_since(app.last_event_check));
        let event_ready = event::poll(timeout).unwrap_or(false);
        if event_ready
            && let Event::Key(key) = event::read()?
            && app.handle_key(key)
        {
            break;
        }
        if event_ready {
            app.last_event_check = Instant::now();
        }
    }

    Ok(())
}

impl TerminalRenderer {
    fn run_headless(&self, ctx: RendererContext) -> Result<HeadlessReport> {
        let backend = ratatui::backend::TestBackend::new(100, 40);
        let mut terminal = Terminal::new(backend).context("failed to build test backend")?;
        let mut app = TerminalApp::new(self, ctx);
        let mut report = HeadlessReport::new(app.snapshot.summary);
        let frames = self.headless_frame_budget();

        for _ in 0..frames {
            app.step_once();
            report.record(app.snapshot.summary);
            terminal.draw(|frame| app.draw(frame))?;
        }

        report.finalize();

        if let Some(path) = report_file_path_from_env() {
            report.write_json(&path).with_context(|| {
                format!("failed to write headless report to {}", path.display())
            })?;
        }

        Ok(report)
    }

    fn headless_frame_budget(&self) -> usize {
        std::env::var("WIREWORLD_TERMINAL_HEADLESS_FRAMES")
            .ok()
            .and_then(|raw| raw.trim().parse::<usize>().ok())
            .filter(|value| *value > 0)
            .map(|value| value.min(MAX_HEADLESS_FRAMES))
            .unwrap_or(DEFAULT_HEADLESS_FRAMES)
    }
}

/// Copy of the shared simulation state taken once per frame, so drawing
/// never holds the lock.
#[derive(Debug, Clone)]
struct Snapshot {
    summary: GenerationSummary,
    board: Board,
}

struct TerminalApp {
    simulation: SharedSimulation,
    tick_interval: Duration,
    draw_interval: Duration,
    speed_multiplier: f32,
    paused: bool,
    help_visible: bool,
    sim_accumulator: f32,
    last_tick: Instant,
    last_draw: Instant,
    last_event_check: Instant,
    palette: Palette,
    snapshot: Snapshot,
}

impl TerminalApp {
    fn new(renderer: &TerminalRenderer, ctx: RendererContext) -> Self {
        let snapshot = {
            let simulation = ctx
                .simulation
                .lock()
                .expect("simulation mutex poisoned while capturing snapshot");
            Snapshot {
                summary: simulation.latest_summary(),
                board: simulation.board().clone(),
            }
        };
        Self {
            simulation: Arc::clone(&ctx.simulation),
            tick_interval: renderer.tick_interval,
            draw_interval: renderer.draw_interval,
            speed_multiplier: 1.0,
            paused: false,
            help_visible: false,
            sim_accumulator: 0.0,
            last_tick: Instant::now(),
            last_draw: Instant::now(),
            last_event_check: Instant::now(),
            palette: Palette::detect(),
            snapshot,
        }
    }

    fn refresh_snapshot(&mut self) {
        if let Ok(simulation) = self.simulation.lock() {
            self.snapshot = Snapshot {
                summary: simulation.latest_summary(),
                board: simulation.board().clone(),
            };
        }
    }

    fn maybe_step_simulation(&mut self, now: Instant) {
        let delta = now - self.last_tick;
        self.last_tick = now;

        let mut steps = 0usize;

        let effective_speed = if self.paused {
            0.0
        } else {
            self.speed_multiplier.max(0.0)
        };

        let step_interval = self.tick_interval.as_secs_f32();
        if effective_speed > f32::EPSILON && step_interval > f32::EPSILON {
            self.sim_accumulator += delta.as_secs_f32() * effective_speed;
            let max_accumulator = step_interval * MAX_STEPS_PER_FRAME as f32;
            if self.sim_accumulator > max_accumulator {
                self.sim_accumulator = max_accumulator;
            }
            steps = (self.sim_accumulator / step_interval).floor() as usize;
            if steps > MAX_STEPS_PER_FRAME {
                steps = MAX_STEPS_PER_FRAME;
            }
            if steps > 0 {
                self.sim_accumulator -= step_interval * steps as f32;
            }
        }

        if steps > 0
            && let Ok(mut simulation) = self.simulation.lock()
        {
            for _ in 0..steps {
                simulation.step();
            }
        }

        self.refresh_snapshot();
    }

    fn step_once(&mut self) {
        if let Ok(mut simulation) = self.simulation.lock() {
            simulation.step();
        }
        self.refresh_snapshot();
    }

    /// Returns `true` when the session should end.
    fn handle_key(&mut self, key: KeyEvent) -> bool {
        match (key.code, key.modifiers) {
            (KeyCode::Esc, _)
            | (KeyCode::Char('q'), _)
            | (KeyCode::Char('Q'), _)
            | (KeyCode::Char('c'), KeyModifiers::CONTROL) => {
                return true;
            }
            (KeyCode::Char(' '), _) => {
                self.paused = !self.paused;
                if self.paused {
                    self.speed_multiplier = 0.0;
                } else if self.speed_multiplier <= 0.0 {
                    self.speed_multiplier = 1.0;
                }
            }
            (KeyCode::Char('+') | KeyCode::Char('='), _) => {
                self.speed_multiplier = (self.speed_multiplier + 0.5).clamp(0.5, 8.0);
                self.paused = false;
            }
            (KeyCode::Char('-') | KeyCode::Char('_'), _) => {
                self.speed_multiplier = (self.speed_multiplier - 0.5).max(0.0);
                if self.speed_multiplier <= 0.0 {
                    self.paused = true;
                }
            }
            (KeyCode::Char('s'), _) => {
                self.step_once();
                self.paused = true;
                self.speed_multiplier = 0.0;
            }
            (KeyCode::Char('h') | KeyCode::Char('?'), _) => {
                self.help_visible = !self.help_visible;
            }
            _ => {}
        }
        false
    }

    fn draw(&mut self, frame: &mut Frame<'_>) {
        let snapshot = self.snapshot.clone();

        let outer = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3),
                Constraint::Min(0),
                Constraint::Length(1),
            ])
            .split(frame.area());

        self.draw_header(frame, outer[0], &snapshot);
        self.draw_board(frame, outer[1], &snapshot);
        self.draw_hints(frame, outer[2]);

        if self.help_visible {
            self.draw_help(frame);
        }
    }

    fn draw_header(&self, frame: &mut Frame<'_>, area: Rect, snapshot: &Snapshot) {
        let summary = &snapshot.summary;
        let state_span = if self.paused {
            Span::styled(" PAUSED ", self.palette.paused_style())
        } else {
            Span::styled(" RUNNING ", self.palette.running_style())
        };
        let line = Line::from(vec![
            state_span,
            Span::raw(format!(" tick {}", summary.tick.0)),
            Span::raw(format!(
                "  conductors {}  heads {}  tails {}  changed {}",
                summary.conductors, summary.heads, summary.tails, summary.changed,
            )),
            Span::styled(
                format!("  x{:.1}", self.speed_multiplier),
                self.palette.accent_style(),
            ),
        ]);
        let block = Block::default()
            .title(self.palette.title("Wireworld"))
            .borders(Borders::ALL);
        frame.render_widget(Paragraph::new(line).block(block), area);
    }

    fn draw_board(&self, frame: &mut Frame<'_>, area: Rect, snapshot: &Snapshot) {
        let board = &snapshot.board;
        let title = format!("Board {}x{}", board.width(), board.height());
        let block = Block::default()
            .title(self.palette.title(title))
            .borders(Borders::ALL);
        let inner = block.inner(area);
        frame.render_widget(block, area);

        if inner.width < 2 || inner.height < 1 {
            return;
        }

        // Each cell occupies two columns so the grid reads roughly square.
        let visible_cols = (inner.width as u32 / 2).min(board.width());
        let visible_rows = (inner.height as u32).min(board.height());

        let mut lines = Vec::with_capacity(visible_rows as usize);
        for y in 0..visible_rows {
            let mut spans = Vec::with_capacity(visible_cols as usize);
            for x in 0..visible_cols {
                let style = self.palette.cell_style(board.get(x, y));
                spans.push(Span::styled("  ", style));
            }
            lines.push(Line::from(spans));
        }

        frame.render_widget(Paragraph::new(Text::from(lines)), inner);
    }

    fn draw_hints(&self, frame: &mut Frame<'_>, area: Rect) {
        let hints = Line::from(Span::styled(
            " q quit · space pause · s step · +/- speed · h help",
            Style::default().fg(Color::DarkGray),
        ));
        frame.render_widget(Paragraph::new(hints), area);
    }

    fn draw_help(&self, frame: &mut Frame<'_>) {
        let area = centered_rect(frame.area(), 44, 10);
        let text = Text::from(vec![
            Line::from("q / Esc / Ctrl-C  quit"),
            Line::from("space             pause or resume"),
            Line::from("s                 advance one generation"),
            Line::from("+ / -             adjust speed"),
            Line::from("h / ?             toggle this help"),
        ]);
        let block = Block::default()
            .title(self.palette.title("Keys"))
            .borders(Borders::ALL);
        frame.render_widget(Clear, area);
        frame.render_widget(Paragraph::new(text).block(block), area);
    }
}

fn centered_rect(area: Rect, width: u16, height: u16) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    Rect {
        x: area.x + (area.width - width) / 2,
        y: area.y + (area.height - height) / 2,
        width,
        height,
    }
}

struct Palette {
    level: Option<ColorLevel>,
}

impl Palette {
    fn detect() -> Self {
        Self {
            level: on_cached(Stream::Stdout),
        }
    }

    fn has_color(&self) -> bool {
        self.level.is_some()
    }

    fn header_style(&self) -> Style {
        Style::default()
            .fg(Color::Cyan)
            .add_modifier(Modifier::BOLD)
    }

    fn accent_style(&self) -> Style {
        Style::default().fg(Color::LightMagenta)
    }

    fn paused_style(&self) -> Style {
        Style::default()
            .fg(Color::Black)
            .bg(Color::DarkGray)
            .add_modifier(Modifier::BOLD)
    }

    fn running_style(&self) -> Style {
        Style::default()
            .fg(Color::Black)
            .bg(Color::Green)
            .add_modifier(Modifier::BOLD)
    }

    fn title<T: Into<String>>(&self, title: T) -> Span<'static> {
        Span::styled(title.into(), self.header_style())
    }

    fn cell_style(&self, state: CellState) -> Style {
        if !self.has_color() {
            return Style::default();
        }
        let rich_color = self
            .level
            .is_some_and(|level| level.has_16m || level.has_256);
        let bg = match state {
            CellState::Empty => Color::Black,
            CellState::Conductor => {
                if rich_color {
                    Color::Rgb(255, 255, 0)
                } else {
                    Color::Yellow
                }
            }
            CellState::ElectronHead => {
                // Lighter than the canonical encode color so heads stay
                // visible against empty cells.
                if rich_color {
                    Color::Rgb(70, 130, 255)
                } else {
                    Color::LightBlue
                }
            }
            CellState::ElectronTail => {
                if rich_color {
                    Color::Rgb(255, 0, 0)
                } else {
                    Color::Red
                }
            }
        };
        Style::default().bg(bg)
    }
}

#[derive(Debug, Clone, Serialize)]
struct HeadlessReport {
    initial: FrameStats,
    frames: Vec<FrameStats>,
    summary: ReportSummary,
}

impl HeadlessReport {
    fn new(initial: GenerationSummary) -> Self {
        Self {
            initial: FrameStats::from_summary(initial),
            frames: Vec::new(),
            summary: ReportSummary::default(),
        }
    }

    fn record(&mut self, summary: GenerationSummary) {
        self.frames.push(FrameStats::from_summary(summary));
    }

    fn finalize(&mut self) {
        self.summary = ReportSummary::from(&self.initial, &self.frames);
    }

    fn write_json(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let file = File::create(path)?;
        serde_json::to_writer_pretty(file, self).context("failed to serialize headless report")?;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Serialize)]
struct FrameStats {
    tick: u64,
    conductors: usize,
    heads: usize,
    tails: usize,
    changed: usize,
}

impl FrameStats {
    fn from_summary(summary: GenerationSummary) -> Self {
        Self {
            tick: summary.tick.0,
            conductors: summary.conductors,
            heads: summary.heads,
            tails: summary.tails,
            changed: summary.changed,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
struct ReportSummary {
    frame_count: usize,
    ticks_simulated: u64,
    final_tick: u64,
    final_conductors: usize,
    final_heads: usize,
    final_tails: usize,
    total_changed: usize,
    peak_electrons: usize,
}

impl ReportSummary {
    fn from(initial: &FrameStats, frames: &[FrameStats]) -> Self {
        let Some(final_stats) = frames.last() else {
            return Self {
                final_tick: initial.tick,
                final_conductors: initial.conductors,
                final_heads: initial.heads,
                final_tails: initial.tails,
                ..Self::default()
            };
        };

        Self {
            frame_count: frames.len(),
            ticks_simulated: final_stats.tick.saturating_sub(initial.tick),
            final_tick: final_stats.tick,
            final_conductors: final_stats.conductors,
            final_heads: final_stats.heads,
            final_tails: final_stats.tails,
            total_changed: frames.iter().map(|frame| frame.changed).sum(),
            peak_electrons: frames
                .iter()
                .map(|frame| frame.heads + frame.tails)
                .max()
                .unwrap_or(0),
        }
    }
}

fn report_file_path_from_env() -> Option<PathBuf> {
    std::env::var_os("WIREWORLD_TERMINAL_HEADLESS_REPORT").and_then(|raw| {
        if raw.is_empty() {
            None
        } else {
            Some(PathBuf::from(raw))
        }
    })
}
