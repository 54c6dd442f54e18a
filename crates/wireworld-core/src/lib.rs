//! Wireworld engine shared across the workspace: cell states, the board
//! grid, the neighbor-probe geometry, the transition rule, and the
//! tick-by-tick simulation driver state.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use thiserror::Error;

/// Monotonic generation counter.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct Tick(pub u64);

/// Errors raised when constructing boards or simulations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum WireworldError {
    /// Indicates an invalid configuration value.
    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),
    /// A flat cell sequence does not cover the configured grid exactly.
    #[error("expected {expected} cells for a {width}x{height} board, got {actual}")]
    ShapeMismatch {
        width: u32,
        height: u32,
        expected: usize,
        actual: usize,
    },
    /// A raw color does not name any of the four cell states.
    #[error("color ({0}, {1}, {2}) does not name a cell state")]
    InvalidState(u8, u8, u8),
}

/// State of a single grid cell.
///
/// Electrons travel along conductors as a head/tail pair: a head burns down
/// to a tail, a tail heals back into plain conductor, and a conductor
/// ignites into a head when one or two neighboring heads touch it.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize,
)]
pub enum CellState {
    #[default]
    Empty,
    Conductor,
    ElectronHead,
    ElectronTail,
}

impl CellState {
    /// Canonical RGB encoding used by board images.
    #[must_use]
    pub const fn rgb(self) -> [u8; 3] {
        match self {
            Self::Empty => [0, 0, 0],
            Self::Conductor => [255, 255, 0],
            Self::ElectronHead => [0, 0, 255],
            Self::ElectronTail => [255, 0, 0],
        }
    }

    /// Decodes a raw pixel color into a cell state.
    ///
    /// This is the only place raw values enter the engine; everything past
    /// it works on the closed enum. Unrecognized colors are rejected rather
    /// than defaulted.
    pub const fn from_rgb(rgb: [u8; 3]) -> Result<Self, WireworldError> {
        match rgb {
            [0, 0, 0] => Ok(Self::Empty),
            [255, 255, 0] => Ok(Self::Conductor),
            [0, 0, 255] => Ok(Self::ElectronHead),
            [255, 0, 0] => Ok(Self::ElectronTail),
            [r, g, b] => Err(WireworldError::InvalidState(r, g, b)),
        }
    }

    /// Whether this cell carries the leading edge of an electron.
    #[must_use]
    pub const fn is_head(self) -> bool {
        matches!(self, Self::ElectronHead)
    }
}

/// Static configuration for one simulation instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireworldConfig {
    /// Grid width in cells.
    pub width: u32,
    /// Grid height in cells.
    pub height: u32,
    /// Maximum number of recent generation summaries retained in-memory.
    pub history_capacity: usize,
}

impl Default for WireworldConfig {
    fn default() -> Self {
        Self {
            width: 90,
            height: 50,
            history_capacity: 256,
        }
    }
}

impl WireworldConfig {
    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), WireworldError> {
        if self.width == 0 || self.height == 0 {
            return Err(WireworldError::InvalidConfig(
                "grid dimensions must be non-zero",
            ));
        }
        if self.history_capacity == 0 {
            return Err(WireworldError::InvalidConfig(
                "history_capacity must be non-zero",
            ));
        }
        Ok(())
    }

    /// Number of cells covered by the configured grid.
    #[must_use]
    pub const fn cell_count(&self) -> usize {
        (self.width as usize) * (self.height as usize)
    }
}

/// Fixed-size grid of cell states stored row-major in a flat vector.
///
/// A board is a snapshot of one generation. [`advance`] never mutates its
/// input; each tick assembles a brand-new board from reads of the frozen
/// prior one, so evaluation order within a tick cannot matter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Board {
    width: u32,
    height: u32,
    cells: Vec<CellState>,
}

impl Board {
    /// Constructs an all-[`CellState::Empty`] board.
    pub fn new(width: u32, height: u32) -> Result<Self, WireworldError> {
        if width == 0 || height == 0 {
            return Err(WireworldError::InvalidConfig(
                "grid dimensions must be non-zero",
            ));
        }
        Ok(Self {
            width,
            height,
            cells: vec![CellState::Empty; (width as usize) * (height as usize)],
        })
    }

    /// Constructs a board from exactly `width * height` cells in row-major
    /// order (index = y·width + x).
    pub fn from_flat_sequence(
        width: u32,
        height: u32,
        cells: Vec<CellState>,
    ) -> Result<Self, WireworldError> {
        if width == 0 || height == 0 {
            return Err(WireworldError::InvalidConfig(
                "grid dimensions must be non-zero",
            ));
        }
        let expected = (width as usize) * (height as usize);
        if cells.len() != expected {
            return Err(WireworldError::ShapeMismatch {
                width,
                height,
                expected,
                actual: cells.len(),
            });
        }
        Ok(Self {
            width,
            height,
            cells,
        })
    }

    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }

    /// Row-major view of every cell.
    #[must_use]
    pub fn cells(&self) -> &[CellState] {
        &self.cells
    }

    /// Returns the flat index for `(x, y)` without bounds checks.
    #[inline]
    fn offset(&self, x: u32, y: u32) -> usize {
        (y as usize) * (self.width as usize) + (x as usize)
    }

    #[inline]
    fn assert_in_range(&self, x: u32, y: u32) {
        assert!(
            x < self.width && y < self.height,
            "cell ({x}, {y}) outside {}x{} board",
            self.width,
            self.height,
        );
    }

    /// State at `(x, y)`.
    ///
    /// # Panics
    ///
    /// Out-of-range coordinates are a programming fault and panic; only the
    /// neighbor probes are allowed to skip out-of-range reads silently.
    #[must_use]
    pub fn get(&self, x: u32, y: u32) -> CellState {
        self.assert_in_range(x, y);
        self.cells[self.offset(x, y)]
    }

    /// Writes `state` at `(x, y)`. Panics on out-of-range coordinates.
    pub fn set(&mut self, x: u32, y: u32, state: CellState) {
        self.assert_in_range(x, y);
        let idx = self.offset(x, y);
        self.cells[idx] = state;
    }

    /// Electron heads among the horizontal pair `(x-1, row)`, `(x+1, row)`.
    ///
    /// The row is signed so the diagonal probes can ask about rows just
    /// outside the grid; such rows contribute nothing.
    fn paired_row_heads(&self, x: u32, row: i64) -> u8 {
        if row < 0 || row >= i64::from(self.height) {
            return 0;
        }
        let y = row as u32;
        let mut heads = 0;
        if x > 0 && self.get(x - 1, y).is_head() {
            heads += 1;
        }
        if x + 1 < self.width && self.get(x + 1, y).is_head() {
            heads += 1;
        }
        heads
    }

    /// Electron heads among the vertical pair `(x, y-1)`, `(x, y+1)`.
    fn paired_column_heads(&self, x: u32, y: u32) -> u8 {
        let mut heads = 0;
        if y > 0 && self.get(x, y - 1).is_head() {
            heads += 1;
        }
        if y + 1 < self.height && self.get(x, y + 1).is_head() {
            heads += 1;
        }
        heads
    }

    /// Counts electron heads around `(x, y)` using the automaton's
    /// four-probe construction: the horizontal pair on the cell's own row,
    /// the vertical pair on its column, and the horizontal pairs on the
    /// rows above and below. This is deliberately not a uniform Moore
    /// neighborhood count; the reference behavior is built from these four
    /// paired reads and is reproduced here bit-for-bit.
    #[must_use]
    pub fn electron_head_neighbors(&self, x: u32, y: u32) -> u8 {
        self.assert_in_range(x, y);
        let row = i64::from(y);
        self.paired_row_heads(x, row)
            + self.paired_column_heads(x, y)
            + self.paired_row_heads(x, row - 1)
            + self.paired_row_heads(x, row + 1)
    }
}

/// Transition rule for one cell: pure function of the current state and the
/// four-probe head count.
#[must_use]
pub const fn next_state(current: CellState, head_neighbors: u8) -> CellState {
    match current {
        CellState::Empty => CellState::Empty,
        CellState::ElectronHead => CellState::ElectronTail,
        CellState::ElectronTail => CellState::Conductor,
        CellState::Conductor => match head_neighbors {
            1 | 2 => CellState::ElectronHead,
            _ => CellState::Conductor,
        },
    }
}

/// Advances one generation: every cell's next state is computed from the
/// frozen input board and assembled into a new board. Pure and
/// deterministic; identical boards always advance to identical boards.
#[must_use]
pub fn advance(board: &Board) -> Board {
    let mut cells = Vec::with_capacity(board.cells.len());
    for y in 0..board.height {
        for x in 0..board.width {
            cells.push(next_state(
                board.get(x, y),
                board.electron_head_neighbors(x, y),
            ));
        }
    }
    Board {
        width: board.width,
        height: board.height,
        cells,
    }
}

/// Census of one generation, recorded after each tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationSummary {
    pub tick: Tick,
    pub conductors: usize,
    pub heads: usize,
    pub tails: usize,
    /// Cells whose state differs from the previous generation.
    pub changed: usize,
}

impl GenerationSummary {
    fn census(tick: Tick, board: &Board, changed: usize) -> Self {
        let mut conductors = 0;
        let mut heads = 0;
        let mut tails = 0;
        for cell in board.cells() {
            match cell {
                CellState::Empty => {}
                CellState::Conductor => conductors += 1,
                CellState::ElectronHead => heads += 1,
                CellState::ElectronTail => tails += 1,
            }
        }
        Self {
            tick,
            conductors,
            heads,
            tails,
            changed,
        }
    }

    /// Cells currently carrying charge.
    #[must_use]
    pub const fn electrons(&self) -> usize {
        self.heads + self.tails
    }
}

/// Owns the current board and advances it tick by tick.
///
/// The board reference is replaced wholesale at the end of each tick, never
/// edited in place, so a consumer may stop between any two ticks with no
/// partial state to clean up.
#[derive(Debug, Clone)]
pub struct Simulation {
    config: WireworldConfig,
    tick: Tick,
    board: Board,
    history: VecDeque<GenerationSummary>,
}

impl Simulation {
    /// Builds a simulation from a validated config and an initial board
    /// whose dimensions must match the config exactly.
    pub fn new(config: WireworldConfig, board: Board) -> Result<Self, WireworldError> {
        config.validate()?;
        if board.width() != config.width || board.height() != config.height {
            return Err(WireworldError::ShapeMismatch {
                width: config.width,
                height: config.height,
                expected: config.cell_count(),
                actual: board.cells().len(),
            });
        }
        let mut history = VecDeque::with_capacity(config.history_capacity);
        history.push_back(GenerationSummary::census(Tick(0), &board, 0));
        Ok(Self {
            config,
            tick: Tick(0),
            board,
            history,
        })
    }

    /// Builds a simulation directly from a flat row-major cell sequence.
    pub fn from_flat_sequence(
        config: WireworldConfig,
        cells: Vec<CellState>,
    ) -> Result<Self, WireworldError> {
        let board = Board::from_flat_sequence(config.width, config.height, cells)?;
        Self::new(config, board)
    }

    #[must_use]
    pub const fn config(&self) -> &WireworldConfig {
        &self.config
    }

    #[must_use]
    pub const fn tick(&self) -> Tick {
        self.tick
    }

    /// Snapshot of the current generation.
    #[must_use]
    pub const fn board(&self) -> &Board {
        &self.board
    }

    /// Recent generation summaries, oldest first, bounded by
    /// `history_capacity`.
    pub fn history(&self) -> impl Iterator<Item = &GenerationSummary> {
        self.history.iter()
    }

    /// Census of the current generation.
    #[must_use]
    pub fn latest_summary(&self) -> GenerationSummary {
        *self
            .history
            .back()
            .expect("history holds at least the current generation")
    }

    /// Advances one generation, replacing the current board with the next
    /// one, and records its summary.
    pub fn step(&mut self) -> GenerationSummary {
        let next = advance(&self.board);
        let changed = self
            .board
            .cells()
            .iter()
            .zip(next.cells())
            .filter(|(before, after)| before != after)
            .count();
        self.tick = Tick(self.tick.0 + 1);
        self.board = next;
        let summary = GenerationSummary::census(self.tick, &self.board, changed);
        while self.history.len() >= self.config.history_capacity {
            self.history.pop_front();
        }
        self.history.push_back(summary);
        summary
    }

    /// Unbounded iterator of generations; the consumer decides when to
    /// stop. Each `next()` performs exactly one `step()`.
    pub fn generations(&mut self) -> Generations<'_> {
        Generations { simulation: self }
    }
}

/// Iterator adapter over [`Simulation::step`].
#[derive(Debug)]
pub struct Generations<'a> {
    simulation: &'a mut Simulation,
}

impl Iterator for Generations<'_> {
    type Item = GenerationSummary;

    fn next(&mut self) -> Option<Self::Item> {
        Some(self.simulation.step())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn board_from(width: u32, height: u32, cells: &[CellState]) -> Board {
        Board::from_flat_sequence(width, height, cells.to_vec()).expect("board")
    }

    #[test]
    fn set_then_get_leaves_other_cells_unchanged() {
        let mut board = Board::new(4, 3).expect("board");
        board.set(2, 1, CellState::Conductor);
        assert_eq!(board.get(2, 1), CellState::Conductor);
        let untouched = board
            .cells()
            .iter()
            .filter(|&&cell| cell == CellState::Empty)
            .count();
        assert_eq!(untouched, 11);
    }

    #[test]
    fn from_flat_sequence_rejects_wrong_length() {
        let err = Board::from_flat_sequence(3, 2, vec![CellState::Empty; 5]).unwrap_err();
        assert_eq!(
            err,
            WireworldError::ShapeMismatch {
                width: 3,
                height: 2,
                expected: 6,
                actual: 5,
            }
        );
    }

    #[test]
    fn from_rgb_covers_the_four_states_and_nothing_else() {
        for state in [
            CellState::Empty,
            CellState::Conductor,
            CellState::ElectronHead,
            CellState::ElectronTail,
        ] {
            assert_eq!(CellState::from_rgb(state.rgb()), Ok(state));
        }
        assert_eq!(
            CellState::from_rgb([10, 20, 30]),
            Err(WireworldError::InvalidState(10, 20, 30))
        );
    }

    #[test]
    #[should_panic(expected = "outside")]
    fn direct_access_out_of_range_panics() {
        let board = Board::new(4, 4).expect("board");
        let _ = board.get(4, 0);
    }

    #[test]
    fn rule_table_is_exhaustive() {
        assert_eq!(next_state(CellState::Empty, 8), CellState::Empty);
        assert_eq!(next_state(CellState::ElectronHead, 0), CellState::ElectronTail);
        assert_eq!(next_state(CellState::ElectronTail, 0), CellState::Conductor);
        assert_eq!(next_state(CellState::Conductor, 0), CellState::Conductor);
        assert_eq!(next_state(CellState::Conductor, 1), CellState::ElectronHead);
        assert_eq!(next_state(CellState::Conductor, 2), CellState::ElectronHead);
        assert_eq!(next_state(CellState::Conductor, 3), CellState::Conductor);
        assert_eq!(next_state(CellState::Conductor, 8), CellState::Conductor);
    }

    #[test]
    fn probe_count_uses_the_four_paired_reads() {
        // Heads in every surrounding cell of a 3x3 block; the center sees
        // all eight through the four probes.
        use super::CellState::{Conductor as C, ElectronHead as H};
        let board = board_from(3, 3, &[H, H, H, H, C, H, H, H, H]);
        assert_eq!(board.electron_head_neighbors(1, 1), 8);
    }

    #[test]
    fn corner_probes_count_only_in_range_neighbors() {
        use super::CellState::{Conductor as C, Empty as E, ElectronHead as H};
        let board = board_from(3, 3, &[C, H, E, H, H, E, E, E, E]);
        // (0, 0) reaches (1, 0), (0, 1), and (1, 1); the five reads that
        // would fall outside the grid are skipped, not clamped.
        assert_eq!(board.electron_head_neighbors(0, 0), 3);
        assert_eq!(board.electron_head_neighbors(2, 2), 1);
    }

    #[test]
    fn history_is_bounded_by_capacity() {
        let config = WireworldConfig {
            width: 3,
            height: 1,
            history_capacity: 4,
        };
        let board = board_from(
            3,
            1,
            &[
                CellState::ElectronHead,
                CellState::Conductor,
                CellState::Conductor,
            ],
        );
        let mut simulation = Simulation::new(config, board).expect("simulation");
        for _ in 0..10 {
            simulation.step();
        }
        assert_eq!(simulation.history().count(), 4);
        assert_eq!(simulation.tick(), Tick(10));
    }

    #[test]
    fn simulation_rejects_mismatched_board() {
        let config = WireworldConfig {
            width: 4,
            height: 4,
            ..WireworldConfig::default()
        };
        let board = Board::new(3, 4).expect("board");
        assert!(matches!(
            Simulation::new(config, board),
            Err(WireworldError::ShapeMismatch { .. })
        ));
    }
}
