//! Builds the initial board: decoding a raster image whose pixel colors
//! encode cell states, or synthesizing the built-in demo circuit.

use std::path::Path;

use anyhow::{Context, Result, bail};
use tracing::info;
use wireworld_core::{Board, CellState, WireworldConfig, WireworldError};

/// Decodes a PNG into a board.
///
/// The image dimensions must match the configured grid exactly, and every
/// pixel must carry one of the four canonical state colors; anything else
/// aborts the load before the simulation starts.
pub fn load_board(config: &WireworldConfig, path: &Path) -> Result<Board> {
    let decoded = image::open(path)
        .with_context(|| format!("failed to open board image {}", path.display()))?
        .to_rgb8();

    let (width, height) = decoded.dimensions();
    if (width, height) != (config.width, config.height) {
        bail!(
            "board image {} is {width}x{height}, configuration expects {}x{}",
            path.display(),
            config.width,
            config.height,
        );
    }

    let mut cells = Vec::with_capacity(config.cell_count());
    for (x, y, pixel) in decoded.enumerate_pixels() {
        let state = CellState::from_rgb(pixel.0)
            .with_context(|| format!("pixel ({x}, {y}) in {}", path.display()))?;
        cells.push(state);
    }

    let board = Board::from_flat_sequence(config.width, config.height, cells)?;
    info!(
        target = "wireworld::loader",
        path = %path.display(),
        width,
        height,
        "Loaded board image"
    );
    Ok(board)
}

/// Synthesizes the built-in demo circuit: a closed conductor ring inset one
/// cell from the border, carrying a single clockwise electron. Used when no
/// board image is supplied.
pub fn demo_board(config: &WireworldConfig) -> Result<Board, WireworldError> {
    if config.width < 8 || config.height < 5 {
        return Err(WireworldError::InvalidConfig(
            "demo circuit needs a grid of at least 8x5",
        ));
    }

    let mut board = Board::new(config.width, config.height)?;
    let (left, right) = (1, config.width - 2);
    let (top, bottom) = (1, config.height - 2);

    for x in left..=right {
        board.set(x, top, CellState::Conductor);
        board.set(x, bottom, CellState::Conductor);
    }
    for y in top..=bottom {
        board.set(left, y, CellState::Conductor);
        board.set(right, y, CellState::Conductor);
    }

    // Tail behind head keeps the electron moving in one direction.
    board.set(left + 1, top, CellState::ElectronTail);
    board.set(left + 2, top, CellState::ElectronHead);

    Ok(board)
}
