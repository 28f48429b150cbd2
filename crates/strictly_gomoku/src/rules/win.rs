//! Win detection logic for gomoku.
//!
//! The check is relative to the last placed stone: only the four lines
//! through that stone can have changed, so a full-board scan is never
//! needed.

use crate::grid::GridState;
use crate::types::{Cell, Coord, Mark, WIN_LENGTH};
use tracing::instrument;

/// Horizontal, vertical, diagonal and anti-diagonal step vectors.
const AXES: [(isize, isize); 4] = [(1, 0), (0, 1), (1, 1), (1, -1)];

/// Counts same-mark stones beyond `(x, y)` walking in direction `(dx, dy)`.
///
/// The walk stops at the first foreign cell or at the board edge.
fn extension(board: &GridState, x: usize, y: usize, (dx, dy): (isize, isize), mark: Mark) -> usize {
    let mut count = 0;
    let mut cx = x as isize + dx;
    let mut cy = y as isize + dy;
    while cx >= 0 && cy >= 0 && board.get(cx as usize, cy as usize) == Some(Cell::Stone(mark)) {
        count += 1;
        cx += dx;
        cy += dy;
    }
    count
}

/// Checks whether the stone at `(x, y)` completes a run of five or more.
///
/// Runs longer than five (overlines) also win.
#[instrument(skip(board))]
pub fn check_win(board: &GridState, x: usize, y: usize, mark: Mark) -> bool {
    winning_line(board, x, y, mark).is_some()
}

/// Returns the cells of the winning run through `(x, y)`, if any.
///
/// Cells are ordered from one end of the run to the other. When several
/// axes qualify the first in horizontal, vertical, diagonal,
/// anti-diagonal order is reported.
#[instrument(skip(board))]
pub fn winning_line(board: &GridState, x: usize, y: usize, mark: Mark) -> Option<Vec<Coord>> {
    if board.get(x, y) != Some(Cell::Stone(mark)) {
        return None;
    }

    for (dx, dy) in AXES {
        let forward = extension(board, x, y, (dx, dy), mark);
        let backward = extension(board, x, y, (-dx, -dy), mark);
        if 1 + forward + backward >= WIN_LENGTH {
            let start_x = x as isize - dx * backward as isize;
            let start_y = y as isize - dy * backward as isize;
            let line = (0..=(forward + backward) as isize)
                .map(|step| {
                    Coord::new((start_x + dx * step) as usize, (start_y + dy * step) as usize)
                })
                .collect();
            return Some(line);
        }
    }

    None
}
