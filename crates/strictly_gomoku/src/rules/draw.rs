//! Draw detection logic for gomoku.

use crate::grid::GridState;
use tracing::instrument;

/// Checks if the board is full (all cells occupied).
#[instrument(skip(board))]
pub fn is_full(board: &GridState) -> bool {
    board.is_full()
}

/// Checks if the board admits no further move.
///
/// A draw is only a draw if the last move did not also win, so callers
/// must run [`check_win`](super::check_win) first.
#[instrument(skip(board))]
pub fn is_draw(board: &GridState) -> bool {
    is_full(board)
}
