//! Monotonic board invariant: cells never change once set.

use super::Invariant;
use crate::game::Match;
use crate::grid::GridState;

/// Invariant: board cells are monotonic (never overwritten).
///
/// Replaying the move log onto an empty board must never hit an occupied
/// cell and must reproduce the live board exactly.
pub struct MonotonicBoardInvariant;

impl Invariant<Match> for MonotonicBoardInvariant {
    fn holds(game: &Match) -> bool {
        let mut reconstructed = GridState::new();

        for mv in game.moves() {
            if !reconstructed.place(mv.x, mv.y, mv.mark) {
                return false;
            }
        }

        reconstructed == *game.grid()
    }

    fn description() -> &'static str {
        "Board cells are monotonic and match the move log"
    }
}
