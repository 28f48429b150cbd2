//! History consistency invariant: log, board and outcome agree.

use super::Invariant;
use crate::game::Match;
use crate::types::Outcome;

/// Invariant: the move log is consistent with the board and the status.
///
/// - one stone per logged move
/// - an active match has no finish time and no winning line
/// - a finished match has a finish time
/// - a win belongs to the mark of the last move and carries its line
/// - a draw only happens on a full board
pub struct HistoryConsistentInvariant;

impl Invariant<Match> for HistoryConsistentInvariant {
    fn holds(game: &Match) -> bool {
        if game.grid().stone_count() != game.moves().len() {
            return false;
        }

        match game.outcome() {
            None => game.finished_at().is_none() && game.winning_line().is_none(),
            Some(Outcome::Winner(mark)) => {
                game.finished_at().is_some()
                    && game.winning_line().is_some()
                    && game.moves().last().map(|mv| mv.mark) == Some(mark)
            }
            Some(Outcome::Draw) => game.finished_at().is_some() && game.grid().is_full(),
        }
    }

    fn description() -> &'static str {
        "Move log is consistent with board and outcome"
    }
}
