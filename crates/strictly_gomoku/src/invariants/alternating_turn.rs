//! Alternating turn invariant: Black and White take strict turns.

use super::Invariant;
use crate::game::Match;
use crate::types::Mark;

/// Invariant: the move log alternates marks starting with the first mover.
///
/// For an active match the mark to move is the next one in that
/// alternation; for a finished match it is still the mark that moved last.
pub struct AlternatingTurnInvariant;

fn expected_mark(index: usize) -> Mark {
    if index % 2 == 0 { Mark::FIRST } else { Mark::FIRST.opponent() }
}

impl Invariant<Match> for AlternatingTurnInvariant {
    fn holds(game: &Match) -> bool {
        let moves = game.moves();

        if moves
            .iter()
            .enumerate()
            .any(|(i, mv)| mv.mark != expected_mark(i))
        {
            return false;
        }

        if game.is_active() {
            *game.current_turn() == expected_mark(moves.len())
        } else {
            moves.last().map(|mv| mv.mark) == Some(*game.current_turn())
        }
    }

    fn description() -> &'static str {
        "Marks alternate, starting with Black"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_match_holds() {
        assert!(AlternatingTurnInvariant::holds(&Match::new("m")));
    }

    #[test]
    fn test_after_moves_holds() {
        let mut game = Match::new("m");
        game.apply_move(Mark::Black, 1, 1).unwrap();
        game.apply_move(Mark::White, 2, 2).unwrap();
        game.apply_move(Mark::Black, 3, 3).unwrap();
        assert!(AlternatingTurnInvariant::holds(&game));
    }

    #[test]
    fn test_wrong_turn_violates() {
        let mut game = Match::new("m");
        game.apply_move(Mark::Black, 1, 1).unwrap();
        game.set_current_turn(Mark::Black);
        assert!(!AlternatingTurnInvariant::holds(&game));
    }
}
