//! Turn engine: one playthrough from empty board to a terminal outcome.

use crate::action::{MoveError, MoveRecord};
use crate::grid::GridState;
use crate::invariants::{InvariantSet, InvariantViolation, MatchInvariants};
use crate::rules::{is_draw, winning_line};
use crate::types::{Coord, Mark, MatchStatus, Outcome};
use chrono::{DateTime, Utc};
use derive_getters::Getters;
use serde::Serialize;
use tracing::{debug, info, instrument};

/// Unique identifier for a match.
pub type MatchId = String;

/// A single match of gomoku.
///
/// State machine: `Active` (Black to move) until a move wins or fills the
/// board, then `Finished` for good. A finished match is never reopened;
/// callers start a new `Match` instead.
#[derive(Debug, Clone, Getters)]
pub struct Match {
    id: MatchId,
    grid: GridState,
    current_turn: Mark,
    status: MatchStatus,
    moves: Vec<MoveRecord>,
    winning_line: Option<Vec<Coord>>,
    started_at: DateTime<Utc>,
    finished_at: Option<DateTime<Utc>>,
}

/// Immutable copy of a match, safe to hand to any number of readers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatchSnapshot {
    /// Match identifier.
    pub match_id: MatchId,
    /// Copy of the board.
    pub grid: GridState,
    /// Mark to move (meaningless once finished).
    pub current_turn: Mark,
    /// Active or finished with an outcome.
    pub status: MatchStatus,
    /// Ordered move log.
    pub moves: Vec<MoveRecord>,
    /// Cells of the winning run, if the match was won.
    pub winning_line: Option<Vec<Coord>>,
    /// When the match started.
    pub started_at: DateTime<Utc>,
    /// When the match finished.
    pub finished_at: Option<DateTime<Utc>>,
}

impl MatchSnapshot {
    /// Returns the winner if the match was won.
    pub fn winner(&self) -> Option<Mark> {
        self.status.outcome().and_then(|outcome| outcome.winner())
    }

    /// Returns the most recent move.
    pub fn last_move(&self) -> Option<&MoveRecord> {
        self.moves.last()
    }
}

impl Match {
    /// Creates a new match with an empty board, started now.
    #[instrument(skip(id))]
    pub fn new(id: impl Into<MatchId>) -> Self {
        Self::with_start_time(id, Utc::now())
    }

    /// Creates a new match with an explicit start time.
    pub fn with_start_time(id: impl Into<MatchId>, started_at: DateTime<Utc>) -> Self {
        let id = id.into();
        debug!(match_id = %id, "Creating new match");
        Self {
            id,
            grid: GridState::new(),
            current_turn: Mark::FIRST,
            status: MatchStatus::Active,
            moves: Vec::new(),
            winning_line: None,
            started_at,
            finished_at: None,
        }
    }

    /// Rebuilds a match by applying `moves` in order to a fresh board.
    ///
    /// # Errors
    ///
    /// Returns the first [`MoveError`] hit while replaying.
    pub fn replay(id: impl Into<MatchId>, moves: &[MoveRecord]) -> Result<Self, MoveError> {
        let started_at = moves.first().map(|m| m.timestamp).unwrap_or_else(Utc::now);
        let mut game = Self::with_start_time(id, started_at);
        for mv in moves {
            game.apply_move_at(mv.mark, mv.x, mv.y, mv.timestamp)?;
        }
        Ok(game)
    }

    /// Applies a move for `mark` at `(x, y)`, stamped with the current time.
    ///
    /// # Errors
    ///
    /// See [`Match::apply_move_at`].
    pub fn apply_move(
        &mut self,
        mark: Mark,
        x: usize,
        y: usize,
    ) -> Result<MatchSnapshot, MoveError> {
        self.apply_move_at(mark, x, y, Utc::now())
    }

    /// Applies a move for `mark` at `(x, y)` stamped with `at`.
    ///
    /// Every check runs before anything is written, so a rejected move
    /// leaves the match exactly as it was.
    ///
    /// # Errors
    ///
    /// - [`MoveError::MatchFinished`] if the match already ended
    /// - [`MoveError::OutOfTurn`] if `mark` is not the mark to move
    /// - [`MoveError::InvalidCell`] if the cell is off the board or taken
    #[instrument(skip(self), fields(match_id = %self.id))]
    pub fn apply_move_at(
        &mut self,
        mark: Mark,
        x: usize,
        y: usize,
        at: DateTime<Utc>,
    ) -> Result<MatchSnapshot, MoveError> {
        if !self.status.is_active() {
            return Err(MoveError::MatchFinished);
        }
        if mark != self.current_turn {
            return Err(MoveError::OutOfTurn {
                expected: self.current_turn,
                actual: mark,
            });
        }
        if !self.grid.place(x, y, mark) {
            return Err(MoveError::InvalidCell(Coord::new(x, y)));
        }

        self.moves.push(MoveRecord::new(x, y, mark, at));

        if let Some(line) = winning_line(&self.grid, x, y, mark) {
            info!(winner = %mark, moves = self.moves.len(), "Match won");
            self.winning_line = Some(line);
            self.finish(Outcome::Winner(mark), at);
        } else if is_draw(&self.grid) {
            info!(moves = self.moves.len(), "Match drawn");
            self.finish(Outcome::Draw, at);
        } else {
            self.current_turn = mark.opponent();
        }

        Ok(self.snapshot())
    }

    fn finish(&mut self, outcome: Outcome, at: DateTime<Utc>) {
        self.status = MatchStatus::Finished { outcome };
        self.finished_at = Some(at);
    }

    /// Returns true while moves are accepted.
    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }

    /// Returns the outcome once finished.
    pub fn outcome(&self) -> Option<Outcome> {
        self.status.outcome()
    }

    /// Returns an immutable copy of the match.
    pub fn snapshot(&self) -> MatchSnapshot {
        MatchSnapshot {
            match_id: self.id.clone(),
            grid: self.grid.snapshot(),
            current_turn: self.current_turn,
            status: self.status,
            moves: self.moves.clone(),
            winning_line: self.winning_line.clone(),
            started_at: self.started_at,
            finished_at: self.finished_at,
        }
    }

    /// Checks every match invariant.
    ///
    /// # Errors
    ///
    /// Returns the list of violated invariants.
    pub fn check_invariants(&self) -> Result<(), Vec<InvariantViolation>> {
        MatchInvariants::check_all(self)
    }

    /// Mutable board access for invariant tests.
    #[cfg(test)]
    pub(crate) fn grid_mut(&mut self) -> &mut GridState {
        &mut self.grid
    }

    /// Mutable turn access for invariant tests.
    #[cfg(test)]
    pub(crate) fn set_current_turn(&mut self, mark: Mark) {
        self.current_turn = mark;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_match_black_to_move() {
        let game = Match::new("m");
        assert_eq!(*game.current_turn(), Mark::Black);
        assert!(game.is_active());
        assert!(game.moves().is_empty());
        assert!(game.finished_at().is_none());
    }

    #[test]
    fn test_turns_alternate() {
        let mut game = Match::new("m");
        let snap = game.apply_move(Mark::Black, 7, 7).unwrap();
        assert_eq!(snap.current_turn, Mark::White);
        let snap = game.apply_move(Mark::White, 8, 8).unwrap();
        assert_eq!(snap.current_turn, Mark::Black);
        assert_eq!(snap.moves.len(), 2);
    }

    #[test]
    fn test_out_of_turn_leaves_match_unchanged() {
        let mut game = Match::new("m");
        let before = game.snapshot();
        let err = game.apply_move(Mark::White, 0, 0).unwrap_err();
        assert_eq!(
            err,
            MoveError::OutOfTurn {
                expected: Mark::Black,
                actual: Mark::White
            }
        );
        assert_eq!(game.snapshot(), before);
    }

    #[test]
    fn test_invalid_cell_leaves_match_unchanged() {
        let mut game = Match::new("m");
        game.apply_move(Mark::Black, 1, 1).unwrap();
        let before = game.snapshot();
        assert_eq!(
            game.apply_move(Mark::White, 1, 1).unwrap_err(),
            MoveError::InvalidCell(Coord::new(1, 1))
        );
        assert_eq!(
            game.apply_move(Mark::White, 15, 2).unwrap_err(),
            MoveError::InvalidCell(Coord::new(15, 2))
        );
        assert_eq!(game.snapshot(), before);
    }

    #[test]
    fn test_finished_match_rejects_moves() {
        let mut game = Match::new("m");
        for x in 0..4 {
            game.apply_move(Mark::Black, x, 0).unwrap();
            game.apply_move(Mark::White, x, 1).unwrap();
        }
        let snap = game.apply_move(Mark::Black, 4, 0).unwrap();
        assert_eq!(snap.winner(), Some(Mark::Black));
        assert!(snap.finished_at.is_some());
        assert_eq!(snap.winning_line.as_ref().map(Vec::len), Some(5));

        let before = game.snapshot();
        assert_eq!(
            game.apply_move(Mark::White, 10, 10).unwrap_err(),
            MoveError::MatchFinished
        );
        assert_eq!(game.snapshot(), before);
    }

    #[test]
    fn test_snapshot_is_detached_from_match() {
        let mut game = Match::new("m");
        let snap = game.snapshot();
        game.apply_move(Mark::Black, 7, 7).unwrap();
        assert!(snap.moves.is_empty());
        assert_eq!(snap.grid.stone_count(), 0);
    }

    #[test]
    fn test_invariants_hold_during_play() {
        let mut game = Match::new("m");
        assert!(game.check_invariants().is_ok());
        game.apply_move(Mark::Black, 3, 3).unwrap();
        game.apply_move(Mark::White, 4, 4).unwrap();
        assert!(game.check_invariants().is_ok());
    }
}
