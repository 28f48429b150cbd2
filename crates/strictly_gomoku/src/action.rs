//! Move records and move errors.
//!
//! Moves are domain events: once applied they are appended to the match
//! log and never edited.

use crate::types::{Coord, Mark};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One applied move in a match log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MoveRecord {
    /// Column.
    pub x: usize,
    /// Row.
    pub y: usize,
    /// The mark that was placed.
    pub mark: Mark,
    /// When the move was applied.
    pub timestamp: DateTime<Utc>,
}

impl MoveRecord {
    /// Creates a move record.
    pub fn new(x: usize, y: usize, mark: Mark, timestamp: DateTime<Utc>) -> Self {
        Self {
            x,
            y,
            mark,
            timestamp,
        }
    }

    /// Returns the coordinate of this move.
    pub fn coord(&self) -> Coord {
        Coord::new(self.x, self.y)
    }
}

impl std::fmt::Display for MoveRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} -> {}", self.mark, self.coord())
    }
}

/// Error that can occur when applying a move.
///
/// A rejected move never changes the match.
#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display)]
pub enum MoveError {
    /// The mover is not the mark whose turn it is.
    #[display("It's {}'s turn, not {}'s", expected, actual)]
    OutOfTurn {
        /// The mark to move.
        expected: Mark,
        /// The mark that tried to move.
        actual: Mark,
    },

    /// The cell is out of bounds or already occupied.
    #[display("Cell {} is out of bounds or already occupied", _0)]
    InvalidCell(Coord),

    /// The match already reached a terminal outcome.
    #[display("Match is already finished")]
    MatchFinished,
}

impl std::error::Error for MoveError {}
