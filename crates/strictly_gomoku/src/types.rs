//! Core domain types for gomoku.

use serde::{Deserialize, Serialize};

/// Width and height of the board.
pub const BOARD_SIZE: usize = 15;

/// Number of contiguous stones that wins the game.
pub const WIN_LENGTH: usize = 5;

/// The symbol a player places.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Mark {
    /// Black (always moves first).
    Black,
    /// White.
    White,
}

impl Mark {
    /// The mark that opens every match.
    pub const FIRST: Mark = Mark::Black;

    /// Returns the opponent mark.
    pub fn opponent(self) -> Self {
        match self {
            Mark::Black => Mark::White,
            Mark::White => Mark::Black,
        }
    }

    /// Single-character symbol used in board renderings.
    pub fn symbol(self) -> char {
        match self {
            Mark::Black => 'B',
            Mark::White => 'W',
        }
    }
}

/// A cell on the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Cell {
    /// Empty cell.
    Empty,
    /// Cell holding a stone.
    Stone(Mark),
}

impl Cell {
    /// Single-character symbol used in board renderings.
    pub fn symbol(self) -> char {
        match self {
            Cell::Empty => '.',
            Cell::Stone(mark) => mark.symbol(),
        }
    }
}

/// A board coordinate: `x` is the column, `y` the row, both zero-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Coord {
    /// Column.
    pub x: usize,
    /// Row.
    pub y: usize,
}

impl Coord {
    /// Creates a coordinate.
    pub fn new(x: usize, y: usize) -> Self {
        Self { x, y }
    }
}

impl std::fmt::Display for Coord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Terminal result of a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// The mark completed a run of five or more.
    Winner(Mark),
    /// The board filled up without a winner.
    Draw,
}

impl Outcome {
    /// Returns the winner if there is one.
    pub fn winner(&self) -> Option<Mark> {
        match self {
            Outcome::Winner(mark) => Some(*mark),
            Outcome::Draw => None,
        }
    }

    /// Returns true if the match was a draw.
    pub fn is_draw(&self) -> bool {
        matches!(self, Outcome::Draw)
    }
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Outcome::Winner(mark) => write!(f, "{} wins", mark),
            Outcome::Draw => write!(f, "Draw"),
        }
    }
}

/// Lifecycle state of a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum MatchStatus {
    /// Moves are being accepted.
    Active,
    /// The match reached a terminal outcome.
    Finished {
        /// How it ended.
        outcome: Outcome,
    },
}

impl MatchStatus {
    /// Returns true while moves are accepted.
    pub fn is_active(&self) -> bool {
        matches!(self, MatchStatus::Active)
    }

    /// Returns the outcome of a finished match.
    pub fn outcome(&self) -> Option<Outcome> {
        match self {
            MatchStatus::Active => None,
            MatchStatus::Finished { outcome } => Some(*outcome),
        }
    }
}
