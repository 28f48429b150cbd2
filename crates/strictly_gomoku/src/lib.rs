//! Strictly Gomoku - pure five-in-a-row game logic.
//!
//! This crate knows nothing about sessions, connections or players' names.
//! It provides the three leaf components a table host builds on:
//!
//! - **Grid**: [`GridState`], the 15×15 board with placement validation
//! - **Rules**: [`check_win`] and [`is_draw`], evaluated after every move
//! - **Match**: [`Match`], the turn engine with its append-only move log
//!
//! # Example
//!
//! ```
//! use strictly_gomoku::{Mark, Match, MatchStatus};
//!
//! let mut game = Match::new("m-1");
//! let snapshot = game.apply_move(Mark::Black, 7, 7).expect("open cell");
//! assert_eq!(snapshot.current_turn, Mark::White);
//! assert_eq!(snapshot.status, MatchStatus::Active);
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod action;
mod game;
mod grid;
mod invariants;
mod rules;
mod types;

pub use action::{MoveError, MoveRecord};
pub use game::{Match, MatchId, MatchSnapshot};
pub use grid::GridState;
pub use invariants::{
    AlternatingTurnInvariant, HistoryConsistentInvariant, Invariant, InvariantSet,
    InvariantViolation, MatchInvariants, MonotonicBoardInvariant,
};
pub use rules::{check_win, is_draw, is_full, winning_line};
pub use types::{BOARD_SIZE, Cell, Coord, Mark, MatchStatus, Outcome, WIN_LENGTH};
