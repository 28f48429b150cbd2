//! Game rules for gomoku.
//!
//! Pure functions over a [`GridState`](crate::GridState). Rules are kept
//! apart from board storage so the turn engine and the invariant checks
//! can share them.

pub mod draw;
pub mod win;

pub use draw::{is_draw, is_full};
pub use win::{check_win, winning_line};
