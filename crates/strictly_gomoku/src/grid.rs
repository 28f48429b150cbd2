//! The 15×15 board.

use crate::types::{BOARD_SIZE, Cell, Mark};
use serde::{Serialize, Serializer};
use tracing::{instrument, trace};

/// Fixed-size board of mutually exclusive cells.
///
/// Once a cell holds a stone it keeps it until the whole board is
/// discarded; there is no way to clear or overwrite a single cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GridState {
    /// Cells in row-major order, indexed `[y][x]`.
    cells: [[Cell; BOARD_SIZE]; BOARD_SIZE],
}

impl GridState {
    /// Creates a new empty board.
    pub fn new() -> Self {
        Self {
            cells: [[Cell::Empty; BOARD_SIZE]; BOARD_SIZE],
        }
    }

    /// Returns true if `(x, y)` lies on the board.
    pub fn in_bounds(x: usize, y: usize) -> bool {
        x < BOARD_SIZE && y < BOARD_SIZE
    }

    /// Gets the cell at `(x, y)`, or `None` when out of bounds.
    pub fn get(&self, x: usize, y: usize) -> Option<Cell> {
        self.cells.get(y).and_then(|row| row.get(x)).copied()
    }

    /// Checks if `(x, y)` is on the board and empty.
    pub fn is_empty(&self, x: usize, y: usize) -> bool {
        matches!(self.get(x, y), Some(Cell::Empty))
    }

    /// Places `mark` at `(x, y)`.
    ///
    /// Returns false without touching the board if the coordinate is
    /// out of bounds or already occupied.
    #[instrument(skip(self))]
    pub fn place(&mut self, x: usize, y: usize, mark: Mark) -> bool {
        if !self.is_empty(x, y) {
            trace!("Rejected placement");
            return false;
        }
        self.cells[y][x] = Cell::Stone(mark);
        true
    }

    /// Returns an independent copy of the board.
    pub fn snapshot(&self) -> GridState {
        self.clone()
    }

    /// Checks if no empty cell remains.
    pub fn is_full(&self) -> bool {
        self.cells
            .iter()
            .all(|row| row.iter().all(|cell| *cell != Cell::Empty))
    }

    /// Number of stones on the board.
    pub fn stone_count(&self) -> usize {
        self.cells
            .iter()
            .flat_map(|row| row.iter())
            .filter(|cell| **cell != Cell::Empty)
            .count()
    }

    /// Renders each row as a string of `.`, `B` and `W`.
    pub fn rows(&self) -> Vec<String> {
        self.cells
            .iter()
            .map(|row| row.iter().map(|cell| cell.symbol()).collect())
            .collect()
    }

    /// Formats the board with column and row labels.
    pub fn display(&self) -> String {
        let mut result = String::from("   ");
        for x in 0..BOARD_SIZE {
            result.push_str(&format!("{:>2}", x));
        }
        for (y, row) in self.rows().iter().enumerate() {
            result.push('\n');
            result.push_str(&format!("{:>2} ", y));
            for symbol in row.chars() {
                result.push(' ');
                result.push(symbol);
            }
        }
        result
    }

    /// Overwrites a cell regardless of its contents.
    ///
    /// Only used to fabricate corrupted boards in invariant tests.
    #[cfg(test)]
    pub(crate) fn force(&mut self, x: usize, y: usize, cell: Cell) {
        self.cells[y][x] = cell;
    }
}

impl Default for GridState {
    fn default() -> Self {
        Self::new()
    }
}

impl Serialize for GridState {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.rows())
    }
}
