use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{Cell, CellCount};

#[derive(Error, Debug, Copy, Clone, PartialEq, Eq)]
pub enum GameError {
    #[error("Invalid coordinates")]
    InvalidCoords,
    #[error("Too many mines")]
    TooManyMines,
    #[error("Board shape does not match declared size")]
    InvalidBoardShape,
    #[error("Game already ended, no new moves are accepted")]
    AlreadyEnded,
}

pub type Result<T> = core::result::Result<T, GameError>;

/// A piece of knowledge that cannot be true together with what the engine already holds.
#[derive(Error, Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Contradiction {
    #[error("{cell:?} cannot be a mine, its sentence has no mines left")]
    NegativeCount { cell: Cell },
    #[error("{count} mines cannot fit in {cells} cells")]
    CountExceedsCells { count: CellCount, cells: usize },
    #[error("Subset holds {subset} mines but its superset only {superset}")]
    SubsetCountExceeds { subset: CellCount, superset: CellCount },
    #[error("{cell:?} reported {count} adjacent mines, fewer than already known")]
    ClueBelowKnownMines { cell: Cell, count: u8 },
    #[error("{cell:?} is known to be both a mine and safe")]
    MineAndSafe { cell: Cell },
}

#[derive(Error, Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum KnowledgeError {
    #[error("Cell {0:?} is outside the board")]
    OutOfBounds(Cell),
    #[error("Cell {0:?} was already played")]
    AlreadyPlayed(Cell),
    #[error("Inconsistent knowledge: {0}")]
    Contradiction(#[from] Contradiction),
    #[error("Deduction did not settle after {sweeps} sweeps")]
    DidNotSettle { sweeps: usize },
    #[error("Knowledge is unsound after an earlier contradiction")]
    Unsound,
}

impl KnowledgeError {
    /// Whether this error leaves the engine's knowledge unusable.
    pub const fn is_breach(&self) -> bool {
        matches!(self, Self::Contradiction(_) | Self::DidNotSettle { .. })
    }
}

pub type KnowledgeResult<T> = core::result::Result<T, KnowledgeError>;
