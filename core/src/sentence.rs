use alloc::collections::BTreeSet;
use core::fmt;
use serde::{Deserialize, Serialize};

use crate::*;

/// Logical statement about a board: exactly `count` of `cells` are mines.
///
/// The cell set is kept ordered, so two sentences compare and hash equal whenever they constrain the same cells to
/// the same count, regardless of how they were built.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Sentence {
    cells: BTreeSet<Cell>,
    count: CellCount,
}

impl Sentence {
    pub fn new(
        cells: impl IntoIterator<Item = Cell>,
        count: CellCount,
    ) -> core::result::Result<Self, Contradiction> {
        let cells: BTreeSet<Cell> = cells.into_iter().collect();
        if usize::from(count) > cells.len() {
            return Err(Contradiction::CountExceedsCells {
                count,
                cells: cells.len(),
            });
        }
        Ok(Self { cells, count })
    }

    pub fn cells(&self) -> &BTreeSet<Cell> {
        &self.cells
    }

    pub fn count(&self) -> CellCount {
        self.count
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn contains(&self, cell: Cell) -> bool {
        self.cells.contains(&cell)
    }

    /// Every cell, when the count accounts for all of them.
    pub fn known_mines(&self) -> BTreeSet<Cell> {
        if self.cells.len() == usize::from(self.count) {
            self.cells.clone()
        } else {
            BTreeSet::new()
        }
    }

    /// Every cell, when the count is zero.
    pub fn known_safes(&self) -> BTreeSet<Cell> {
        if self.count == 0 {
            self.cells.clone()
        } else {
            BTreeSet::new()
        }
    }

    /// Drops `cell` and one mine from the count. No-op when `cell` is not part of the sentence.
    pub fn mark_mine(&mut self, cell: Cell) -> core::result::Result<MarkOutcome, Contradiction> {
        if !self.cells.contains(&cell) {
            return Ok(MarkOutcome::NoChange);
        }
        if self.count == 0 {
            return Err(Contradiction::NegativeCount { cell });
        }
        self.cells.remove(&cell);
        self.count -= 1;
        Ok(MarkOutcome::Changed)
    }

    /// Drops `cell`, keeping the count. No-op when `cell` is not part of the sentence.
    pub fn mark_safe(&mut self, cell: Cell) -> core::result::Result<MarkOutcome, Contradiction> {
        if !self.cells.contains(&cell) {
            return Ok(MarkOutcome::NoChange);
        }
        let remaining = self.cells.len() - 1;
        if usize::from(self.count) > remaining {
            return Err(Contradiction::CountExceedsCells {
                count: self.count,
                cells: remaining,
            });
        }
        self.cells.remove(&cell);
        Ok(MarkOutcome::Changed)
    }

    pub fn is_subset(&self, other: &Sentence) -> bool {
        self.cells.is_subset(&other.cells)
    }

    /// The sentence over the cells of `self` that `subset` does not cover.
    ///
    /// `subset` must constrain a subset of `self`'s cells; its mines are then all inside `self`, so the remaining cells
    /// hold exactly the difference of the two counts.
    pub fn difference(&self, subset: &Sentence) -> core::result::Result<Sentence, Contradiction> {
        debug_assert!(subset.is_subset(self));
        let count = self
            .count
            .checked_sub(subset.count)
            .ok_or(Contradiction::SubsetCountExceeds {
                subset: subset.count,
                superset: self.count,
            })?;
        Sentence::new(self.cells.difference(&subset.cells).copied(), count)
    }
}

impl fmt::Display for Sentence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, (row, col)) in self.cells.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "({row}, {col})")?;
        }
        write!(f, "}} = {}", self.count)
    }
}
