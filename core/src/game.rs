use alloc::collections::BTreeSet;
use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::*;

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameState {
    #[default]
    Ready,
    Active,
    Won,
    Lost,
}

impl GameState {
    pub const fn is_ready(self) -> bool {
        matches!(self, Self::Ready)
    }

    pub const fn is_finished(self) -> bool {
        matches!(self, Self::Won | Self::Lost)
    }
}

/// Referee for a single game: reveals cells one at a time and keeps track of the mines the player flagged.
///
/// The game is won once every safe cell is revealed, or once the flagged cells are exactly the mines.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Game {
    minefield: Minefield,
    revealed: Array2<Option<u8>>,
    revealed_count: CellCount,
    flags: BTreeSet<Cell>,
    state: GameState,
    triggered_mine: Option<Cell>,
}

impl Game {
    pub fn new(minefield: Minefield) -> Self {
        let size = minefield.size();
        Self {
            minefield,
            revealed: Array2::default(size.to_nd_index()),
            revealed_count: 0,
            flags: BTreeSet::new(),
            state: Default::default(),
            triggered_mine: None,
        }
    }

    pub fn state(&self) -> GameState {
        self.state
    }

    pub fn is_finished(&self) -> bool {
        self.state.is_finished()
    }

    pub fn won(&self) -> bool {
        matches!(self.state, GameState::Won)
    }

    pub fn size(&self) -> Coord2 {
        self.minefield.size()
    }

    pub fn minefield(&self) -> &Minefield {
        &self.minefield
    }

    /// The count shown on `cell`, if it was revealed.
    pub fn cell_at(&self, cell: Cell) -> Option<u8> {
        self.revealed[cell.to_nd_index()]
    }

    pub fn flags(&self) -> &BTreeSet<Cell> {
        &self.flags
    }

    pub fn triggered_mine(&self) -> Option<Cell> {
        self.triggered_mine
    }

    pub fn mines_left(&self) -> isize {
        (self.minefield.mine_count() as isize) - (self.flags.len() as isize)
    }

    /// Opens a single cell, without flood-filling around zeros.
    pub fn reveal(&mut self, cell: Cell) -> Result<RevealOutcome> {
        let cell = self.minefield.validate_coords(cell)?;
        self.check_not_finished()?;

        if self.revealed[cell.to_nd_index()].is_some() || self.flags.contains(&cell) {
            return Ok(RevealOutcome::NoChange);
        }

        if self.minefield.is_mine(cell) {
            log::debug!("Revealed mine at {:?}", cell);
            self.triggered_mine = Some(cell);
            self.state = GameState::Lost;
            return Ok(RevealOutcome::HitMine);
        }

        let count = self.minefield.nearby_mines(cell);
        self.revealed[cell.to_nd_index()] = Some(count);
        self.revealed_count += 1;
        log::debug!("Revealed {:?}, mine count: {}", cell, count);

        if self.revealed_count == self.minefield.safe_cell_count() {
            self.state = GameState::Won;
            Ok(RevealOutcome::Won)
        } else {
            self.state = GameState::Active;
            Ok(RevealOutcome::Revealed(count))
        }
    }

    /// Flags or unflags an unrevealed cell.
    pub fn toggle_flag(&mut self, cell: Cell) -> Result<MarkOutcome> {
        let cell = self.minefield.validate_coords(cell)?;
        self.check_not_finished()?;

        if self.revealed[cell.to_nd_index()].is_some() {
            return Ok(MarkOutcome::NoChange);
        }

        if !self.flags.remove(&cell) {
            self.flags.insert(cell);
        }
        if self.flags == self.minefield.mine_cells() {
            log::debug!("All {} mines flagged", self.flags.len());
            self.state = GameState::Won;
        }
        Ok(MarkOutcome::Changed)
    }

    fn check_not_finished(&self) -> Result<()> {
        if self.state.is_finished() {
            Err(GameError::AlreadyEnded)
        } else {
            Ok(())
        }
    }
}
