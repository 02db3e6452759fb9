use alloc::collections::BTreeSet;
use alloc::vec::Vec;
use core::fmt;
use core::ops::Index;
use ndarray::Array2;
use rand::SeedableRng;
use rand::rngs::SmallRng;
use rand::seq::IndexedRandom;
use serde::{Deserialize, Serialize};

use crate::*;

/// The true board: where the mines are. Only the referee looks at it, the engine never does.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Minefield {
    mine_mask: Array2<bool>,
    mine_count: CellCount,
}

impl Minefield {
    pub fn from_mine_mask(mine_mask: Array2<bool>) -> Result<Self> {
        let (rows, cols) = mine_mask.dim();
        if rows > usize::from(Coord::MAX) || cols > usize::from(Coord::MAX) {
            return Err(GameError::InvalidBoardShape);
        }
        let mine_count = mine_mask
            .iter()
            .filter(|&&is_mine| is_mine)
            .count()
            .try_into()
            .map_err(|_| GameError::TooManyMines)?;
        Ok(Self {
            mine_mask,
            mine_count,
        })
    }

    pub fn from_mine_coords(size: Coord2, mine_coords: &[Cell]) -> Result<Self> {
        let mut mine_mask: Array2<bool> = Array2::default(size.to_nd_index());

        for &cell in mine_coords {
            if !in_bounds(cell, size) {
                return Err(GameError::InvalidCoords);
            }
            mine_mask[cell.to_nd_index()] = true;
        }

        Self::from_mine_mask(mine_mask)
    }

    /// Places `config.mines` mines uniformly at random, keeping `start` free when the board leaves room for it.
    pub fn random(config: GameConfig, seed: u64, start: Option<Cell>) -> Self {
        let config = GameConfig::new(config.size, config.mines);
        let wanted = usize::from(config.mines);

        let mut candidates: Vec<Cell> = iter_cells(config.size).collect();
        if let Some(start) = start.filter(|&cell| in_bounds(cell, config.size)) {
            if wanted < candidates.len() {
                candidates.retain(|&cell| cell != start);
            } else {
                log::warn!("Cannot make start cell safe, fallback to random");
            }
        }

        let mut rng = SmallRng::seed_from_u64(seed);
        let mut mine_mask: Array2<bool> = Array2::default(config.size.to_nd_index());
        for &cell in candidates.choose_multiple(&mut rng, wanted) {
            mine_mask[cell.to_nd_index()] = true;
        }

        let minefield = Self {
            mine_mask,
            mine_count: config.mines,
        };
        log::debug!(
            "Generated {}x{} minefield with {} mines from seed {}",
            config.size.0,
            config.size.1,
            minefield.mine_count,
            seed
        );
        minefield
    }

    pub fn game_config(&self) -> GameConfig {
        GameConfig {
            size: self.size(),
            mines: self.mine_count,
        }
    }

    pub fn validate_coords(&self, cell: Cell) -> Result<Cell> {
        if self.contains(cell) {
            Ok(cell)
        } else {
            Err(GameError::InvalidCoords)
        }
    }

    pub fn contains(&self, cell: Cell) -> bool {
        in_bounds(cell, self.size())
    }

    /// `(height, width)`
    pub fn size(&self) -> Coord2 {
        let (rows, cols) = self.mine_mask.dim();
        // bounded by `from_mine_mask` and the `Coord2` constructors
        (rows as Coord, cols as Coord)
    }

    pub fn total_cells(&self) -> CellCount {
        let (height, width) = self.size();
        mult(height, width)
    }

    pub fn safe_cell_count(&self) -> CellCount {
        self.total_cells() - self.mine_count
    }

    pub fn mine_count(&self) -> CellCount {
        self.mine_count
    }

    pub fn is_mine(&self, cell: Cell) -> bool {
        self[cell]
    }

    pub fn mine_cells(&self) -> BTreeSet<Cell> {
        iter_cells(self.size())
            .filter(|&cell| self[cell])
            .collect()
    }

    /// How many of the up to eight cells around `cell` hold a mine, not counting `cell` itself.
    pub fn nearby_mines(&self, cell: Cell) -> u8 {
        self.mine_mask
            .iter_neighbor_cells(cell)
            .filter(|&is_mine| is_mine)
            .count() as u8
    }
}

impl Index<Cell> for Minefield {
    type Output = bool;

    fn index(&self, (row, col): Cell) -> &Self::Output {
        &self.mine_mask[(row as usize, col as usize)]
    }
}

impl fmt::Display for Minefield {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (height, width) = self.size();
        for row in 0..height {
            write_separator(f, width)?;
            for col in 0..width {
                f.write_str(if self[(row, col)] { "|X" } else { "| " })?;
            }
            f.write_str("|\n")?;
        }
        write_separator(f, width)
    }
}

fn write_separator(f: &mut fmt::Formatter<'_>, width: Coord) -> fmt::Result {
    for _ in 0..width {
        f.write_str("--")?;
    }
    f.write_str("-\n")
}
