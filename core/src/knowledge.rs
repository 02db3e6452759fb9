use alloc::collections::BTreeSet;
use alloc::vec::Vec;
use rand::Rng;
use rand::seq::IndexedRandom;
use serde::{Deserialize, Serialize};

use crate::*;

/// What a single observation taught the engine.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deduction {
    /// Sweeps the fixed-point pass needed, including the final one that changed nothing.
    pub sweeps: usize,
    /// Cells that became known safe during the call, the observed cell included.
    pub new_safes: BTreeSet<Cell>,
    /// Cells that became known mines during the call.
    pub new_mines: BTreeSet<Cell>,
}

/// Owned copy of everything the engine currently knows.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnowledgeSnapshot {
    pub size: Coord2,
    pub moves_made: BTreeSet<Cell>,
    pub mines: BTreeSet<Cell>,
    pub safes: BTreeSet<Cell>,
    pub knowledge: Vec<Sentence>,
}

/// Minesweeper player that only learns from revealed counts, never from the board itself.
///
/// Every live sentence only mentions cells that are neither known mines nor known safes: new sentences are built
/// from unknown neighbours, derived sentences are subsets of live ones, and every mark is applied to all of them.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeEngine {
    size: Coord2,
    moves_made: BTreeSet<Cell>,
    mines: BTreeSet<Cell>,
    safes: BTreeSet<Cell>,
    knowledge: Vec<Sentence>,
    sweep_limit: usize,
    sound: bool,
}

impl KnowledgeEngine {
    pub fn new(size: Coord2) -> Self {
        Self {
            size,
            moves_made: BTreeSet::new(),
            mines: BTreeSet::new(),
            safes: BTreeSet::new(),
            knowledge: Vec::new(),
            sweep_limit: Self::default_sweep_limit(size),
            sound: true,
        }
    }

    /// Every sweep but the last either learns a new cell or is directly followed by one that does, so twice the
    /// cell count plus the closing sweeps is never reached by consistent observations.
    pub fn default_sweep_limit(size: Coord2) -> usize {
        2 * usize::from(mult(size.0, size.1)) + 2
    }

    pub fn with_sweep_limit(mut self, sweep_limit: usize) -> Self {
        self.sweep_limit = sweep_limit.max(1);
        self
    }

    pub fn size(&self) -> Coord2 {
        self.size
    }

    pub fn moves_made(&self) -> &BTreeSet<Cell> {
        &self.moves_made
    }

    pub fn mines(&self) -> &BTreeSet<Cell> {
        &self.mines
    }

    pub fn safes(&self) -> &BTreeSet<Cell> {
        &self.safes
    }

    pub fn knowledge(&self) -> &[Sentence] {
        &self.knowledge
    }

    /// `false` once a contradiction was found, after which no further updates are accepted.
    pub fn is_sound(&self) -> bool {
        self.sound
    }

    pub fn contains(&self, cell: Cell) -> bool {
        in_bounds(cell, self.size)
    }

    pub fn neighbors(&self, cell: Cell) -> Neighbors {
        neighbors(cell, self.size)
    }

    pub fn snapshot(&self) -> KnowledgeSnapshot {
        KnowledgeSnapshot {
            size: self.size,
            moves_made: self.moves_made.clone(),
            mines: self.mines.clone(),
            safes: self.safes.clone(),
            knowledge: self.knowledge.clone(),
        }
    }

    /// Records `cell` as a mine in the engine and in every sentence.
    pub fn mark_mine(&mut self, cell: Cell) -> KnowledgeResult<MarkOutcome> {
        self.check_update(cell)?;
        let result = self.apply_mine(cell);
        self.guard(result)
    }

    /// Records `cell` as safe in the engine and in every sentence.
    pub fn mark_safe(&mut self, cell: Cell) -> KnowledgeResult<MarkOutcome> {
        self.check_update(cell)?;
        let result = self.apply_safe(cell);
        self.guard(result)
    }

    /// Takes in that the revealed `cell` has `count` mines around it, then deduces all it can.
    pub fn add_knowledge(&mut self, cell: Cell, count: u8) -> KnowledgeResult<Deduction> {
        self.check_update(cell)?;
        if self.moves_made.contains(&cell) {
            return Err(KnowledgeError::AlreadyPlayed(cell));
        }
        let result = self.observe(cell, count);
        self.guard(result)
    }

    /// Some known safe cell that was not played yet.
    pub fn safe_move(&self) -> Option<Cell> {
        self.safes.difference(&self.moves_made).next().copied()
    }

    /// A uniformly random cell that was neither played nor is known to be a mine.
    pub fn random_move<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<Cell> {
        let candidates: Vec<Cell> = iter_cells(self.size)
            .filter(|cell| !self.moves_made.contains(cell) && !self.mines.contains(cell))
            .collect();
        candidates.choose(rng).copied()
    }

    fn check_update(&self, cell: Cell) -> KnowledgeResult<()> {
        if !self.sound {
            return Err(KnowledgeError::Unsound);
        }
        if !self.contains(cell) {
            return Err(KnowledgeError::OutOfBounds(cell));
        }
        Ok(())
    }

    fn guard<T>(&mut self, result: KnowledgeResult<T>) -> KnowledgeResult<T> {
        if let Err(err) = &result {
            if err.is_breach() {
                log::warn!("Knowledge became unsound: {}", err);
                self.sound = false;
            }
        }
        result
    }

    fn observe(&mut self, cell: Cell, count: u8) -> KnowledgeResult<Deduction> {
        let safes_before = self.safes.clone();
        let mines_before = self.mines.clone();

        self.moves_made.insert(cell);
        self.apply_safe(cell)?;

        let sentence = self.observation_sentence(cell, count)?;
        log::debug!("Observed {:?} with {} adjacent mines: {}", cell, count, sentence);
        self.insert_sentence(sentence);

        let sweeps = self.settle()?;

        let new_safes: BTreeSet<Cell> = self.safes.difference(&safes_before).copied().collect();
        let new_mines: BTreeSet<Cell> = self.mines.difference(&mines_before).copied().collect();
        log::debug!(
            "Settled after {} sweeps, learned {} safes and {} mines",
            sweeps,
            new_safes.len(),
            new_mines.len()
        );

        Ok(Deduction {
            sweeps,
            new_safes,
            new_mines,
        })
    }

    /// The sentence over the still unknown neighbours of `cell`, with known mines taken out of `count`.
    fn observation_sentence(&self, cell: Cell, count: u8) -> KnowledgeResult<Sentence> {
        let mut remaining = CellCount::from(count);
        let mut unknown = Neighbors::new();

        for neighbor in self.neighbors(cell) {
            if self.safes.contains(&neighbor) {
                continue;
            }
            if self.mines.contains(&neighbor) {
                remaining = remaining
                    .checked_sub(1)
                    .ok_or(Contradiction::ClueBelowKnownMines { cell, count })?;
                continue;
            }
            unknown.push(neighbor);
        }

        Ok(Sentence::new(unknown, remaining)?)
    }

    fn insert_sentence(&mut self, sentence: Sentence) -> bool {
        if self.knowledge.contains(&sentence) {
            return false;
        }
        self.knowledge.push(sentence);
        true
    }

    fn apply_mine(&mut self, cell: Cell) -> KnowledgeResult<MarkOutcome> {
        if self.safes.contains(&cell) {
            return Err(Contradiction::MineAndSafe { cell }.into());
        }
        if !self.mines.insert(cell) {
            return Ok(MarkOutcome::NoChange);
        }
        log::trace!("Marked {:?} as a mine", cell);
        for sentence in &mut self.knowledge {
            sentence.mark_mine(cell)?;
        }
        Ok(MarkOutcome::Changed)
    }

    fn apply_safe(&mut self, cell: Cell) -> KnowledgeResult<MarkOutcome> {
        if self.mines.contains(&cell) {
            return Err(Contradiction::MineAndSafe { cell }.into());
        }
        if !self.safes.insert(cell) {
            return Ok(MarkOutcome::NoChange);
        }
        log::trace!("Marked {:?} as safe", cell);
        for sentence in &mut self.knowledge {
            sentence.mark_safe(cell)?;
        }
        Ok(MarkOutcome::Changed)
    }

    /// Runs cleanup, direct inference and subset resolution until a whole sweep changes nothing.
    fn settle(&mut self) -> KnowledgeResult<usize> {
        let mut sweeps = 0;
        loop {
            if sweeps == self.sweep_limit {
                return Err(KnowledgeError::DidNotSettle { sweeps });
            }
            sweeps += 1;

            self.knowledge.retain(|sentence| !sentence.is_empty());
            let marked = self.apply_direct_inference()?;
            let resolved = self.resolve_subsets()?;
            log::trace!(
                "Sweep {}: marked {}, resolved {}, {} sentences",
                sweeps,
                marked.has_update(),
                resolved,
                self.knowledge.len()
            );

            if !marked.has_update() && !resolved {
                return Ok(sweeps);
            }
        }
    }

    fn apply_direct_inference(&mut self) -> KnowledgeResult<MarkOutcome> {
        let mut safes = BTreeSet::new();
        let mut mines = BTreeSet::new();
        for sentence in &self.knowledge {
            safes.extend(sentence.known_safes());
            mines.extend(sentence.known_mines());
        }

        let mut outcome = MarkOutcome::NoChange;
        for cell in safes {
            outcome = outcome | self.apply_safe(cell)?;
        }
        for cell in mines {
            outcome = outcome | self.apply_mine(cell)?;
        }
        Ok(outcome)
    }

    /// Replaces every sentence that contains another one by their difference.
    ///
    /// Each replacement shrinks the total number of cells held by live sentences, so the loop ends.
    fn resolve_subsets(&mut self) -> KnowledgeResult<bool> {
        let mut resolved = false;
        while let Some((subset, superset)) = self.find_subset_pair() {
            let derived = self.knowledge[superset].difference(&self.knowledge[subset])?;
            log::trace!(
                "Resolved {} against {} into {}",
                self.knowledge[superset],
                self.knowledge[subset],
                derived
            );
            self.knowledge.swap_remove(superset);
            self.insert_sentence(derived);
            resolved = true;
        }
        Ok(resolved)
    }

    fn find_subset_pair(&self) -> Option<(usize, usize)> {
        self.knowledge
            .iter()
            .enumerate()
            .filter(|(_, subset)| !subset.is_empty())
            .find_map(|(i, subset)| {
                self.knowledge
                    .iter()
                    .enumerate()
                    .find(|&(j, superset)| i != j && subset.is_subset(superset))
                    .map(|(j, _)| (i, j))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::SmallRng;

    fn sentence(cells: &[Cell], count: CellCount) -> Sentence {
        Sentence::new(cells.iter().copied(), count).unwrap()
    }

    fn cells(cells: &[Cell]) -> BTreeSet<Cell> {
        cells.iter().copied().collect()
    }

    fn assert_consistent(engine: &KnowledgeEngine) {
        assert!(engine.mines().is_disjoint(engine.safes()));
        assert!(engine.moves_made().is_subset(engine.safes()));
        for s in engine.knowledge() {
            assert!(usize::from(s.count()) <= s.len());
            assert!(s.cells().is_disjoint(engine.mines()));
            assert!(s.cells().is_disjoint(engine.safes()));
        }
    }

    #[test]
    fn subset_resolution_finds_the_extra_mine() {
        let mut engine = KnowledgeEngine::new((1, 4));
        engine.insert_sentence(sentence(&[(0, 1), (0, 2)], 1));
        engine.insert_sentence(sentence(&[(0, 1), (0, 2), (0, 3)], 2));

        engine.settle().unwrap();

        assert_eq!(engine.mines(), &cells(&[(0, 3)]));
        assert!(engine.knowledge().contains(&sentence(&[(0, 1), (0, 2)], 1)));
        assert_consistent(&engine);
    }

    #[test]
    fn zero_count_sentence_resolves_in_one_pass() {
        let mut engine = KnowledgeEngine::new((1, 3));
        engine.insert_sentence(sentence(&[(0, 1), (0, 2)], 0));

        engine.settle().unwrap();

        assert_eq!(engine.safes(), &cells(&[(0, 1), (0, 2)]));
        assert!(engine.knowledge().is_empty());
    }

    #[test]
    fn strip_reveal_cascades_without_guessing_the_mine() {
        let mut engine = KnowledgeEngine::new((1, 3));

        let deduction = engine.add_knowledge((0, 0), 0).unwrap();

        assert_eq!(deduction.new_safes, cells(&[(0, 0), (0, 1)]));
        assert!(deduction.new_mines.is_empty());
        assert_eq!(engine.safes(), &cells(&[(0, 0), (0, 1)]));
        assert!(!engine.mines().contains(&(0, 2)));
        assert!(!engine.safes().contains(&(0, 2)));
        assert_eq!(engine.safe_move(), Some((0, 1)));

        let deduction = engine.add_knowledge((0, 1), 1).unwrap();

        assert_eq!(deduction.new_mines, cells(&[(0, 2)]));
        assert_eq!(engine.safe_move(), None);
        assert_consistent(&engine);
    }

    #[test]
    fn known_mines_lower_the_new_sentence_count() {
        // mines at (0, 0) and (0, 2)
        let mut engine = KnowledgeEngine::new((2, 3));
        engine.mark_mine((0, 0)).unwrap();

        engine.add_knowledge((1, 0), 1).unwrap();

        // (0, 1) and (1, 1) are the only unknown neighbours and hold no mine
        assert!(engine.safes().contains(&(0, 1)));
        assert!(engine.safes().contains(&(1, 1)));

        engine.add_knowledge((1, 1), 2).unwrap();

        // one of the two mines is already accounted for
        assert_eq!(engine.knowledge(), [sentence(&[(0, 2), (1, 2)], 1)]);
        assert_eq!(engine.mines(), &cells(&[(0, 0)]));
        assert_consistent(&engine);
    }

    #[test]
    fn overlapping_clues_stay_undetermined() {
        // mine at (1, 2)
        let mut engine = KnowledgeEngine::new((2, 3));

        engine.add_knowledge((0, 0), 0).unwrap();
        engine.add_knowledge((0, 1), 1).unwrap();
        engine.add_knowledge((1, 1), 1).unwrap();

        assert!(engine.mines().is_empty());
        assert_eq!(engine.knowledge(), [sentence(&[(0, 2), (1, 2)], 1)]);

        engine.add_knowledge((0, 2), 1).unwrap();

        assert_eq!(engine.mines(), &cells(&[(1, 2)]));
        assert!(engine.knowledge().is_empty());
        assert_consistent(&engine);
    }

    #[test]
    fn marks_are_idempotent() {
        let mut engine = KnowledgeEngine::new((3, 3));
        engine.add_knowledge((0, 0), 1).unwrap();

        assert_eq!(engine.mark_mine((1, 1)), Ok(MarkOutcome::Changed));
        let once = engine.clone();
        assert_eq!(engine.mark_mine((1, 1)), Ok(MarkOutcome::NoChange));
        assert_eq!(engine, once);

        assert_eq!(engine.mark_safe((2, 2)), Ok(MarkOutcome::Changed));
        let once = engine.clone();
        assert_eq!(engine.mark_safe((2, 2)), Ok(MarkOutcome::NoChange));
        assert_eq!(engine, once);
    }

    #[test]
    fn rejects_out_of_bounds_and_replayed_cells() {
        let mut engine = KnowledgeEngine::new((2, 2));

        assert_eq!(
            engine.add_knowledge((2, 0), 0),
            Err(KnowledgeError::OutOfBounds((2, 0)))
        );
        engine.add_knowledge((0, 0), 1).unwrap();
        assert_eq!(
            engine.add_knowledge((0, 0), 1),
            Err(KnowledgeError::AlreadyPlayed((0, 0)))
        );
        assert!(engine.is_sound());
    }

    #[test]
    fn impossible_count_makes_engine_unsound() {
        let mut engine = KnowledgeEngine::new((1, 2));

        let err = engine.add_knowledge((0, 0), 2).unwrap_err();

        assert_eq!(
            err,
            KnowledgeError::Contradiction(Contradiction::CountExceedsCells { count: 2, cells: 1 })
        );
        assert!(!engine.is_sound());
        assert_eq!(engine.mark_safe((0, 1)), Err(KnowledgeError::Unsound));
    }

    #[test]
    fn conflicting_marks_are_contradictions() {
        let mut engine = KnowledgeEngine::new((1, 3));
        engine.add_knowledge((0, 0), 0).unwrap();

        assert_eq!(
            engine.mark_mine((0, 1)),
            Err(KnowledgeError::Contradiction(Contradiction::MineAndSafe {
                cell: (0, 1)
            }))
        );
        assert!(!engine.is_sound());
    }

    #[test]
    fn clue_below_known_mines_is_a_contradiction() {
        let mut engine = KnowledgeEngine::new((1, 3));
        engine.mark_mine((0, 1)).unwrap();

        assert_eq!(
            engine.add_knowledge((0, 0), 0),
            Err(KnowledgeError::Contradiction(
                Contradiction::ClueBelowKnownMines {
                    cell: (0, 0),
                    count: 0
                }
            ))
        );
    }

    #[test]
    fn sweep_limit_is_enforced() {
        let mut engine = KnowledgeEngine::new((1, 3)).with_sweep_limit(1);

        assert_eq!(
            engine.add_knowledge((0, 0), 0),
            Err(KnowledgeError::DidNotSettle { sweeps: 1 })
        );
        assert!(!engine.is_sound());
    }

    #[test]
    fn random_move_avoids_played_cells_and_mines() {
        let mut engine = KnowledgeEngine::new((2, 2));
        let mut rng = SmallRng::seed_from_u64(3);
        engine.add_knowledge((0, 0), 1).unwrap();
        engine.mark_mine((1, 1)).unwrap();

        for _ in 0..32 {
            let cell = engine.random_move(&mut rng).unwrap();
            assert!(cell == (0, 1) || cell == (1, 0));
        }
    }

    #[test]
    fn random_move_reports_exhausted_board() {
        let mut engine = KnowledgeEngine::new((1, 2));
        let mut rng = SmallRng::seed_from_u64(3);
        engine.add_knowledge((0, 0), 1).unwrap();

        assert_eq!(engine.mines(), &cells(&[(0, 1)]));
        assert_eq!(engine.random_move(&mut rng), None);
        assert_eq!(engine.safe_move(), None);
    }

    #[test]
    fn snapshot_copies_state() {
        let mut engine = KnowledgeEngine::new((1, 3));
        engine.add_knowledge((0, 0), 0).unwrap();

        let snapshot = engine.snapshot();

        assert_eq!(snapshot.size, (1, 3));
        assert_eq!(&snapshot.safes, engine.safes());
        assert_eq!(&snapshot.moves_made, engine.moves_made());
        assert_eq!(snapshot.knowledge, engine.knowledge());
    }
}
