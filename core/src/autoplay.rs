use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::*;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum MoveKind {
    /// Known to be safe from the engine's knowledge.
    Safe,
    /// Picked uniformly at random because nothing was known to be safe.
    Random,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlayOutcome {
    Won,
    Lost { mine: Cell, kind: MoveKind },
    /// No unplayed cell was left that is not a known mine.
    Stuck,
    /// The engine found its knowledge inconsistent with the board.
    Unsound(KnowledgeError),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GameReport {
    pub config: GameConfig,
    pub outcome: PlayOutcome,
    pub safe_moves: usize,
    pub random_moves: usize,
    /// Most sweeps a single observation needed to settle.
    pub max_sweeps: usize,
    pub knowledge: KnowledgeSnapshot,
}

impl GameReport {
    pub fn won(&self) -> bool {
        matches!(self.outcome, PlayOutcome::Won)
    }
}

/// Lets `engine` play `game` to the end: safe moves first, random moves when nothing is known, flagging every mine
/// the engine finds.
pub fn play<R: Rng + ?Sized>(
    game: &mut Game,
    engine: &mut KnowledgeEngine,
    rng: &mut R,
) -> Result<GameReport> {
    if game.size() != engine.size() {
        return Err(GameError::InvalidBoardShape);
    }

    let mut safe_moves = 0;
    let mut random_moves = 0;
    let mut max_sweeps = 0;

    let outcome = loop {
        if game.won() {
            break PlayOutcome::Won;
        }

        let (cell, kind) = if let Some(cell) = engine.safe_move() {
            (cell, MoveKind::Safe)
        } else if let Some(cell) = engine.random_move(rng) {
            (cell, MoveKind::Random)
        } else {
            log::debug!("No moves left");
            break PlayOutcome::Stuck;
        };
        match kind {
            MoveKind::Safe => safe_moves += 1,
            MoveKind::Random => random_moves += 1,
        }
        log::debug!("{:?} move at {:?}", kind, cell);

        let count = match game.reveal(cell)? {
            RevealOutcome::Revealed(count) => count,
            RevealOutcome::Won => break PlayOutcome::Won,
            RevealOutcome::HitMine => break PlayOutcome::Lost { mine: cell, kind },
            RevealOutcome::NoChange => {
                log::warn!("Move at {:?} did not reveal anything", cell);
                break PlayOutcome::Stuck;
            }
        };

        match engine.add_knowledge(cell, count) {
            Ok(deduction) => max_sweeps = max_sweeps.max(deduction.sweeps),
            Err(err) => break PlayOutcome::Unsound(err),
        }

        for &mine in engine.mines() {
            if !game.flags().contains(&mine) && !game.is_finished() {
                game.toggle_flag(mine)?;
            }
        }
    };

    log::debug!(
        "Game over: {:?} after {} safe and {} random moves",
        outcome,
        safe_moves,
        random_moves
    );

    Ok(GameReport {
        config: game.minefield().game_config(),
        outcome,
        safe_moves,
        random_moves,
        max_sweeps,
        knowledge: engine.snapshot(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::SmallRng;

    fn play_seeded(config: GameConfig, seed: u64) -> (Game, KnowledgeEngine, GameReport) {
        let mut game = Game::new(Minefield::random(config, seed, Some((0, 0))));
        let mut engine = KnowledgeEngine::new(config.size);
        // the minefield keeps the start cell free
        engine.mark_safe((0, 0)).unwrap();
        let mut rng = SmallRng::seed_from_u64(seed);
        let report = play(&mut game, &mut engine, &mut rng).unwrap();
        (game, engine, report)
    }

    #[test]
    fn solves_strip_without_guessing() {
        let mut game = Game::new(Minefield::from_mine_coords((1, 4), &[(0, 3)]).unwrap());
        let mut engine = KnowledgeEngine::new((1, 4));
        engine.mark_safe((0, 0)).unwrap();
        let mut rng = SmallRng::seed_from_u64(0);

        let report = play(&mut game, &mut engine, &mut rng).unwrap();

        assert_eq!(report.outcome, PlayOutcome::Won);
        assert_eq!(report.random_moves, 0);
        assert_eq!(report.safe_moves, 3);
    }

    #[test]
    fn conclusions_match_the_board() {
        for difficulty in [Difficulty::Beginner, Difficulty::Intermediate] {
            for seed in 0..24 {
                let (game, engine, report) = play_seeded(difficulty.config(), seed);
                let mines = game.minefield().mine_cells();

                assert!(engine.is_sound(), "seed {seed}: {:?}", report.outcome);
                assert!(engine.mines().is_subset(&mines), "seed {seed}");
                assert!(engine.safes().is_disjoint(&mines), "seed {seed}");
                for sentence in engine.knowledge() {
                    let actual = sentence.cells().intersection(&mines).count();
                    assert_eq!(actual, usize::from(sentence.count()), "seed {seed}");
                }
            }
        }
    }

    #[test]
    fn only_random_moves_can_lose() {
        for seed in 0..48 {
            let (_, _, report) = play_seeded(Difficulty::Beginner.config(), seed);

            if let PlayOutcome::Lost { kind, .. } = report.outcome {
                assert_eq!(kind, MoveKind::Random, "seed {seed}");
            }
            assert!(!matches!(report.outcome, PlayOutcome::Unsound(_)));
        }
    }

    #[test]
    fn sweeps_stay_linear_in_board_size() {
        let config = Difficulty::Expert.config();
        let bound = 2 * usize::from(config.total_cells()) + 2;

        for seed in 0..4 {
            let (_, _, report) = play_seeded(config, seed);
            assert!(report.max_sweeps <= bound);
            assert!(report.max_sweeps >= 1);
        }
    }

    #[test]
    fn knowledge_only_grows_between_moves() {
        let config = Difficulty::Beginner.config();
        let mut game = Game::new(Minefield::random(config, 5, Some((0, 0))));
        let mut engine = KnowledgeEngine::new(config.size);
        let mut rng = SmallRng::seed_from_u64(5);

        while !game.is_finished() {
            let Some(cell) = engine.safe_move().or_else(|| engine.random_move(&mut rng)) else {
                break;
            };
            let RevealOutcome::Revealed(count) = game.reveal(cell).unwrap() else {
                break;
            };
            let before = engine.snapshot();

            engine.add_knowledge(cell, count).unwrap();

            assert!(before.mines.is_subset(engine.mines()));
            assert!(before.safes.is_subset(engine.safes()));
            assert!(before.moves_made.is_subset(engine.moves_made()));
            assert!(engine.mines().is_disjoint(engine.safes()));
        }
    }

    #[test]
    fn zero_mine_board_is_won_by_safe_moves() {
        let (_, _, report) = play_seeded(GameConfig::new((4, 4), 0), 1);

        assert!(report.won());
        assert_eq!(report.random_moves, 0);
        assert_eq!(report.safe_moves, 16);
    }

    #[test]
    fn mismatched_engine_is_rejected() {
        let mut game = Game::new(Minefield::from_mine_coords((2, 2), &[]).unwrap());
        let mut engine = KnowledgeEngine::new((3, 3));
        let mut rng = SmallRng::seed_from_u64(0);

        assert_eq!(
            play(&mut game, &mut engine, &mut rng),
            Err(GameError::InvalidBoardShape)
        );
    }
}
