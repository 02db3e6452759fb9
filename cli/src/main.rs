use std::io::{self, Write};

use anyhow::Context;
use clap::{Parser, ValueEnum};
use minelogic_core::*;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum DifficultyArg {
    Beginner,
    Intermediate,
    Expert,
}

impl From<DifficultyArg> for Difficulty {
    fn from(arg: DifficultyArg) -> Self {
        match arg {
            DifficultyArg::Beginner => Difficulty::Beginner,
            DifficultyArg::Intermediate => Difficulty::Intermediate,
            DifficultyArg::Expert => Difficulty::Expert,
        }
    }
}

/// Let the knowledge engine play Minesweeper on random boards.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// What log level to use
    #[command(flatten)]
    verbose: clap_verbosity_flag::Verbosity,

    /// Board preset, individual dimensions override it
    #[arg(short, long, value_enum, default_value_t = DifficultyArg::Beginner)]
    difficulty: DifficultyArg,

    #[arg(long)]
    height: Option<Coord>,

    #[arg(long)]
    width: Option<Coord>,

    #[arg(short, long)]
    mines: Option<CellCount>,

    /// Force a seed instead of random
    #[arg(short, long)]
    seed: Option<u64>,

    /// How many games to play
    #[arg(short = 'n', long, default_value_t = 1)]
    games: u32,

    /// Print where the mines were after each game
    #[arg(long)]
    show_board: bool,

    /// Print one JSON report per game instead of a summary line
    #[arg(long)]
    json: bool,
}

impl Args {
    fn game_config(&self) -> GameConfig {
        let preset = Difficulty::from(self.difficulty).config();
        GameConfig::new(
            (
                self.height.unwrap_or(preset.size.0),
                self.width.unwrap_or(preset.size.1),
            ),
            self.mines.unwrap_or(preset.mines),
        )
    }
}

#[derive(Serialize)]
struct GameRecord<'a> {
    game: u32,
    seed: u64,
    report: &'a GameReport,
}

#[derive(Debug, Default, PartialEq, Serialize)]
struct Summary {
    games: u32,
    won: u32,
    lost: u32,
    stuck: u32,
    unsound: u32,
}

impl Summary {
    fn record(&mut self, outcome: &PlayOutcome) {
        self.games += 1;
        match outcome {
            PlayOutcome::Won => self.won += 1,
            PlayOutcome::Lost { .. } => self.lost += 1,
            PlayOutcome::Stuck => self.stuck += 1,
            PlayOutcome::Unsound(_) => self.unsound += 1,
        }
    }
}

fn play_one(config: GameConfig, seed: u64) -> anyhow::Result<(Game, GameReport)> {
    let mut game = Game::new(Minefield::random(config, seed, None));
    let mut engine = KnowledgeEngine::new(config.size);
    let mut rng = SmallRng::seed_from_u64(seed);
    let report = play(&mut game, &mut engine, &mut rng)
        .with_context(|| format!("playing game with seed {seed}"))?;
    Ok((game, report))
}

fn describe(outcome: &PlayOutcome) -> String {
    match outcome {
        PlayOutcome::Won => "won".to_string(),
        PlayOutcome::Lost { mine, kind } => format!("lost on {mine:?} ({kind:?} move)"),
        PlayOutcome::Stuck => "stuck".to_string(),
        PlayOutcome::Unsound(err) => format!("gave up: {err}"),
    }
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    env_logger::Builder::new()
        .filter_level(args.verbose.log_level_filter())
        .init();

    let config = args.game_config();
    let seed = args.seed.unwrap_or_else(rand::random);
    log::debug!("config: {:?}, seed: {}", config, seed);

    let mut seeds = SmallRng::seed_from_u64(seed);
    let mut summary = Summary::default();
    let mut out = io::stdout().lock();

    for game_number in 1..=args.games {
        let game_seed = if game_number == 1 { seed } else { seeds.random() };
        let (game, report) = play_one(config, game_seed)?;
        summary.record(&report.outcome);

        if args.json {
            let record = GameRecord {
                game: game_number,
                seed: game_seed,
                report: &report,
            };
            serde_json::to_writer(&mut out, &record)?;
            writeln!(out)?;
        } else {
            writeln!(
                out,
                "game {} (seed {}): {}, {} safe and {} random moves, {}/{} mines found",
                game_number,
                game_seed,
                describe(&report.outcome),
                report.safe_moves,
                report.random_moves,
                report.knowledge.mines.len(),
                config.mines
            )?;
        }
        if args.show_board {
            write!(out, "{}", game.minefield())?;
        }
    }

    if args.json {
        serde_json::to_writer(&mut out, &summary)?;
        writeln!(out)?;
    } else if args.games > 1 {
        writeln!(
            out,
            "won {}/{} games ({} lost, {} stuck, {} unsound)",
            summary.won, summary.games, summary.lost, summary.stuck, summary.unsound
        )?;
    }

    Ok(())
}
