use std::path::PathBuf;
use std::time::{Duration, Instant};

use clap::Parser;
use env_logger::Env;
use indicatif::{ProgressBar, ProgressStyle};
use log::info;
use rand::{rngs::StdRng, SeedableRng};

use twenty48_search::config::RunConfig;
use twenty48_search::engine::{self, Board};
use twenty48_search::expectimax::heuristic::HeuristicKind;
use twenty48_search::expectimax::{Expectimax, ExpectimaxParallel};
use twenty48_search::game::{Game, GameEvent, SearchEngine, SearchPolicy};

/// Play a game of 2048 with an expectimax player.
#[derive(Parser, Debug)]
#[command(name = "twenty48", version, about)]
struct Args {
    /// Optional TOML run configuration; flags below override it
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,
    /// Evaluation heuristic
    #[arg(long, value_enum)]
    heuristic: Option<HeuristicKind>,
    /// Look-ahead depth in whole moves (cost grows exponentially)
    #[arg(long)]
    depth: Option<u32>,
    /// RNG seed for tile spawns
    #[arg(long)]
    seed: Option<u64>,
    /// Stop after this many moves
    #[arg(long)]
    max_moves: Option<u64>,
    /// Use the single-threaded search
    #[arg(long, default_value_t = false)]
    sequential: bool,
    /// Show a status line instead of printing every board
    #[arg(long, default_value_t = false)]
    quiet: bool,
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut cfg = match &args.config {
        Some(path) => RunConfig::from_toml(path)?,
        None => RunConfig::default(),
    };
    if let Some(h) = args.heuristic { cfg.heuristic = h; }
    if let Some(d) = args.depth { cfg.depth = Some(d); }
    if let Some(s) = args.seed { cfg.seed = Some(s); }
    if let Some(m) = args.max_moves { cfg.max_moves = Some(m); }
    if args.sequential { cfg.parallel = false; }

    engine::init_tables();
    let rng = match cfg.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let search = if cfg.parallel {
        SearchEngine::Parallel(ExpectimaxParallel::with_config(cfg.expectimax()))
    } else {
        SearchEngine::Sequential(Expectimax::with_config(cfg.expectimax()))
    };
    let policy = SearchPolicy::new(search, cfg.heuristic.evaluator(), cfg.depth());
    info!("playing with {:?} heuristic at depth {}", cfg.heuristic, policy.depth());

    let mut game = Game::new(policy, rng)
        .illegal_moves(cfg.illegal_moves)
        .max_moves(cfg.max_moves);

    let pb = args.quiet.then(|| {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::with_template("{spinner} {elapsed_precise} | Moves: {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_chars("⠁⠃⠇⠧⠷⠿⠻⠟⠯⠷⠧⠇⠃"),
        );
        pb.enable_steady_tick(Duration::from_millis(120));
        pb
    });

    let start = Instant::now();
    let mut moves = 0u64;
    let summary = game.run(|event| match event {
        GameEvent::Moved { board, points } => {
            moves += 1;
            match &pb {
                Some(pb) => {
                    let rate = moves as f64 / start.elapsed().as_secs_f64().max(1e-6);
                    pb.set_message(format!("{} | moves/sec: {:.1} | points: {}", moves, rate, points));
                }
                None => print_board(board, points),
            }
        }
        GameEvent::Ended { board, points, reason } => {
            if let Some(pb) = &pb { pb.finish_and_clear(); }
            println!("\nGame over ({:?})", reason);
            print_board(board, points);
        }
    });

    println!(
        "Moves: {} | points: {} | highest tile: {} | elapsed: {:.1}s",
        summary.moves,
        summary.points,
        summary.highest_tile,
        start.elapsed().as_secs_f64()
    );
    Ok(())
}

fn print_board(board: Board, points: u64) {
    println!("\nPoints: {}", points);
    print!("{}", board);
}
