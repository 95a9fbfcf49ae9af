//! Expectimax search policy (single-threaded and parallel) for 2048.
//!
//! This module provides two engines with the same surface:
//! - [`Expectimax`]: single-threaded expectimax.
//! - [`ExpectimaxParallel`]: rayon fan-out with an explicit join at every
//!   aggregation step.
//!
//! A search alternates max plies (the player's choice among legal directions)
//! with chance plies (a 2 with probability 0.9 or a 4 with probability 0.1
//! spawning in a uniformly chosen empty cell). One unit of depth is one move
//! ply followed by one chance ply. At depth 0 each legal direction is scored by
//! the caller's [`Evaluator`] on the post-move outcome.
//!
//! Cost is exponential in depth: each move ply branches 4 ways and each chance
//! ply fans out to `2 × empty cells` children. Depth 3 on a near-empty board
//! visits millions of nodes.
//!
//! Notes
//! - Search is deterministic for a fixed board, depth and evaluator. Randomness
//!   only happens when a game applies a move with `Board::make_move`.
//! - The parallel engine returns bit-identical values to the sequential one:
//!   children are collected in order and reduced sequentially.
//!
//! Quick start
//! ```
//! use twenty48_search::engine::Board;
//! use twenty48_search::expectimax::{Expectimax, ExpectimaxParallel, heuristic::Basic};
//! use rand::{rngs::StdRng, SeedableRng};
//!
//! let mut rng = StdRng::seed_from_u64(123);
//! let b0 = Board::EMPTY
//!     .with_random_tile(&mut rng)
//!     .with_random_tile(&mut rng);
//!
//! let mut ex = Expectimax::new();
//! let m = ex.choose_best_move(b0, 1, &Basic).unwrap();
//!
//! let mut ex_par = ExpectimaxParallel::new();
//! let mv = ex_par.choose_best_move(b0, 1, &Basic).unwrap();
//! assert_eq!(m, mv);
//! ```

use serde::{Deserialize, Serialize};

use crate::engine::{self, Board, Move, MoveOutcome};
use crate::error::SearchError;

pub mod heuristic;
mod search_par;
mod search_seq;

pub use search_par::ExpectimaxParallel;
pub use search_seq::Expectimax;

/// Value given to a direction that does not change the board.
///
/// Evaluators are expected to return values `>= 0`, which keeps this strictly
/// below any legal direction. That is a contract on the heuristic, not
/// something the engine can enforce; legality is tracked separately so an
/// illegal direction is never returned at the root.
pub const ILLEGAL_MOVE_VALUE: f64 = -1.0;

pub(crate) const SPAWN_TWO_PROB: f64 = 0.9;
pub(crate) const SPAWN_FOUR_PROB: f64 = 0.1;

/// Scores a post-move state; higher is better.
///
/// Implementations must be pure, total and return finite values. NaN or
/// infinite results are a caller error and make the choice of move unspecified.
pub trait Evaluator: Send + Sync {
    fn evaluate(&self, outcome: &MoveOutcome) -> f64;
}

impl<F> Evaluator for F
where
    F: Fn(&MoveOutcome) -> f64 + Send + Sync,
{
    #[inline]
    fn evaluate(&self, outcome: &MoveOutcome) -> f64 { self(outcome) }
}

/// Configurable knobs for Expectimax.
///
/// - `max_depth`: look-ahead used by `best_move`, in whole moves.
/// - `cache_enabled`: transposition table keyed by (board, remaining depth).
///   Entries are exact, so this only trades memory for time.
/// - `par_thresholds`: thresholds used only by the parallel implementation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExpectimaxConfig {
    pub max_depth: u32,
    pub cache_enabled: bool,
    pub par_thresholds: ParThresholds,
}

impl Default for ExpectimaxConfig {
    fn default() -> Self {
        Self { max_depth: 2, cache_enabled: true, par_thresholds: ParThresholds::default() }
    }
}

/// Thresholds used to balance parallel overheads.
///
/// A node forks only when its remaining depth is at least `par_depth`; chance
/// nodes additionally need `par_slots` empty cells.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParThresholds {
    pub par_depth: u32,
    pub par_slots: usize,
}

impl Default for ParThresholds {
    fn default() -> Self { Self { par_depth: 1, par_slots: 4 } }
}

/// Per-branch expected value at the root.
///
/// - `ev` is the expected value for taking `dir` from the current board.
/// - `legal` is false when the move is a no-op; `ev` is then [`ILLEGAL_MOVE_VALUE`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BranchEval {
    pub dir: Move,
    pub ev: f64,
    pub legal: bool,
}

impl BranchEval {
    fn illegal(dir: Move) -> Self { BranchEval { dir, ev: ILLEGAL_MOVE_VALUE, legal: false } }
}

/// Basic search stats for a single evaluation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SearchStats {
    pub nodes: u64,
    pub peak_nodes: u64,
}

impl SearchStats {
    fn record(&mut self, nodes: u64) {
        self.nodes = nodes;
        self.peak_nodes = self.peak_nodes.max(nodes);
    }
}

/// Pick the best legal branch, ties going to the earliest of `Up, Down, Left, Right`.
pub fn pick_best(branches: &[BranchEval; 4]) -> Result<Move, SearchError> {
    branches
        .iter()
        .filter(|branch| branch.legal)
        .fold(None::<&BranchEval>, |best, branch| match best {
            Some(b) if b.ev >= branch.ev => Some(b),
            _ => Some(branch),
        })
        .map(|branch| branch.dir)
        .ok_or(SearchError::NoLegalMove)
}

/// One-shot sequential search: the direction with the highest expected value.
///
/// ```
/// use twenty48_search::engine::Board;
/// use twenty48_search::expectimax::{choose_best_move, heuristic::Naive};
/// use twenty48_search::error::SearchError;
/// assert_eq!(choose_best_move(Board::EMPTY, 1, &Naive), Err(SearchError::NoLegalMove));
/// ```
pub fn choose_best_move<E: Evaluator + ?Sized>(board: Board, max_depth: u32, evaluator: &E) -> Result<Move, SearchError> {
    Expectimax::new().choose_best_move(board, max_depth, evaluator)
}

/// Row-major indices of the empty cells.
pub(crate) fn empty_slots(board: Board) -> Vec<usize> {
    (0..16).filter(|&idx| engine::extract_tile(board, idx) == 0).collect()
}

/// The two spawn children of `slot`: a 2 tile and a 4 tile.
#[inline]
pub(crate) fn spawn_children(board: Board, slot: usize) -> (Board, Board) {
    (board.with_exponent(slot, 1), board.with_exponent(slot, 2))
}

#[inline]
pub(crate) fn weigh_spawns(value_two: f64, value_four: f64) -> f64 {
    SPAWN_TWO_PROB * value_two + SPAWN_FOUR_PROB * value_four
}

/// Uniform average of per-cell values, summed in cell order. 0 for a full board.
pub(crate) fn average_over_cells<I: IntoIterator<Item = f64>>(values: I) -> f64 {
    let (sum, count) = values.into_iter().fold((0.0, 0u32), |(sum, count), v| (sum + v, count + 1));
    if count == 0 { 0.0 } else { sum / f64::from(count) }
}

/// Max over legal child values, [`ILLEGAL_MOVE_VALUE`] when there are none.
pub(crate) fn max_over_moves<I: IntoIterator<Item = Option<f64>>>(values: I) -> f64 {
    values
        .into_iter()
        .flatten()
        .fold(None, |best: Option<f64>, v| Some(best.map_or(v, |b| b.max(v))))
        .unwrap_or(ILLEGAL_MOVE_VALUE)
}
