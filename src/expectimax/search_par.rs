use std::sync::atomic::{AtomicU64, Ordering};

use ahash::RandomState as AHasher;
use dashmap::DashMap;
use log::debug;
use rayon::prelude::*;

use crate::engine::{Board, Move, MoveOutcome};
use crate::error::SearchError;

use super::{
    average_over_cells, empty_slots, max_over_moves, pick_best, spawn_children, weigh_spawns, BranchEval,
    Evaluator, ExpectimaxConfig, ParThresholds, SearchStats,
};

type TranspositionTable = DashMap<(Board, u32), f64, AHasher>;

/// Parallel Expectimax using rayon and a shared `DashMap` transposition table.
///
/// Sibling branches only read their own `Board` copies, so they fork without
/// locks. Every max and chance node joins on all of its children and reduces
/// them in a fixed order, which keeps results identical to [`super::Expectimax`].
pub struct ExpectimaxParallel {
    cfg: ExpectimaxConfig,
    stats: SearchStats,
}

struct Search<'a, E: ?Sized> {
    evaluator: &'a E,
    cache: Option<TranspositionTable>,
    thresholds: ParThresholds,
    nodes: AtomicU64,
}

impl ExpectimaxParallel {
    pub fn new() -> Self { Self::with_config(ExpectimaxConfig::default()) }

    pub fn with_config(cfg: ExpectimaxConfig) -> Self {
        crate::engine::init_tables();
        Self { cfg, stats: SearchStats::default() }
    }

    pub fn config(&self) -> &ExpectimaxConfig { &self.cfg }

    /// Compute the best move using the configured depth.
    #[inline]
    pub fn best_move<E: Evaluator + ?Sized>(&mut self, board: Board, evaluator: &E) -> Result<Move, SearchError> {
        let depth = self.cfg.max_depth;
        self.choose_best_move(board, depth, evaluator)
    }

    /// Compute the direction with the highest expected value `max_depth` moves ahead.
    ///
    /// This is a convenience wrapper around `branch_evals` that just picks the best move.
    pub fn choose_best_move<E: Evaluator + ?Sized>(
        &mut self,
        board: Board,
        max_depth: u32,
        evaluator: &E,
    ) -> Result<Move, SearchError> {
        let (best, _) = self.best_move_with_branches(board, max_depth, evaluator);
        best
    }

    /// Get both the best move and all branch evaluations from one search.
    pub fn best_move_with_branches<E: Evaluator + ?Sized>(
        &mut self,
        board: Board,
        max_depth: u32,
        evaluator: &E,
    ) -> (Result<Move, SearchError>, [BranchEval; 4]) {
        let branches = self.branch_evals(board, max_depth, evaluator);
        let best = pick_best(&branches);
        debug!("expectimax_par depth={} nodes={} best={:?}", max_depth, self.stats.nodes, best);
        (best, branches)
    }

    /// Compute EV for each direction in parallel.
    ///
    /// Returns a fixed array in order: `[Up, Down, Left, Right]` and marks
    /// illegal moves as `legal=false`.
    pub fn branch_evals<E: Evaluator + ?Sized>(&mut self, board: Board, max_depth: u32, evaluator: &E) -> [BranchEval; 4] {
        let search = Search {
            evaluator,
            cache: self.cfg.cache_enabled.then(|| TranspositionTable::with_hasher(AHasher::new())),
            thresholds: self.cfg.par_thresholds,
            nodes: AtomicU64::new(0),
        };
        let evs: Vec<Option<f64>> = Move::ALL
            .par_iter()
            .map(|&dir| {
                let outcome = board.apply_move(dir);
                outcome.changed.then(|| search.move_value(outcome, max_depth))
            })
            .collect();
        let mut out = Move::ALL.map(BranchEval::illegal);
        for (slot, ev) in out.iter_mut().zip(evs) {
            if let Some(ev) = ev {
                *slot = BranchEval { dir: slot.dir, ev, legal: true };
            }
        }
        self.stats.record(search.nodes.load(Ordering::Relaxed));
        out
    }

    /// Expected value of the best move from `board`, the max over legal branches.
    pub fn state_value<E: Evaluator + ?Sized>(
        &mut self,
        board: Board,
        max_depth: u32,
        evaluator: &E,
    ) -> Result<f64, SearchError> {
        let branches = self.branch_evals(board, max_depth, evaluator);
        let best = pick_best(&branches)?;
        Ok(branches[best.index()].ev)
    }

    /// Statistics collected from the last search.
    #[inline]
    pub fn last_stats(&self) -> SearchStats { self.stats }

    /// Reset accumulated stats to zero.
    #[inline]
    pub fn reset_stats(&mut self) { self.stats = SearchStats::default(); }
}

impl<E: Evaluator + ?Sized> Search<'_, E> {
    fn move_value(&self, outcome: MoveOutcome, depth: u32) -> f64 {
        self.nodes.fetch_add(1, Ordering::Relaxed);
        if depth == 0 {
            self.evaluator.evaluate(&outcome)
        } else {
            self.chance_value(outcome.board, depth)
        }
    }

    fn chance_value(&self, board: Board, depth: u32) -> f64 {
        if let Some(cache) = &self.cache {
            if let Some(entry) = cache.get(&(board, depth)) {
                return *entry;
            }
        }
        let slots = empty_slots(board);
        let spawn_value = |&slot: &usize| {
            let (two, four) = spawn_children(board, slot);
            weigh_spawns(self.best_value(two, depth - 1), self.best_value(four, depth - 1))
        };
        let ParThresholds { par_depth, par_slots } = self.thresholds;
        let score = if depth >= par_depth && slots.len() >= par_slots {
            let values: Vec<f64> = slots.par_iter().map(spawn_value).collect();
            average_over_cells(values)
        } else {
            average_over_cells(slots.iter().map(spawn_value))
        };
        if let Some(cache) = &self.cache {
            cache.insert((board, depth), score);
        }
        score
    }

    fn best_value(&self, board: Board, depth: u32) -> f64 {
        self.nodes.fetch_add(1, Ordering::Relaxed);
        let child = |&dir: &Move| {
            let outcome = board.apply_move(dir);
            outcome.changed.then(|| self.move_value(outcome, depth))
        };
        if depth >= self.thresholds.par_depth {
            let values: Vec<Option<f64>> = Move::ALL.par_iter().map(child).collect();
            max_over_moves(values)
        } else {
            max_over_moves(Move::ALL.iter().map(child))
        }
    }
}

impl Default for ExpectimaxParallel { fn default() -> Self { Self::new() } }
