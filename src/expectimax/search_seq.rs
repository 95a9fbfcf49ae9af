use std::collections::HashMap;

use log::debug;

use crate::engine::{Board, Move, MoveOutcome};
use crate::error::SearchError;

use super::{
    average_over_cells, empty_slots, max_over_moves, pick_best, spawn_children, weigh_spawns, BranchEval,
    Evaluator, ExpectimaxConfig, SearchStats,
};

type TranspositionTable = HashMap<(Board, u32), f64>;

/// Single-threaded Expectimax search.
pub struct Expectimax {
    cfg: ExpectimaxConfig,
    stats: SearchStats,
}

struct Search<'a, E: ?Sized> {
    evaluator: &'a E,
    cache: Option<TranspositionTable>,
    nodes: u64,
}

impl Expectimax {
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
    /// Fails with [`SearchError::NoLegalMove`] when no direction changes `board`.
    ///
    /// ```
    /// use twenty48_search::engine::{Board, Move};
    /// use twenty48_search::expectimax::{Expectimax, heuristic::Naive};
    /// let b = Board::from_values(&[
    ///     2, 2, 0, 0,
    ///     0, 0, 0, 0,
    ///     0, 0, 0, 0,
    ///     0, 0, 0, 0,
    /// ]).unwrap();
    /// let mut ex = Expectimax::new();
    /// let dir = ex.choose_best_move(b, 0, &Naive).unwrap();
    /// assert!(b.can_move(dir));
    /// ```
    pub fn choose_best_move<E: Evaluator + ?Sized>(
        &mut self,
        board: Board,
        max_depth: u32,
        evaluator: &E,
    ) -> Result<Move, SearchError> {
        let branches = self.branch_evals(board, max_depth, evaluator);
        let best = pick_best(&branches);
        debug!("expectimax depth={} nodes={} best={:?}", max_depth, self.stats.nodes, best);
        best
    }

    /// Compute EV for each direction.
    ///
    /// Returns a fixed array in order: `[Up, Down, Left, Right]` and marks
    /// illegal moves as `legal=false`.
    pub fn branch_evals<E: Evaluator + ?Sized>(&mut self, board: Board, max_depth: u32, evaluator: &E) -> [BranchEval; 4] {
        let mut search = Search {
            evaluator,
            cache: self.cfg.cache_enabled.then(TranspositionTable::new),
            nodes: 0,
        };
        let out = Move::ALL.map(|dir| {
            let outcome = board.apply_move(dir);
            if outcome.changed {
                BranchEval { dir, ev: search.move_value(outcome, max_depth), legal: true }
            } else {
                BranchEval::illegal(dir)
            }
        });
        self.stats.record(search.nodes);
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
    /// Value of a legal post-move outcome with `depth` moves still to look ahead.
    fn move_value(&mut self, outcome: MoveOutcome, depth: u32) -> f64 {
        self.nodes += 1;
        if depth == 0 {
            self.evaluator.evaluate(&outcome)
        } else {
            self.chance_value(outcome.board, depth)
        }
    }

    fn chance_value(&mut self, board: Board, depth: u32) -> f64 {
        if let Some(&score) = self.cache.as_ref().and_then(|map| map.get(&(board, depth))) {
            return score;
        }
        let slots = empty_slots(board);
        let mut values = Vec::with_capacity(slots.len());
        for slot in slots {
            let (two, four) = spawn_children(board, slot);
            let value_two = self.best_value(two, depth - 1);
            let value_four = self.best_value(four, depth - 1);
            values.push(weigh_spawns(value_two, value_four));
        }
        let score = average_over_cells(values);
        if let Some(map) = self.cache.as_mut() {
            map.insert((board, depth), score);
        }
        score
    }

    fn best_value(&mut self, board: Board, depth: u32) -> f64 {
        self.nodes += 1;
        let mut values = [None; 4];
        for (slot, dir) in values.iter_mut().zip(Move::ALL) {
            let outcome = board.apply_move(dir);
            if outcome.changed {
                *slot = Some(self.move_value(outcome, depth));
            }
        }
        max_over_moves(values)
    }
}

impl Default for Expectimax { fn default() -> Self { Self::new() } }
