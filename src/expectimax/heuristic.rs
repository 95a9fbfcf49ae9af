//! Evaluation strategies for post-move states.
//!
//! All of them reward empty cells as a mobility proxy. The richer ones add
//! the points scored by the move and bonuses for keeping large tiles on the
//! edges or in a corner.

use serde::{Deserialize, Serialize};

use crate::engine::MoveOutcome;

use super::Evaluator;

/// Weight of one empty cell (and of one positional bonus).
pub const EMPTY_WEIGHT: f64 = 511.0;

/// Bonus units awarded when the largest tile sits in a corner.
pub const CORNER_BONUS: u32 = 8;

/// Number of empty cells after the move.
#[derive(Debug, Clone, Copy, Default)]
pub struct Naive;

/// Points scored plus weighted empty cells.
#[derive(Debug, Clone, Copy, Default)]
pub struct Basic;

/// [`Basic`] plus a bonus for every row and column whose largest tile is on
/// the board's edge.
#[derive(Debug, Clone, Copy, Default)]
pub struct Edge;

/// [`Edge`] plus a large bonus when the board's largest tile is in a corner.
#[derive(Debug, Clone, Copy, Default)]
pub struct Corner;

impl Evaluator for Naive {
    fn evaluate(&self, outcome: &MoveOutcome) -> f64 { f64::from(outcome.board.count_empty()) }
}

impl Evaluator for Basic {
    fn evaluate(&self, outcome: &MoveOutcome) -> f64 {
        outcome.points as f64 + f64::from(outcome.board.count_empty()) * EMPTY_WEIGHT
    }
}

impl Evaluator for Edge {
    fn evaluate(&self, outcome: &MoveOutcome) -> f64 {
        let cells = outcome.board.values();
        Basic.evaluate(outcome) + f64::from(largest_on_edge(&cells)) * EMPTY_WEIGHT
    }
}

impl Evaluator for Corner {
    fn evaluate(&self, outcome: &MoveOutcome) -> f64 {
        let cells = outcome.board.values();
        let mut bonus = largest_on_edge(&cells);
        if largest_in_corner(&cells) {
            bonus += CORNER_BONUS;
        }
        Basic.evaluate(outcome) + f64::from(bonus) * EMPTY_WEIGHT
    }
}

/// Columns whose maximum is in the top or bottom row, plus rows whose maximum
/// is in the left or right column. Empty lines do not count.
fn largest_on_edge(cells: &[u64; 16]) -> u32 {
    let at = |x: usize, y: usize| cells[y * 4 + x];
    let columns = (0..4)
        .filter(|&x| {
            let max = (0..4).map(|y| at(x, y)).max().unwrap_or(0);
            max != 0 && (at(x, 0) == max || at(x, 3) == max)
        })
        .count();
    let rows = (0..4)
        .filter(|&y| {
            let max = (0..4).map(|x| at(x, y)).max().unwrap_or(0);
            max != 0 && (at(0, y) == max || at(3, y) == max)
        })
        .count();
    (columns + rows) as u32
}

fn largest_in_corner(cells: &[u64; 16]) -> bool {
    let max = cells.iter().copied().max().unwrap_or(0);
    max != 0 && [0, 3, 12, 15].iter().any(|&idx| cells[idx] == max)
}

/// Search depth of the stock players unless configured otherwise.
pub const DEFAULT_DEPTH: u32 = 2;

/// Heuristic selector used by configuration and the CLI.
///
/// `Naive0` and `Naive1` are the [`Naive`] evaluator with a shallower search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum HeuristicKind {
    Naive0,
    Naive1,
    Naive,
    Basic,
    Edge,
    #[default]
    Corner,
}

impl HeuristicKind {
    pub fn evaluator(self) -> Box<dyn Evaluator> {
        match self {
            HeuristicKind::Naive0 | HeuristicKind::Naive1 | HeuristicKind::Naive => Box::new(Naive),
            HeuristicKind::Basic => Box::new(Basic),
            HeuristicKind::Edge => Box::new(Edge),
            HeuristicKind::Corner => Box::new(Corner),
        }
    }

    /// Look-ahead each player was tuned for.
    pub fn default_depth(self) -> u32 {
        match self {
            HeuristicKind::Naive0 => 0,
            HeuristicKind::Naive1 => 1,
            HeuristicKind::Naive | HeuristicKind::Basic | HeuristicKind::Edge | HeuristicKind::Corner => {
                DEFAULT_DEPTH
            }
        }
    }
}
