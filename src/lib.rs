//! twenty48-search: a 2048 grid engine + expectimax move search
//!
//! This crate provides:
//! - A compact, immutable `Board` with the slide/merge transform (`apply_move`),
//!   cell access and tile spawning (`engine` module)
//! - An expectimax search with single-threaded and parallel variants and
//!   pluggable evaluation heuristics (`expectimax` module)
//! - A turn loop that drives a game through any move policy (`game` module)
//!
//! Quick start:
//! ```
//! use twenty48_search::engine::{Board, Move};
//! use twenty48_search::expectimax::{choose_best_move, heuristic::Corner};
//! use rand::{rngs::StdRng, SeedableRng};
//!
//! // Deterministic board initialization with a seeded RNG
//! let mut rng = StdRng::seed_from_u64(42);
//! let b0 = Board::EMPTY.with_random_tile(&mut rng).with_random_tile(&mut rng);
//! let dir = choose_best_move(b0, 1, &Corner).unwrap();
//! let outcome = b0.apply_move(dir);
//! assert!(outcome.changed);
//! ```
//!
pub mod config;
pub mod engine;
pub mod error;
pub mod expectimax;
pub mod game;
