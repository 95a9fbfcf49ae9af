//! Error kinds surfaced by the engine, the search and the turn loop.
//!
//! [`EngineError`] covers programmer errors: they fail fast and never leave a
//! partially built board behind. [`SearchError::NoLegalMove`] is the normal
//! end-of-game signal and lives in its own type so it cannot be mistaken for
//! one of those.

use std::io;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("invalid direction: {0}")]
    InvalidDirection(String),
    #[error("coordinate ({x}, {y}) is outside the 4x4 grid")]
    OutOfBounds { x: usize, y: usize },
    #[error("a board needs exactly 16 values, got {0}")]
    InvalidBoardSize(usize),
    #[error("tile value {0} is not 0 or a power of two")]
    InvalidTileValue(u64),
}

#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchError {
    #[error("no legal move from this position")]
    NoLegalMove,
}

#[derive(thiserror::Error, Debug)]
pub enum PolicyError {
    #[error(transparent)]
    Search(#[from] SearchError),
    #[error("move source disconnected")]
    Disconnected,
    #[error("move rejected: {0}")]
    Rejected(String),
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("io: {0}")]
    Io(#[from] io::Error),
    #[error("parse: {0}")]
    Parse(#[from] toml::de::Error),
}
