use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::expectimax::heuristic::HeuristicKind;
use crate::expectimax::{ExpectimaxConfig, ParThresholds};
use crate::game::IllegalMovePolicy;

/// Settings for one self-play run. Every field has a default, so an empty
/// file is a valid configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub heuristic: HeuristicKind,
    /// Look-ahead in whole moves; `None` uses the heuristic's default.
    pub depth: Option<u32>,
    pub parallel: bool,
    pub cache_enabled: bool,
    pub par_thresholds: ParThresholds,
    /// RNG seed for tile spawns; `None` seeds from the OS.
    pub seed: Option<u64>,
    pub illegal_moves: IllegalMovePolicy,
    pub max_moves: Option<u64>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            heuristic: HeuristicKind::default(),
            depth: None,
            parallel: true,
            cache_enabled: true,
            par_thresholds: ParThresholds::default(),
            seed: None,
            illegal_moves: IllegalMovePolicy::default(),
            max_moves: None,
        }
    }
}

impl RunConfig {
    pub fn from_toml<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(contents)?)
    }

    pub fn depth(&self) -> u32 { self.depth.unwrap_or_else(|| self.heuristic.default_depth()) }

    pub fn expectimax(&self) -> ExpectimaxConfig {
        ExpectimaxConfig {
            max_depth: self.depth(),
            cache_enabled: self.cache_enabled,
            par_thresholds: self.par_thresholds,
        }
    }
}
