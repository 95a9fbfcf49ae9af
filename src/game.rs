//! Turn loop: ask a policy for a direction, apply it, spawn a tile, repeat.
//!
//! The loop is a small state machine (`Initializing -> AwaitingMove -> Ended`).
//! The only place it can suspend is [`MovePolicy::request_move`]; a policy
//! backed by user or network input can block there (see [`ChannelPolicy`]).

use std::sync::mpsc::{Receiver, Sender};

use log::{info, warn};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::engine::{Board, Move};
use crate::error::PolicyError;
use crate::expectimax::{Evaluator, Expectimax, ExpectimaxParallel};

/// Source of moves for a game.
pub trait MovePolicy {
    fn request_move(&mut self, board: Board) -> Result<Move, PolicyError>;
}

/// Expectimax search backend used by [`SearchPolicy`].
pub enum SearchEngine {
    Sequential(Expectimax),
    Parallel(ExpectimaxParallel),
}

/// Picks moves with an expectimax search and a heuristic.
pub struct SearchPolicy {
    engine: SearchEngine,
    evaluator: Box<dyn Evaluator>,
    depth: u32,
}

impl SearchPolicy {
    pub fn new(engine: SearchEngine, evaluator: Box<dyn Evaluator>, depth: u32) -> Self {
        Self { engine, evaluator, depth }
    }

    pub fn depth(&self) -> u32 { self.depth }
}

impl MovePolicy for SearchPolicy {
    fn request_move(&mut self, board: Board) -> Result<Move, PolicyError> {
        let evaluator = self.evaluator.as_ref();
        let dir = match &mut self.engine {
            SearchEngine::Sequential(ex) => ex.choose_best_move(board, self.depth, evaluator)?,
            SearchEngine::Parallel(ex) => ex.choose_best_move(board, self.depth, evaluator)?,
        };
        Ok(dir)
    }
}

/// Forwards each board over a channel and blocks until a direction comes back.
///
/// The other end replies with `Ok(dir)` or an error message; dropping either
/// channel ends the game with [`PolicyError::Disconnected`].
pub struct ChannelPolicy {
    requests: Sender<Board>,
    replies: Receiver<Result<Move, String>>,
}

impl ChannelPolicy {
    pub fn new(requests: Sender<Board>, replies: Receiver<Result<Move, String>>) -> Self {
        Self { requests, replies }
    }
}

impl MovePolicy for ChannelPolicy {
    fn request_move(&mut self, board: Board) -> Result<Move, PolicyError> {
        self.requests.send(board).map_err(|_| PolicyError::Disconnected)?;
        match self.replies.recv() {
            Ok(Ok(dir)) => Ok(dir),
            Ok(Err(reason)) => Err(PolicyError::Rejected(reason)),
            Err(_) => Err(PolicyError::Disconnected),
        }
    }
}

impl<F> MovePolicy for F
where
    F: FnMut(Board) -> Result<Move, PolicyError>,
{
    fn request_move(&mut self, board: Board) -> Result<Move, PolicyError> { self(board) }
}

/// What to do when a policy answers with a direction that does not change the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case", tag = "mode")]
pub enum IllegalMovePolicy {
    /// End the game immediately.
    #[default]
    Forfeit,
    /// Ask again, at most `max_attempts` more times.
    Retry { max_attempts: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameState {
    Initializing,
    AwaitingMove,
    Ended,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndReason {
    NoLegalMove,
    PolicyFailed,
    IllegalMove,
    MoveLimit,
}

/// Notifications emitted by [`Game::run`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameEvent {
    Moved { board: Board, points: u64 },
    Ended { board: Board, points: u64, reason: EndReason },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GameSummary {
    pub moves: u64,
    pub points: u64,
    pub highest_tile: u64,
}

/// A single game driven by a [`MovePolicy`].
pub struct Game<P, R> {
    policy: P,
    rng: R,
    board: Option<Board>,
    points: u64,
    moves: u64,
    state: GameState,
    illegal_moves: IllegalMovePolicy,
    max_moves: Option<u64>,
}

impl<P: MovePolicy, R: Rng> Game<P, R> {
    /// A game that starts from an empty board with two random tiles.
    pub fn new(policy: P, rng: R) -> Self {
        Self {
            policy,
            rng,
            board: None,
            points: 0,
            moves: 0,
            state: GameState::Initializing,
            illegal_moves: IllegalMovePolicy::default(),
            max_moves: None,
        }
    }

    /// A game that starts from `board` as-is.
    pub fn with_board(policy: P, rng: R, board: Board) -> Self {
        Self { board: Some(board), ..Self::new(policy, rng) }
    }

    pub fn illegal_moves(mut self, handling: IllegalMovePolicy) -> Self {
        self.illegal_moves = handling;
        self
    }

    /// Stop after this many applied moves.
    pub fn max_moves(mut self, limit: Option<u64>) -> Self {
        self.max_moves = limit;
        self
    }

    pub fn state(&self) -> GameState { self.state }

    pub fn board(&self) -> Option<Board> { self.board }

    pub fn points(&self) -> u64 { self.points }

    pub fn summary(&self) -> GameSummary {
        GameSummary {
            moves: self.moves,
            points: self.points,
            highest_tile: self.board.map_or(0, Board::max_value),
        }
    }

    /// Play until the game ends, sending every notification to `sink`.
    ///
    /// Calling `run` on a game that already ended does nothing.
    pub fn run<S: FnMut(GameEvent)>(&mut self, mut sink: S) -> GameSummary {
        if self.state == GameState::Initializing {
            self.start();
        }
        while self.state == GameState::AwaitingMove {
            let event = self.step();
            sink(event);
        }
        self.summary()
    }

    fn start(&mut self) {
        let board = match self.board {
            Some(board) => board,
            None => Board::EMPTY.with_random_tile(&mut self.rng).with_random_tile(&mut self.rng),
        };
        info!("game start: {} empty cells", board.count_empty());
        self.board = Some(board);
        self.state = GameState::AwaitingMove;
    }

    /// Run one turn and return the event it produced.
    fn step(&mut self) -> GameEvent {
        let board = self.board.unwrap_or(Board::EMPTY);
        if board.is_game_over() {
            return self.end(board, EndReason::NoLegalMove);
        }
        if self.max_moves.is_some_and(|limit| self.moves >= limit) {
            return self.end(board, EndReason::MoveLimit);
        }

        let mut retries_left = match self.illegal_moves {
            IllegalMovePolicy::Forfeit => 0,
            IllegalMovePolicy::Retry { max_attempts } => max_attempts,
        };
        let outcome = loop {
            let dir = match self.policy.request_move(board) {
                Ok(dir) => dir,
                Err(e) => {
                    warn!("move policy failed: {e}");
                    return self.end(board, EndReason::PolicyFailed);
                }
            };
            let outcome = board.make_move(dir, &mut self.rng);
            if outcome.changed {
                break outcome;
            }
            if retries_left == 0 {
                warn!("illegal move {dir}, ending game");
                return self.end(board, EndReason::IllegalMove);
            }
            warn!("illegal move {dir}, asking again");
            retries_left -= 1;
        };

        self.moves += 1;
        self.points += outcome.points;
        self.board = Some(outcome.board);
        GameEvent::Moved { board: outcome.board, points: self.points }
    }

    fn end(&mut self, board: Board, reason: EndReason) -> GameEvent {
        self.state = GameState::Ended;
        info!(
            "game over ({:?}) after {} moves: {} points, highest tile {}",
            reason,
            self.moves,
            self.points,
            board.max_value()
        );
        GameEvent::Ended { board, points: self.points, reason }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    fn rng() -> StdRng { StdRng::seed_from_u64(99) }

    #[test]
    fn starts_with_two_tiles() {
        let mut seen = None;
        {
            let policy = |board: Board| -> Result<Move, PolicyError> {
                seen.get_or_insert(board);
                Err(PolicyError::Rejected("stop".into()))
            };
            let mut game = Game::new(policy, rng());
            game.run(|_| {});
        }
        let first = seen.unwrap();
        assert_eq!(first.count_empty(), 14);
        assert!(first.values().iter().all(|&v| v == 0 || v == 2 || v == 4));
    }

    #[test]
    fn policy_error_ends_immediately() {
        let mut calls = 0;
        let policy = |_: Board| -> Result<Move, PolicyError> {
            calls += 1;
            Err(PolicyError::Rejected("intentional".into()))
        };
        let mut events = Vec::new();
        let mut game = Game::new(policy, rng());
        let summary = game.run(|e| events.push(e));
        assert_eq!(game.state(), GameState::Ended);
        assert_eq!(summary.moves, 0);
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], GameEvent::Ended { reason: EndReason::PolicyFailed, points: 0, .. }));
        drop(game);
        assert_eq!(calls, 1);
    }

    #[test]
    fn illegal_move_forfeits_by_default() {
        let start = Board::from_values(&[2, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0]).unwrap();
        let mut events = Vec::new();
        let mut game = Game::with_board(|_: Board| -> Result<Move, PolicyError> { Ok(Move::Up) }, rng(), start);
        game.run(|e| events.push(e));
        assert_eq!(
            events,
            vec![GameEvent::Ended { board: start, points: 0, reason: EndReason::IllegalMove }]
        );
    }

    #[test]
    fn illegal_move_is_asked_again() {
        let start = Board::from_values(&[2, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0]).unwrap();
        let mut asked = 0;
        let mut events = Vec::new();
        {
            let mut answers = [Move::Up, Move::Right].into_iter();
            let policy = |_: Board| -> Result<Move, PolicyError> {
                asked += 1;
                answers.next().ok_or(PolicyError::Disconnected)
            };
            let mut game = Game::with_board(policy, rng(), start)
                .illegal_moves(IllegalMovePolicy::Retry { max_attempts: 2 });
            game.run(|e| events.push(e));
        }
        // Up is refused, Right is applied, and the third request finds no answer.
        assert_eq!(asked, 3);
        assert_eq!(events.len(), 2);
        match events[0] {
            GameEvent::Moved { board, points } => {
                assert_eq!(points, 0);
                assert_eq!(board.get(3, 0).unwrap(), 2);
                assert_eq!(board.count_empty(), 14);
            }
            other => panic!("unexpected event {other:?}"),
        }
        assert!(matches!(events[1], GameEvent::Ended { reason: EndReason::PolicyFailed, .. }));
    }

    #[test]
    fn retries_run_out() {
        let start = Board::from_values(&[2, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0]).unwrap();
        let mut asked = 0;
        let mut events = Vec::new();
        {
            let mut answers = [Move::Up, Move::Left, Move::Right].into_iter();
            let policy = |_: Board| -> Result<Move, PolicyError> {
                asked += 1;
                answers.next().ok_or(PolicyError::Disconnected)
            };
            let mut game = Game::with_board(policy, rng(), start)
                .illegal_moves(IllegalMovePolicy::Retry { max_attempts: 1 });
            game.run(|e| events.push(e));
            assert_eq!(game.state(), GameState::Ended);
            assert_eq!(game.summary().moves, 0);
        }
        assert_eq!(asked, 2);
        assert_eq!(
            events,
            vec![GameEvent::Ended { board: start, points: 0, reason: EndReason::IllegalMove }]
        );
    }

    #[test]
    fn move_limit() {
        let mut game = Game::new(SearchPolicy::new(
            SearchEngine::Sequential(Expectimax::new()),
            Box::new(crate::expectimax::heuristic::Basic),
            0,
        ), rng())
        .max_moves(Some(5));
        let mut moved = 0;
        let summary = game.run(|e| {
            if let GameEvent::Moved { .. } = e {
                moved += 1;
            }
        });
        assert_eq!(moved, 5);
        assert_eq!(summary.moves, 5);
        assert!(summary.highest_tile >= 2);
    }

    #[test]
    fn points_accumulate() {
        let start = Board::from_values(&[2, 2, 4, 4, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0]).unwrap();
        let mut events = Vec::new();
        let mut game = Game::with_board(|_: Board| -> Result<Move, PolicyError> { Ok(Move::Left) }, rng(), start).max_moves(Some(1));
        game.run(|e| events.push(e));
        match events[0] {
            GameEvent::Moved { board, points } => {
                assert_eq!(points, 12);
                assert_eq!(board.get(0, 0).unwrap(), 4);
                assert_eq!(board.get(1, 0).unwrap(), 8);
                assert_eq!(board.count_empty(), 13);
            }
            other => panic!("unexpected event {other:?}"),
        }
        assert!(matches!(events[1], GameEvent::Ended { reason: EndReason::MoveLimit, points: 12, .. }));
    }
}
