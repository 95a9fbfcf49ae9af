use std::sync::mpsc;
use std::thread;

use rand::{rngs::StdRng, SeedableRng};
use twenty48_search::engine::{Board, Move};
use twenty48_search::error::PolicyError;
use twenty48_search::expectimax::heuristic::{Basic, Corner};
use twenty48_search::expectimax::{Expectimax, ExpectimaxParallel};
use twenty48_search::game::{ChannelPolicy, EndReason, Game, GameEvent, GameState, SearchEngine, SearchPolicy};

fn almost_over() -> Board {
    // After Left the only empty cell is (3,0), and whatever spawns there
    // leaves no legal move.
    Board::from_values(&[
        0, 8, 16, 8,
        32, 64, 32, 64,
        64, 32, 64, 32,
        32, 64, 32, 64,
    ])
    .unwrap()
}

#[test]
fn one_move_then_end() {
    let mut requests = 0;
    let policy = |_: Board| -> Result<Move, PolicyError> {
        requests += 1;
        assert_eq!(requests, 1, "no move may be requested after the game is over");
        Ok(Move::Left)
    };
    let mut events = Vec::new();
    let mut game = Game::with_board(policy, StdRng::seed_from_u64(1), almost_over());
    let summary = game.run(|e| events.push(e));

    assert_eq!(events.len(), 2);
    match events[0] {
        GameEvent::Moved { board, points } => {
            assert_eq!(points, 0);
            assert_eq!(&board.values()[..3], &[8, 16, 8]);
            assert!(board.is_game_over());
        }
        other => panic!("expected a move first, got {other:?}"),
    }
    assert!(matches!(events[1], GameEvent::Ended { reason: EndReason::NoLegalMove, points: 0, .. }));
    assert_eq!(game.state(), GameState::Ended);
    assert_eq!(summary.moves, 1);
    assert_eq!(summary.highest_tile, 64);
}

#[test]
fn run_after_end_does_nothing() {
    let board = Board::from_values(&[2, 4, 2, 4, 4, 2, 4, 2, 2, 4, 2, 4, 4, 2, 4, 2]).unwrap();
    let policy = |_: Board| -> Result<Move, PolicyError> { panic!("game is already over") };
    let mut game = Game::with_board(policy, StdRng::seed_from_u64(2), board);
    let mut events = Vec::new();
    game.run(|e| events.push(e));
    game.run(|e| events.push(e));
    assert_eq!(events, vec![GameEvent::Ended { board, points: 0, reason: EndReason::NoLegalMove }]);
}

#[test]
fn search_player_finishes_a_game() {
    let policy = SearchPolicy::new(SearchEngine::Sequential(Expectimax::new()), Box::new(Basic), 0);
    let mut game = Game::new(policy, StdRng::seed_from_u64(2048));
    let mut last_points = 0;
    let mut ended = None;
    let summary = game.run(|e| match e {
        GameEvent::Moved { points, .. } => {
            assert!(points >= last_points);
            last_points = points;
        }
        GameEvent::Ended { reason, .. } => ended = Some(reason),
    });
    assert_eq!(ended, Some(EndReason::NoLegalMove));
    assert!(summary.moves > 20);
    assert_eq!(summary.points, last_points);
    assert!(summary.highest_tile >= 64);
}

#[test]
fn parallel_search_player() {
    let policy = SearchPolicy::new(SearchEngine::Parallel(ExpectimaxParallel::new()), Box::new(Corner), 1);
    let mut game = Game::new(policy, StdRng::seed_from_u64(7)).max_moves(Some(30));
    let summary = game.run(|_| {});
    assert_eq!(summary.moves, 30);
}

#[test]
fn channel_policy_across_threads() {
    let (board_tx, board_rx) = mpsc::channel::<Board>();
    let (move_tx, move_rx) = mpsc::channel();
    let responder = thread::spawn(move || {
        let mut served = 0;
        for board in board_rx {
            if served == 3 {
                let _ = move_tx.send(Err("player quit".to_string()));
                continue;
            }
            let dir = board.legal_moves()[0];
            served += 1;
            if move_tx.send(Ok(dir)).is_err() {
                break;
            }
        }
        served
    });

    let mut game = Game::new(ChannelPolicy::new(board_tx, move_rx), StdRng::seed_from_u64(3));
    let mut events = Vec::new();
    let summary = game.run(|e| events.push(e));
    drop(game);

    assert_eq!(summary.moves, 3);
    assert!(matches!(events.last(), Some(GameEvent::Ended { reason: EndReason::PolicyFailed, .. })));
    assert_eq!(responder.join().unwrap(), 3);
}

#[test]
fn disconnected_channel_ends_game() {
    let (board_tx, board_rx) = mpsc::channel::<Board>();
    let (_move_tx, move_rx) = mpsc::channel();
    drop(board_rx);
    let mut game = Game::new(ChannelPolicy::new(board_tx, move_rx), StdRng::seed_from_u64(4));
    let mut events = Vec::new();
    game.run(|e| events.push(e));
    assert!(matches!(events.as_slice(), [GameEvent::Ended { reason: EndReason::PolicyFailed, .. }]));
}
