use criterion::{criterion_group, criterion_main, Criterion};
use rand::{rngs::StdRng, SeedableRng};
use rayon::ThreadPoolBuilder;
use std::hint::black_box;
use twenty48_search::engine::{Board, Move};
use twenty48_search::expectimax::heuristic::{Corner, HeuristicKind};
use twenty48_search::expectimax::Evaluator;
use twenty48_search::expectimax::{Expectimax, ExpectimaxParallel};

fn corpus() -> Vec<Board> {
    let mut rng = StdRng::seed_from_u64(7777);
    let mut boards = Vec::new();
    let mut b = Board::EMPTY.with_random_tile(&mut rng).with_random_tile(&mut rng);
    boards.push(b);
    for i in 0..16 {
        let outcome = b.make_move(Move::ALL[i % 4], &mut rng);
        if outcome.changed { b = outcome.board; }
        boards.push(b);
    }
    boards
}

fn bench_seq(c: &mut Criterion) {
    let boards = corpus();
    let mut ex = Expectimax::new();
    for depth in [1u32, 2] {
        c.bench_function(&format!("expectimax_seq/depth_{depth}"), |bch| {
            bch.iter(|| {
                let mut acc = 0u8;
                for &bd in &boards {
                    if let Ok(m) = ex.choose_best_move(bd, depth, &Corner) { acc ^= u8::from(m); }
                }
                black_box(acc)
            })
        });
    }
}

fn bench_par(c: &mut Criterion) {
    // Pin a small pool for stability
    let pool = match ThreadPoolBuilder::new().num_threads(4).build() {
        Ok(pool) => pool,
        Err(_) => return,
    };
    let boards = corpus();
    let mut ex = ExpectimaxParallel::new();
    for depth in [1u32, 2] {
        c.bench_function(&format!("expectimax_par/depth_{depth}"), |bch| {
            bch.iter(|| pool.install(|| {
                let mut acc = 0.0;
                for &bd in &boards {
                    for be in ex.branch_evals(bd, depth, &Corner) { if be.legal { acc += be.ev; } }
                }
                black_box(acc)
            }))
        });
    }
}

fn bench_heuristics(c: &mut Criterion) {
    let boards = corpus();
    for kind in [HeuristicKind::Naive, HeuristicKind::Basic, HeuristicKind::Edge, HeuristicKind::Corner] {
        let evaluator = kind.evaluator();
        c.bench_function(&format!("heuristic/{kind:?}"), |bch| {
            bch.iter(|| {
                let mut acc = 0.0;
                for &bd in &boards {
                    for dir in Move::ALL {
                        let outcome = bd.apply_move(dir);
                        if outcome.changed { acc += evaluator.evaluate(&outcome); }
                    }
                }
                black_box(acc)
            })
        });
    }
}

criterion_group!(expectimax, bench_seq, bench_par, bench_heuristics);
criterion_main!(expectimax);
