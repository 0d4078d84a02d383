//! Criterion benchmarks for FEN parsing and legal move generation on the
//! mailbox board model.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use pgnsift::chess::board::Board;

const POSITIONS: &[&str] = &[
    "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1",
    "r1bqkbnr/pppp1ppp/2n5/4p3/4P3/5N2/PPPP1PPP/RNBQKB1R w KQkq - 2 3",
    "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1",
    "8/2p5/3p4/KP5r/1R3p1k/8/4P1P1/8 w - - 0 1",
    "rnb1kbnr/pp1p1ppp/1qp5/4p3/2B1P3/2N5/PPPP1PPP/R1BQK1NR w KQkq - 4 4",
];

fn parse_positions() -> Vec<Board> {
    POSITIONS.iter().map(|fen| Board::from_fen(fen).unwrap()).collect()
}

fn bench_fen_parsing(c: &mut Criterion) {
    let mut group = c.benchmark_group("FEN parsing");
    group.throughput(Throughput::Elements(POSITIONS.len() as u64));
    group.bench_with_input(
        BenchmarkId::new("from_fen", format!("{} positions", POSITIONS.len())),
        &POSITIONS,
        |b, positions| {
            b.iter(|| {
                for fen in *positions {
                    std::hint::black_box(Board::from_fen(fen).unwrap());
                }
            });
        },
    );
    group.finish();
}

fn bench_move_generation(c: &mut Criterion) {
    let mut group = c.benchmark_group("Move generation");
    let boards = parse_positions();
    group.throughput(Throughput::Elements(boards.len() as u64));
    group.bench_with_input(
        BenchmarkId::new("legal_moves", format!("{} positions", boards.len())),
        &boards,
        |b, boards| {
            b.iter(|| {
                for board in boards {
                    std::hint::black_box(board.legal_moves());
                }
            });
        },
    );
    group.finish();
}

criterion_group!(benches, bench_fen_parsing, bench_move_generation);
criterion_main!(benches);
