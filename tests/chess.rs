use itertools::Itertools;
use pgnsift::chess::board::Board;
use pgnsift::chess::core::MoveClass;
use pretty_assertions::assert_eq;

fn setup(fen: &str) -> Board {
    Board::from_fen(fen).unwrap_or_else(|e| panic!("parsing legal position {fen}: {e}"))
}

fn get_moves(board: &Board) -> Vec<String> {
    board
        .legal_moves()
        .iter()
        .map(|m| format!("{}{}", m.from, m.to))
        .sorted()
        .collect()
}

fn perft(board: &Board, depth: u32) -> u64 {
    if depth == 0 {
        return 1;
    }
    let mut nodes = 0;
    for candidate in board.legal_moves() {
        let mut next = board.clone();
        let castle = matches!(candidate.class, MoveClass::CastleShort | MoveClass::CastleLong).then_some(candidate.class);
        next.apply_candidate(
            candidate.piece,
            Some(candidate.from.file()),
            Some(candidate.from.rank()),
            candidate.to,
            candidate.promotion,
            castle,
        )
        .expect("candidate move generated by legal_moves must re-apply cleanly");
        nodes += perft(&next, depth - 1);
    }
    nodes
}

#[test]
fn fen_round_trips() {
    for fen in [
        "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1",
        "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1",
        "8/2p5/3p4/KP5r/1R3p1k/8/4P1P1/8 w - - 0 1",
        "rnbqkb1r/pp2pppp/3p1n2/8/3NP3/2N5/PPP2PPP/R1BQKB1R b KQkq - 0 5",
    ] {
        assert_eq!(setup(fen).to_fen(), fen);
    }
}

#[test]
fn starting_position_move_count() {
    assert_eq!(get_moves(&Board::starting()).len(), 20);
}

#[test]
fn en_passant_capture_is_legal() {
    let board = setup("6qk/8/8/3Pp3/8/8/K7/8 w - e6 0 1");
    assert!(get_moves(&board).contains(&"d5e6".to_string()));
}

#[test]
fn pinned_pawn_cannot_move_without_en_passant() {
    let board = setup("6qk/8/8/3Pp3/8/8/K7/8 w - - 0 1");
    assert!(!get_moves(&board).iter().any(|m| m.starts_with("d5")));
}

#[test]
fn perft_starting_position() {
    let board = Board::starting();
    assert_eq!(perft(&board, 0), 1);
    assert_eq!(perft(&board, 1), 20);
    assert_eq!(perft(&board, 2), 400);
    assert_eq!(perft(&board, 3), 8902);
}

#[test]
fn perft_kiwipete() {
    let board = setup("r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1");
    assert_eq!(perft(&board, 1), 48);
    assert_eq!(perft(&board, 2), 2039);
}

#[test]
fn perft_endgame() {
    let board = setup("8/2p5/3p4/KP5r/1R3p1k/8/4P1P1/8 w - - 0 1");
    assert_eq!(perft(&board, 1), 14);
    assert_eq!(perft(&board, 2), 191);
    assert_eq!(perft(&board, 3), 2812);
}

#[test]
fn castling_rights_update_after_rook_capture() {
    let mut board = setup("r3k2r/8/8/8/8/8/8/R3K2R w KQkq - 0 1");
    let candidate = board
        .legal_moves()
        .into_iter()
        .find(|m| m.from.to_string() == "a1" && m.to.to_string() == "a8")
        .expect("rook can reach a8");
    board
        .apply_candidate(candidate.piece, Some(candidate.from.file()), Some(candidate.from.rank()), candidate.to, None, None)
        .unwrap();
    assert_eq!(board.to_fen(), "R3k2r/8/8/8/8/8/8/4K2R b Kk - 0 1");
}
