//! [Zobrist hashing] of board positions: a 64-bit fingerprint that is
//! identical for identical positions and (with overwhelming probability)
//! distinct otherwise, used by duplicate detection and ECO classification.
//!
//! [Zobrist hashing]: https://www.chessprogramming.org/Zobrist_Hashing

use crate::chess::board::Board;
use crate::chess::core::{PieceKind, Player};

/// A Zobrist key.
pub type Key = u64;

const WHITE_KING: [Key; 64] = include!(concat!(env!("OUT_DIR"), "/white_king_zobrist_keys"));
const WHITE_QUEEN: [Key; 64] = include!(concat!(env!("OUT_DIR"), "/white_queen_zobrist_keys"));
const WHITE_ROOK: [Key; 64] = include!(concat!(env!("OUT_DIR"), "/white_rook_zobrist_keys"));
const WHITE_BISHOP: [Key; 64] = include!(concat!(env!("OUT_DIR"), "/white_bishop_zobrist_keys"));
const WHITE_KNIGHT: [Key; 64] = include!(concat!(env!("OUT_DIR"), "/white_knight_zobrist_keys"));
const WHITE_PAWN: [Key; 64] = include!(concat!(env!("OUT_DIR"), "/white_pawn_zobrist_keys"));
const BLACK_KING: [Key; 64] = include!(concat!(env!("OUT_DIR"), "/black_king_zobrist_keys"));
const BLACK_QUEEN: [Key; 64] = include!(concat!(env!("OUT_DIR"), "/black_queen_zobrist_keys"));
const BLACK_ROOK: [Key; 64] = include!(concat!(env!("OUT_DIR"), "/black_rook_zobrist_keys"));
const BLACK_BISHOP: [Key; 64] = include!(concat!(env!("OUT_DIR"), "/black_bishop_zobrist_keys"));
const BLACK_KNIGHT: [Key; 64] = include!(concat!(env!("OUT_DIR"), "/black_knight_zobrist_keys"));
const BLACK_PAWN: [Key; 64] = include!(concat!(env!("OUT_DIR"), "/black_pawn_zobrist_keys"));

const CASTLING_KEYS: [Key; 16] = include!(concat!(env!("OUT_DIR"), "/castling_zobrist_keys"));
const EN_PASSANT_FILE_KEYS: [Key; 8] =
    include!(concat!(env!("OUT_DIR"), "/en_passant_zobrist_keys"));
const SIDE_TO_MOVE_KEY: Key = include!(concat!(env!("OUT_DIR"), "/side_to_move_zobrist_key"));

fn piece_square_table(owner: Player, kind: PieceKind) -> &'static [Key; 64] {
    match (owner, kind) {
        (Player::White, PieceKind::King) => &WHITE_KING,
        (Player::White, PieceKind::Queen) => &WHITE_QUEEN,
        (Player::White, PieceKind::Rook) => &WHITE_ROOK,
        (Player::White, PieceKind::Bishop) => &WHITE_BISHOP,
        (Player::White, PieceKind::Knight) => &WHITE_KNIGHT,
        (Player::White, PieceKind::Pawn) => &WHITE_PAWN,
        (Player::Black, PieceKind::King) => &BLACK_KING,
        (Player::Black, PieceKind::Queen) => &BLACK_QUEEN,
        (Player::Black, PieceKind::Rook) => &BLACK_ROOK,
        (Player::Black, PieceKind::Bishop) => &BLACK_BISHOP,
        (Player::Black, PieceKind::Knight) => &BLACK_KNIGHT,
        (Player::Black, PieceKind::Pawn) => &BLACK_PAWN,
    }
}

/// Computes the full Zobrist hash of `board`: XOR of the piece-square keys
/// for every occupied square, the castling-rights key, the en-passant file
/// key (if set) and the side-to-move key. Collision-resistant: identical
/// positions hash identically, and positions differing in placement, side
/// to move, castling rights or en-passant file hash differently except for
/// accidental collisions.
#[must_use]
pub fn hash(board: &Board) -> Key {
    let mut key = 0;
    for (square, owner, kind) in board.pieces() {
        key ^= piece_square_table(owner, kind)[square as usize];
    }
    key ^= CASTLING_KEYS[board.castling_rights().bits() as usize];
    if let Some(square) = board.en_passant_square() {
        key ^= EN_PASSANT_FILE_KEYS[square.file() as usize];
    }
    if board.to_move() == Player::Black {
        key ^= SIDE_TO_MOVE_KEY;
    }
    key
}

/// A cheaper, non-collision-resistant 64-bit digest, used to pre-filter
/// candidates before a full [`hash`] comparison. Built from piece counts
/// and occupancy parity rather than per-square keys, so it is much faster
/// to compute but collides far more often.
#[must_use]
pub fn weak_hash(board: &Board) -> Key {
    let mut digest: Key = u64::from(board.to_move() == Player::Black);
    for (square, owner, kind) in board.pieces() {
        let tag = (kind as u64) << 1 | u64::from(owner == Player::Black);
        digest = digest
            .wrapping_mul(1_099_511_628_211)
            .wrapping_add((square as u64 + 1) * (tag + 1));
    }
    digest
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn identical_positions_hash_identically() {
        let a = Board::starting();
        let b =
            Board::from_fen("rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1").unwrap();
        assert_eq!(hash(&a), hash(&b));
    }

    #[test]
    fn side_to_move_changes_hash() {
        let white_to_move = Board::starting();
        let black_to_move =
            Board::from_fen("rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR b KQkq - 0 1").unwrap();
        assert_ne!(hash(&white_to_move), hash(&black_to_move));
    }

    #[test]
    fn castling_rights_change_hash() {
        let both = Board::from_fen("4k3/8/8/8/8/8/8/4K2R w K - 0 1").unwrap();
        let none = Board::from_fen("4k3/8/8/8/8/8/8/4K2R w - - 0 1").unwrap();
        assert_ne!(hash(&both), hash(&none));
    }

    #[test]
    fn en_passant_file_changes_hash() {
        let with_ep =
            Board::from_fen("rnbqkbnr/ppp1pppp/8/3pP3/8/8/PPPP1PPP/RNBQKBNR w KQkq d6 0 3")
                .unwrap();
        let without_ep =
            Board::from_fen("rnbqkbnr/ppp1pppp/8/3pP3/8/8/PPPP1PPP/RNBQKBNR w KQkq - 0 3").unwrap();
        assert_ne!(hash(&with_ep), hash(&without_ep));
    }

    #[test]
    fn different_placements_almost_always_differ() {
        let e4 =
            Board::from_fen("rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq - 0 1").unwrap();
        let d4 =
            Board::from_fen("rnbqkbnr/pppppppp/8/8/3P4/8/PPP1PPPP/RNBQKBNR b KQkq - 0 1").unwrap();
        assert_ne!(hash(&e4), hash(&d4));
    }
}
