//! Shared replay helper: walks a parsed move tree's main line back through
//! the chess engine to recover the sequence of boards and hashes it
//! represents. Used by both the ECO classifier and `GameAnalysis`, so the
//! replay logic itself lives in one place rather than being duplicated
//! across them.

use crate::chess::board::Board;
use crate::chess::core::MoveClass;
use crate::chess::zobrist::{self, Key};
use crate::pgn::arena::{MoveArena, MoveId};

/// Every position visited while replaying a game's main line, in order,
/// starting with the initial position (ply 0).
pub struct PositionTrace {
    pub boards: Vec<Board>,
    pub hashes: Vec<Key>,
    /// Number of plies (main-line moves) successfully replayed before a
    /// stop, which may be fewer than `arena.ply_count(root)` if a move
    /// failed to resolve: replay stops at the offending ply rather than
    /// panicking or skipping ahead.
    pub plies_replayed: usize,
}

impl PositionTrace {
    /// XOR-reduction of every hash visited, used by the duplicate detector
    /// and the ECO classifier's cumulative-hash lookup.
    #[must_use]
    pub fn cumulative_hash(&self) -> Key {
        self.hashes.iter().fold(0, |acc, key| acc ^ key)
    }

    #[must_use]
    pub fn final_board(&self) -> &Board {
        self.boards.last().expect("trace always has the initial position")
    }

    #[must_use]
    pub fn final_hash(&self) -> Key {
        *self.hashes.last().expect("trace always has the initial position")
    }
}

/// Replays `root`'s main line starting from `initial`, stopping early
/// (without error) if a move fails to re-resolve against the engine —
/// callers that need to distinguish that case should check
/// `plies_replayed` against the arena's own ply count.
#[must_use]
pub fn replay_main_line(initial: Board, arena: &MoveArena, root: Option<MoveId>) -> PositionTrace {
    let mut board = initial;
    let mut boards = vec![board.clone()];
    let mut hashes = vec![zobrist::hash(&board)];
    let mut plies_replayed = 0;

    for id in arena.main_line(root) {
        let node = arena.get(id);
        let (Some(from), Some(to), Some(piece)) = (node.from, node.to, node.piece_moved) else {
            break;
        };
        let castle = matches!(node.class, MoveClass::CastleShort | MoveClass::CastleLong)
            .then_some(node.class);
        let result = board.apply_candidate(
            piece,
            Some(from.file()),
            Some(from.rank()),
            to,
            node.promoted_piece,
            castle,
        );
        if result.is_err() {
            break;
        }
        plies_replayed += 1;
        hashes.push(zobrist::hash(&board));
        boards.push(board.clone());
    }

    PositionTrace {
        boards,
        hashes,
        plies_replayed,
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::pgn::parser::parse_game;

    #[test]
    fn trace_includes_initial_position() {
        let game = parse_game("[Event \"Test\"]\n\n1. e4 e5 *\n").unwrap();
        let trace = replay_main_line(Board::starting(), &game.arena, game.root);
        assert_eq!(trace.plies_replayed, 2);
        assert_eq!(trace.boards.len(), 3);
        assert_eq!(trace.hashes.len(), 3);
    }

    #[test]
    fn cumulative_hash_is_order_sensitive_xor() {
        let game = parse_game("[Event \"Test\"]\n\n1. e4 e5 *\n").unwrap();
        let trace = replay_main_line(Board::starting(), &game.arena, game.root);
        let expected = trace.hashes.iter().fold(0, |acc, key| acc ^ key);
        assert_eq!(trace.cumulative_hash(), expected);
    }
}
