//! `GameAnalysis`: the move-feature facts computed once per game, from a
//! single replay, and shared by every feature filter and annotation stage
//! that needs them.

use std::collections::HashMap;

use crate::chess::board::Board;
use crate::chess::core::{PieceKind, Player};
use crate::chess::zobrist::Key;
use crate::pgn::Game;
use crate::replay::replay_main_line;

/// Move-feature facts gathered from one pass over a game's reached
/// positions.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GameAnalysis {
    pub has_repetition: bool,
    pub has_5fold_repetition: bool,
    pub has_fifty_move_rule: bool,
    pub has_75_move_rule: bool,
    pub has_underpromotion: bool,
    pub insufficient_material_at_end: bool,
    pub material_odds_at_start: bool,
    /// The fewest total pieces present at any reached position, used by
    /// `--piececount N`: every position along the main line is checked, not
    /// just the final one.
    pub min_piece_count: usize,
    /// Any move in the main line carries a `{...}` comment.
    pub has_comment: bool,
    /// `Result` names the higher-rated side (by `WhiteElo`/`BlackElo`) as
    /// the winner. `false` when either Elo tag is missing, unparsable, or
    /// the game did not end decisively.
    pub higher_rated_winner: bool,
    /// Mirror of `higher_rated_winner` for the lower-rated side.
    pub lower_rated_winner: bool,
}

fn rated_winner_facts(game: &Game) -> (bool, bool) {
    let white_elo: Option<u32> = game.tag("WhiteElo").and_then(|v| v.parse().ok());
    let black_elo: Option<u32> = game.tag("BlackElo").and_then(|v| v.parse().ok());
    let (Some(white_elo), Some(black_elo)) = (white_elo, black_elo) else {
        return (false, false);
    };
    let winner = match game.result() {
        Some("1-0") => Some(Player::White),
        Some("0-1") => Some(Player::Black),
        _ => None,
    };
    let Some(winner) = winner else {
        return (false, false);
    };
    if white_elo == black_elo {
        return (false, false);
    }
    let higher_rated = if white_elo > black_elo { Player::White } else { Player::Black };
    (winner == higher_rated, winner != higher_rated)
}

fn is_insufficient_material(board: &Board) -> bool {
    let pieces: Vec<(Player, PieceKind)> = board.pieces().map(|(_, owner, kind)| (owner, kind)).collect();
    if pieces.len() > 3 {
        return false;
    }
    let minor_or_nothing = |player: Player| {
        let owned: Vec<PieceKind> = pieces
            .iter()
            .filter(|&&(owner, _)| owner == player)
            .map(|&(_, kind)| kind)
            .collect();
        match owned.as_slice() {
            [] | [PieceKind::King] => true,
            [PieceKind::King, PieceKind::Bishop | PieceKind::Knight] => true,
            _ => false,
        }
    };
    minor_or_nothing(Player::White) && minor_or_nothing(Player::Black)
}

fn material_value(board: &Board, player: Player) -> u32 {
    board
        .pieces()
        .filter(|&(_, owner, _)| owner == player)
        .map(|(_, _, kind)| kind.value())
        .sum()
}

/// Computes the full analysis from a parsed game's move tree, replaying it
/// from `initial`. Tag-derived facts (comments, rating comparison) read
/// `game` directly rather than requiring a second pass over the arena.
#[must_use]
pub fn analyze(initial: Board, game: &Game) -> GameAnalysis {
    let arena = &game.arena;
    let root = game.root;
    let mut occurrences: HashMap<Key, u32> = HashMap::new();
    let mut has_repetition = false;
    let mut has_5fold_repetition = false;
    let mut has_fifty_move_rule = false;
    let mut has_75_move_rule = false;
    let mut has_underpromotion = false;
    let mut min_piece_count = usize::MAX;

    let material_odds_at_start = material_value(&initial, Player::White) != material_value(&initial, Player::Black);

    let trace = replay_main_line(initial, arena, root);
    for board in &trace.boards {
        let count = occurrences.entry(crate::chess::zobrist::hash(board)).or_insert(0);
        *count += 1;
        if *count >= 3 {
            has_repetition = true;
        }
        if *count >= 5 {
            has_5fold_repetition = true;
        }
        if board.halfmove_clock() >= 100 {
            has_fifty_move_rule = true;
        }
        if board.halfmove_clock() >= 150 {
            has_75_move_rule = true;
        }
        let piece_count = board.pieces().count();
        min_piece_count = min_piece_count.min(piece_count);
    }

    let mut has_comment = false;
    for id in arena.main_line(root) {
        let node = arena.get(id);
        if matches!(node.promoted_piece, Some(kind) if kind != PieceKind::Queen) {
            has_underpromotion = true;
        }
        if !node.comments.is_empty() {
            has_comment = true;
        }
    }

    let (higher_rated_winner, lower_rated_winner) = rated_winner_facts(game);

    GameAnalysis {
        has_repetition,
        has_5fold_repetition,
        has_fifty_move_rule,
        has_75_move_rule,
        has_underpromotion,
        insufficient_material_at_end: is_insufficient_material(trace.final_board()),
        material_odds_at_start,
        min_piece_count: if min_piece_count == usize::MAX { 0 } else { min_piece_count },
        has_comment,
        higher_rated_winner,
        lower_rated_winner,
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::pgn::parser::parse_game;

    #[test]
    fn detects_underpromotion() {
        // 1. a4 h5 2. a5 h4 3. a6 h3 4. axb7 hxg2 5. bxa8=R gxh1=N
        let game = parse_game(
            "[Event \"Test\"]\n\n1. a4 h5 2. a5 h4 3. a6 h3 4. axb7 hxg2 5. bxa8=R gxh1=N *\n",
        )
        .unwrap();
        let analysis = analyze(game.initial_board().unwrap(), &game);
        assert!(analysis.has_underpromotion);
    }

    #[test]
    fn fresh_game_has_no_repetition_or_fifty_move_rule() {
        let game = parse_game("[Event \"Test\"]\n\n1. e4 e5 *\n").unwrap();
        let analysis = analyze(game.initial_board().unwrap(), &game);
        assert!(!analysis.has_repetition);
        assert!(!analysis.has_fifty_move_rule);
        assert!(!analysis.insufficient_material_at_end);
    }

    #[test]
    fn detects_a_comment_anywhere_in_the_main_line() {
        let game = parse_game("[Event \"Test\"]\n\n1. e4 e5 2. Nf3 {developing} Nc6 *\n").unwrap();
        let analysis = analyze(game.initial_board().unwrap(), &game);
        assert!(analysis.has_comment);
    }

    #[test]
    fn no_comment_means_no_comment() {
        let game = parse_game("[Event \"Test\"]\n\n1. e4 e5 2. Nf3 Nc6 *\n").unwrap();
        let analysis = analyze(game.initial_board().unwrap(), &game);
        assert!(!analysis.has_comment);
    }

    #[test]
    fn higher_rated_winner_is_detected_from_elo_and_result_tags() {
        let game = parse_game(
            "[Event \"Test\"]\n[WhiteElo \"2400\"]\n[BlackElo \"2000\"]\n[Result \"1-0\"]\n\n1. e4 e5 *\n",
        )
        .unwrap();
        let analysis = analyze(game.initial_board().unwrap(), &game);
        assert!(analysis.higher_rated_winner);
        assert!(!analysis.lower_rated_winner);
    }

    #[test]
    fn lower_rated_winner_is_detected_from_elo_and_result_tags() {
        let game = parse_game(
            "[Event \"Test\"]\n[WhiteElo \"2000\"]\n[BlackElo \"2400\"]\n[Result \"1-0\"]\n\n1. e4 e5 *\n",
        )
        .unwrap();
        let analysis = analyze(game.initial_board().unwrap(), &game);
        assert!(analysis.lower_rated_winner);
        assert!(!analysis.higher_rated_winner);
    }

    #[test]
    fn missing_elo_tags_mean_neither_rated_winner_flag_is_set() {
        let game = parse_game("[Event \"Test\"]\n[Result \"1-0\"]\n\n1. e4 e5 *\n").unwrap();
        let analysis = analyze(game.initial_board().unwrap(), &game);
        assert!(!analysis.higher_rated_winner);
        assert!(!analysis.lower_rated_winner);
    }

    #[test]
    fn king_vs_king_is_insufficient_material() {
        let board = Board::from_fen("4k3/8/8/8/8/8/8/4K3 w - - 0 1").unwrap();
        assert!(is_insufficient_material(&board));
    }

    #[test]
    fn king_and_rook_vs_king_is_sufficient_material() {
        let board = Board::from_fen("4k3/8/8/8/8/8/8/R3K3 w - - 0 1").unwrap();
        assert!(!is_insufficient_material(&board));
    }
}
