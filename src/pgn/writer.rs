//! Serializes a [`Game`] back to PGN text: seven-tag-roster order where
//! present, movetext with move numbers, variations in parentheses, comments
//! in braces, and NAGs as `$n` tokens.

use std::fmt::Write as _;

use crate::pgn::arena::{Comment, MoveArena, MoveId};
use crate::pgn::parser::Game;

/// Renders `game` as a single PGN game record, tag pairs followed by a blank
/// line and movetext terminated by the result token.
#[must_use]
pub fn write_game(game: &Game) -> String {
    let mut out = String::new();
    for (tag, value) in &game.tags {
        let _ = writeln!(out, "[{tag} \"{}\"]", escape_tag_value(value));
    }
    out.push('\n');

    let mut movetext = String::new();
    let move_number = u32::try_from(game.start_offset / 2 + 1).unwrap_or(u32::MAX);
    let starts_white = game.start_offset % 2 == 0;
    write_line(&mut movetext, &game.arena, game.root, move_number, starts_white);
    movetext.push_str(game.result().unwrap_or("*"));
    for line in wrap(&movetext, 80) {
        out.push_str(&line);
        out.push('\n');
    }
    out
}

fn escape_tag_value(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Writes one line of movetext (main line or a variation) starting at
/// `start`, using `move_number` as the running full-move counter. Recurses
/// into each move's variations immediately after the move they branch from,
/// as PGN nests them.
fn write_line(out: &mut String, arena: &MoveArena, start: Option<MoveId>, move_number: u32, starts_white: bool) {
    let mut current = start;
    let mut number = move_number;
    let mut white_to_move = starts_white;
    let mut first = true;

    while let Some(id) = current {
        let node = arena.get(id);
        if white_to_move {
            if !first {
                out.push(' ');
            }
            let _ = write!(out, "{number}. {}", node.text);
        } else {
            if first {
                let _ = write!(out, "{number}... {}", node.text);
            } else {
                out.push(' ');
                out.push_str(&node.text);
            }
        }
        first = false;

        for &nag in &node.nags {
            let _ = write!(out, " ${nag}");
        }
        for comment in &node.comments {
            out.push(' ');
            write_comment(out, comment);
        }

        for &variation in &node.variations {
            out.push_str(" (");
            write_line(out, arena, Some(variation), number, !white_to_move);
            out.push(')');
        }

        if !white_to_move {
            number += 1;
        }
        white_to_move = !white_to_move;
        current = node.next;
    }
}

fn write_comment(out: &mut String, comment: &Comment) {
    match comment {
        Comment::Text(text) => {
            let _ = write!(out, "{{{text}}}");
        }
        Comment::Clock(clock) => {
            let _ = write!(out, "{{[%clk {clock}]}}");
        }
        Comment::Eval(eval) => {
            let _ = write!(out, "{{[%eval {eval}]}}");
        }
    }
}

/// Greedily wraps `text` on spaces so no rendered line exceeds `width`
/// columns, the convention most PGN readers (and writers) follow.
fn wrap(text: &str, width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();
    for word in text.split_whitespace() {
        if !current.is_empty() && current.len() + 1 + word.len() > width {
            lines.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::pgn::parser::parse_game;

    #[test]
    fn round_trips_a_simple_main_line() {
        let game = parse_game("[Event \"Test\"]\n[Result \"1-0\"]\n\n1. e4 e5 2. Nf3 Nc6 1-0\n").unwrap();
        let text = write_game(&game);
        assert!(text.contains("[Event \"Test\"]"));
        assert!(text.contains("1. e4 e5 2. Nf3 Nc6"));
        assert!(text.trim_end().ends_with("1-0"));
    }

    #[test]
    fn black_to_move_start_uses_ellipsis() {
        let mut game = parse_game("[Event \"Test\"]\n\n1. e4 e5 2. Nf3 *\n").unwrap();
        let second = game.arena.main_line(game.root).nth(1).unwrap();
        game.root = Some(second);
        game.start_offset = 1;
        let text = write_game(&game);
        assert!(text.contains("1... e5 2. Nf3"));
    }

    #[test]
    fn escapes_quotes_and_backslashes_in_tag_values() {
        let mut game = parse_game("[Event \"Test\"]\n\n1. e4 *\n").unwrap();
        game.tags.insert("Annotator".to_string(), "Say \"hi\"\\ok".to_string());
        let text = write_game(&game);
        assert!(text.contains("[Annotator \"Say \\\"hi\\\"\\\\ok\"]"));
    }
}
