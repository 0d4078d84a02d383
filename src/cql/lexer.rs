//! CQL tokenizer: a forward-only, whitespace-separated scan over the query
//! text. Bracket expressions are classified as piece-sets or square ranges
//! by their content.

use anyhow::bail;

use crate::chess::core::{File, PieceKind, Player, Rank, Square};
use crate::cql::ast::PieceDesignator;

/// One lexical token of a CQL query.
#[derive(Clone, Debug, PartialEq)]
pub enum Token {
    LParen,
    RParen,
    Lt,
    Gt,
    Le,
    Ge,
    Eq,
    Number(i64),
    String(String),
    Piece(Vec<PieceDesignator>),
    Square(Vec<Square>),
    /// An identifier: a filter name, logical keyword, or direction word.
    Ident(String),
}

const PIECE_LETTERS: &str = "KQRBNPkqrbnpAa_?";

fn piece_designator(ch: char) -> Option<PieceDesignator> {
    Some(match ch {
        'K' => PieceDesignator::Exact(Player::White, PieceKind::King),
        'Q' => PieceDesignator::Exact(Player::White, PieceKind::Queen),
        'R' => PieceDesignator::Exact(Player::White, PieceKind::Rook),
        'B' => PieceDesignator::Exact(Player::White, PieceKind::Bishop),
        'N' => PieceDesignator::Exact(Player::White, PieceKind::Knight),
        'P' => PieceDesignator::Exact(Player::White, PieceKind::Pawn),
        'k' => PieceDesignator::Exact(Player::Black, PieceKind::King),
        'q' => PieceDesignator::Exact(Player::Black, PieceKind::Queen),
        'r' => PieceDesignator::Exact(Player::Black, PieceKind::Rook),
        'b' => PieceDesignator::Exact(Player::Black, PieceKind::Bishop),
        'n' => PieceDesignator::Exact(Player::Black, PieceKind::Knight),
        'p' => PieceDesignator::Exact(Player::Black, PieceKind::Pawn),
        'A' => PieceDesignator::AnyOfColour(Player::White),
        'a' => PieceDesignator::AnyOfColour(Player::Black),
        '_' => PieceDesignator::Empty,
        '?' => PieceDesignator::Any,
        _ => return None,
    })
}

enum Axis {
    Files(Vec<File>),
    Ranks(Vec<Rank>),
}

fn parse_axis_component(raw: &str) -> Option<Axis> {
    let inner = raw
        .strip_prefix('[')
        .and_then(|s| s.strip_suffix(']'))
        .unwrap_or(raw);
    if let Some((lo, hi)) = inner.split_once('-') {
        let lo = lo.chars().next()?;
        let hi = hi.chars().next()?;
        if lo.is_ascii_alphabetic() {
            let lo = File::try_from(lo).ok()? as u8;
            let hi = File::try_from(hi).ok()? as u8;
            return Some(Axis::Files(
                (lo..=hi).filter_map(|v| File::try_from(v).ok()).collect(),
            ));
        }
        let lo = Rank::try_from(lo).ok()? as u8;
        let hi = Rank::try_from(hi).ok()? as u8;
        return Some(Axis::Ranks(
            (lo..=hi).filter_map(|v| Rank::try_from(v).ok()).collect(),
        ));
    }
    let mut files = Vec::new();
    let mut ranks = Vec::new();
    for ch in inner.chars() {
        if let Ok(file) = File::try_from(ch) {
            files.push(file);
        } else if let Ok(rank) = Rank::try_from(ch) {
            ranks.push(rank);
        } else {
            return None;
        }
    }
    match (files.is_empty(), ranks.is_empty()) {
        (false, true) => Some(Axis::Files(files)),
        (true, false) => Some(Axis::Ranks(ranks)),
        _ => None,
    }
}

/// Attempts to parse `raw` as a square designator: a literal square
/// (`e4`), the wildcard (`.`), or a bracketed range (`[a-d][1-4]`,
/// `[a-h]1`, `a[1-8]`).
fn try_parse_square_set(raw: &str) -> Option<Vec<Square>> {
    if raw == "." {
        let mut all = Vec::with_capacity(64);
        for rank in 0..8u8 {
            for file in 0..8u8 {
                all.push(Square::new(File::try_from(file).ok()?, Rank::try_from(rank).ok()?));
            }
        }
        return Some(all);
    }
    let (comp1, rest) = if let Some(rest) = raw.strip_prefix('[') {
        let end = rest.find(']')?;
        (&raw[..=end + 1], &rest[end + 1..])
    } else {
        if raw.len() < 2 {
            return None;
        }
        raw.split_at(1)
    };
    if rest.is_empty() {
        return None;
    }
    let axis1 = parse_axis_component(comp1)?;
    let axis2 = parse_axis_component(rest)?;
    let (files, ranks) = match (axis1, axis2) {
        (Axis::Files(files), Axis::Ranks(ranks)) | (Axis::Ranks(ranks), Axis::Files(files)) => {
            (files, ranks)
        }
        _ => return None,
    };
    Some(
        files
            .iter()
            .flat_map(|&file| ranks.iter().map(move |&rank| Square::new(file, rank)))
            .collect(),
    )
}

/// Tokenizes an entire CQL query eagerly (queries are short; unlike PGN
/// input there is no streaming requirement here).
///
/// # Errors
///
/// Returns [`crate::error::PipelineError::CqlSyntax`] with the byte offset
/// of the offending token.
pub fn tokenize(query: &str) -> anyhow::Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let bytes = query.as_bytes();
    let mut i = 0usize;
    while i < bytes.len() {
        let ch = bytes[i] as char;
        if ch.is_whitespace() {
            i += 1;
            continue;
        }
        match ch {
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            '<' if bytes.get(i + 1) == Some(&b'=') => {
                tokens.push(Token::Le);
                i += 2;
            }
            '>' if bytes.get(i + 1) == Some(&b'=') => {
                tokens.push(Token::Ge);
                i += 2;
            }
            '=' if bytes.get(i + 1) == Some(&b'=') => {
                tokens.push(Token::Eq);
                i += 2;
            }
            '<' => {
                tokens.push(Token::Lt);
                i += 1;
            }
            '>' => {
                tokens.push(Token::Gt);
                i += 1;
            }
            '"' => {
                let rest = &query[i + 1..];
                let mut value = String::new();
                let mut chars = rest.char_indices().peekable();
                let mut consumed = 0;
                let mut closed = false;
                while let Some((idx, c)) = chars.next() {
                    consumed = idx + c.len_utf8();
                    match c {
                        '\\' => {
                            if let Some((next_idx, next_c)) = chars.next() {
                                value.push(next_c);
                                consumed = next_idx + next_c.len_utf8();
                            }
                        }
                        '"' => {
                            closed = true;
                            break;
                        }
                        other => value.push(other),
                    }
                }
                if !closed {
                    bail!(crate::error::PipelineError::CqlSyntax(i));
                }
                tokens.push(Token::String(value));
                i += 1 + consumed;
            }
            _ => {
                let start = i;
                while i < bytes.len()
                    && !(bytes[i] as char).is_whitespace()
                    && !"()\"".contains(bytes[i] as char)
                {
                    i += 1;
                }
                let raw = &query[start..i];
                if let Ok(number) = raw.parse::<i64>() {
                    tokens.push(Token::Number(number));
                } else if let Some(squares) = try_parse_square_set(raw) {
                    tokens.push(Token::Square(squares));
                } else if raw.chars().count() == 1 && PIECE_LETTERS.contains(raw) {
                    tokens.push(Token::Piece(vec![piece_designator(raw.chars().next().unwrap())
                        .expect("checked membership in PIECE_LETTERS")]));
                } else if raw.starts_with('[')
                    && raw.ends_with(']')
                    && raw[1..raw.len() - 1].chars().all(|c| PIECE_LETTERS.contains(c))
                    && !raw.contains('-')
                {
                    let designators: anyhow::Result<Vec<_>> = raw[1..raw.len() - 1]
                        .chars()
                        .map(|c| {
                            piece_designator(c)
                                .ok_or_else(|| anyhow::anyhow!("unknown piece letter '{c}'"))
                        })
                        .collect();
                    tokens.push(Token::Piece(designators?));
                } else {
                    tokens.push(Token::Ident(raw.to_string()));
                }
            }
        }
    }
    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn tokenizes_simple_piece_filter() {
        let tokens = tokenize("(piece K e4)").unwrap();
        assert_eq!(
            tokens,
            vec![
                Token::LParen,
                Token::Ident("piece".to_string()),
                Token::Piece(vec![PieceDesignator::Exact(Player::White, PieceKind::King)]),
                Token::Square(vec![Square::E4]),
                Token::RParen,
            ]
        );
    }

    #[test]
    fn tokenizes_bracketed_piece_set() {
        let tokens = tokenize("[RQ]").unwrap();
        assert_eq!(
            tokens,
            vec![Token::Piece(vec![
                PieceDesignator::Exact(Player::White, PieceKind::Rook),
                PieceDesignator::Exact(Player::White, PieceKind::Queen),
            ])]
        );
    }

    #[test]
    fn tokenizes_square_range() {
        let tokens = tokenize("[a-d][1-4]").unwrap();
        let Token::Square(squares) = &tokens[0] else {
            panic!("expected a square set")
        };
        assert_eq!(squares.len(), 16);
    }

    #[test]
    fn unterminated_string_is_a_syntax_error() {
        assert!(tokenize("(result \"1-0)").is_err());
    }

    #[test]
    fn wildcard_square_matches_whole_board() {
        let tokens = tokenize(".").unwrap();
        let Token::Square(squares) = &tokens[0] else {
            panic!("expected a square set")
        };
        assert_eq!(squares.len(), 64);
    }
}
