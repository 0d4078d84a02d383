//! Recursive-descent PGN parser: turns one game's raw text into a [`Game`],
//! and a whole file into a stream of [`Game`]s with per-game error
//! recovery.

use std::io::BufRead;
use std::iter::Peekable;

use indexmap::IndexMap;

use crate::chess::board::Board;
use crate::chess::core::{File, MoveClass, PieceKind, Rank, Square};
use crate::error::PipelineError;
use crate::pgn::arena::{Comment, MoveArena, MoveId};
use crate::pgn::lexer::{lex_tags, Lexer, Token};

/// A single parsed game: its tag pairs (in file order) and its move tree.
#[derive(Clone, Debug)]
pub struct Game {
    /// Tag pairs in the order they appeared, e.g. `Event`, `Site`, `Date`.
    pub tags: IndexMap<String, String>,
    /// Every move reachable from `root`, owned in one arena.
    pub arena: MoveArena,
    /// Head of the main line, or `None` for a game with no moves.
    pub root: Option<MoveId>,
    /// Non-fatal parse errors recorded while recovering within this game.
    /// An empty vec does not imply the game is rules-legal, only that it
    /// tokenized and resolved cleanly.
    pub errors: Vec<String>,
    /// Plies skipped before `root` by a `startPly` truncation, so movetext
    /// rendering can tell which side was to move at `root` without
    /// replaying from the original start.
    pub start_offset: usize,
}

impl Game {
    #[must_use]
    pub fn tag(&self, name: &str) -> Option<&str> {
        self.tags.get(name).map(String::as_str)
    }

    #[must_use]
    pub fn result(&self) -> Option<&str> {
        self.tag("Result")
    }

    #[must_use]
    pub fn ply_count(&self) -> usize {
        self.arena.ply_count(self.root)
    }

    #[must_use]
    pub fn is_well_formed(&self) -> bool {
        self.errors.is_empty()
    }

    /// The board this game's moves were replayed from, honoring `FEN`/
    /// `SetUp` tags.
    ///
    /// # Errors
    ///
    /// Returns an error if the `FEN` tag is present but malformed.
    pub fn initial_board(&self) -> anyhow::Result<Board> {
        initial_board(&self.tags)
    }
}

/// A SAN move, resolved into the pieces needed to disambiguate it against a
/// [`Board`]'s legal moves.
struct SanMove {
    piece: PieceKind,
    from_file: Option<File>,
    from_rank: Option<Rank>,
    to: Square,
    promotion: Option<PieceKind>,
    castle: Option<MoveClass>,
}

/// Parses one SAN token (move-number and result already stripped) into its
/// disambiguating components.
///
/// # Errors
///
/// Returns an error if the token isn't shaped like a legal SAN move.
fn parse_san(raw: &str) -> anyhow::Result<SanMove> {
    let body = raw.trim_end_matches(['+', '#', '!', '?']);
    if body.is_empty() {
        anyhow::bail!("empty move text");
    }

    if body == "O-O-O" || body == "0-0-0" {
        return Ok(SanMove {
            piece: PieceKind::King,
            from_file: None,
            from_rank: None,
            to: Square::A1,
            promotion: None,
            castle: Some(MoveClass::CastleLong),
        });
    }
    if body == "O-O" || body == "0-0" {
        return Ok(SanMove {
            piece: PieceKind::King,
            from_file: None,
            from_rank: None,
            to: Square::A1,
            promotion: None,
            castle: Some(MoveClass::CastleShort),
        });
    }

    let mut chars = body.chars();
    let (piece, mut rest): (PieceKind, String) = match chars.next().unwrap() {
        'K' => (PieceKind::King, chars.collect()),
        'Q' => (PieceKind::Queen, chars.collect()),
        'R' => (PieceKind::Rook, chars.collect()),
        'B' => (PieceKind::Bishop, chars.collect()),
        'N' => (PieceKind::Knight, chars.collect()),
        _ => (PieceKind::Pawn, body.to_string()),
    };

    let promotion = if let Some(eq) = rest.find('=') {
        let promo_char = rest[eq + 1..]
            .chars()
            .next()
            .ok_or_else(|| anyhow::anyhow!("missing promotion piece in '{raw}'"))?;
        let kind = match promo_char.to_ascii_uppercase() {
            'Q' => PieceKind::Queen,
            'R' => PieceKind::Rook,
            'B' => PieceKind::Bishop,
            'N' => PieceKind::Knight,
            _ => anyhow::bail!("unknown promotion piece '{promo_char}' in '{raw}'"),
        };
        rest.truncate(eq);
        Some(kind)
    } else {
        None
    };

    rest.retain(|ch| ch != 'x');

    if rest.len() < 2 {
        anyhow::bail!("move text too short to contain a destination square: '{raw}'");
    }
    let split = rest.len() - 2;
    let disambiguation = &rest[..split];
    let destination = &rest[split..];
    let to = Square::try_from(destination)
        .map_err(|err| anyhow::anyhow!("bad destination square in '{raw}': {err}"))?;

    let (from_file, from_rank) = match disambiguation.len() {
        0 => (None, None),
        1 => {
            let ch = disambiguation.chars().next().unwrap();
            if ch.is_ascii_digit() {
                (None, Some(Rank::try_from(ch)?))
            } else {
                (Some(File::try_from(ch)?), None)
            }
        }
        2 => {
            let mut it = disambiguation.chars();
            let file = File::try_from(it.next().unwrap())?;
            let rank = Rank::try_from(it.next().unwrap())?;
            (Some(file), Some(rank))
        }
        _ => anyhow::bail!("malformed disambiguation in '{raw}'"),
    };

    Ok(SanMove {
        piece,
        from_file,
        from_rank,
        to,
        promotion,
        castle: None,
    })
}

type TokenStream<'a> = Peekable<Lexer<'a>>;

/// Parses one line of movetext (main line or a variation body) starting
/// from `board`'s current position, mutating `board` in place as moves are
/// applied. Returns the head of the parsed line and the result token, if
/// the line ended on one.
fn parse_line(
    tokens: &mut TokenStream<'_>,
    arena: &mut MoveArena,
    board: &mut Board,
    errors: &mut Vec<String>,
) -> anyhow::Result<(Option<MoveId>, Option<String>)> {
    let mut first: Option<MoveId> = None;
    let mut prev: Option<MoveId> = None;
    let mut ply = 0usize;

    loop {
        let Some(peeked) = tokens.peek() else {
            return Ok((first, None));
        };
        match peeked {
            Err(_) => {
                let err = tokens.next().unwrap().unwrap_err();
                return Err(err);
            }
            Ok(Token::Result(_)) => {
                let Token::Result(text) = tokens.next().unwrap()? else {
                    unreachable!()
                };
                return Ok((first, Some(text)));
            }
            Ok(Token::VariationEnd) => return Ok((first, None)),
            Ok(Token::MoveNumber(_)) => {
                tokens.next();
            }
            Ok(Token::San(_)) => {
                let Token::San(text) = tokens.next().unwrap()? else {
                    unreachable!()
                };
                ply += 1;
                let san = match parse_san(&text) {
                    Ok(san) => san,
                    Err(err) => {
                        errors.push(
                            PipelineError::PgnParse {
                                game_index: 0,
                                position: text.clone(),
                                kind: err.to_string(),
                            }
                            .to_string(),
                        );
                        return Ok((first, None));
                    }
                };
                let board_before = board.clone();
                let resolved = match board.apply_candidate(
                    san.piece,
                    san.from_file,
                    san.from_rank,
                    san.to,
                    san.promotion,
                    san.castle,
                ) {
                    Ok(resolved) => resolved,
                    Err(_) => {
                        errors.push(PipelineError::IllegalMove { ply, text: text.clone() }.to_string());
                        return Ok((first, None));
                    }
                };

                let id = arena.alloc(text.clone());
                {
                    let node = arena.get_mut(id);
                    node.from = Some(resolved.from);
                    node.to = Some(resolved.to);
                    node.piece_moved = Some(resolved.piece);
                    node.captured = resolved.captured;
                    node.promoted_piece = resolved.promotion;
                    node.class = resolved.class;
                    node.check = board.in_check(board.to_move());
                    node.mate = node.check && board.legal_moves().is_empty();
                }

                if let Some(p) = prev {
                    arena.get_mut(p).next = Some(id);
                } else {
                    first = Some(id);
                }
                prev = Some(id);

                loop {
                    match tokens.peek() {
                        Some(Ok(Token::Comment(_))) => {
                            let Some(Ok(Token::Comment(text))) = tokens.next() else {
                                unreachable!()
                            };
                            arena.get_mut(id).comments.push(classify_comment(text));
                        }
                        Some(Ok(Token::Nag(_))) => {
                            let Some(Ok(Token::Nag(value))) = tokens.next() else {
                                unreachable!()
                            };
                            arena.get_mut(id).nags.push(value);
                        }
                        Some(Ok(Token::VariationStart)) => {
                            tokens.next();
                            let mut branch = board_before.clone();
                            let var_first = match parse_line(tokens, arena, &mut branch, errors) {
                                Ok((var_first, _result)) => var_first,
                                Err(err) => {
                                    errors.push(err.to_string());
                                    None
                                }
                            };
                            match tokens.next() {
                                Some(Ok(Token::VariationEnd)) => {}
                                Some(Ok(other)) => {
                                    anyhow::bail!("expected ')' to close variation, found {other:?}")
                                }
                                Some(Err(err)) => return Err(err),
                                None => anyhow::bail!("unterminated variation"),
                            }
                            if let Some(vf) = var_first {
                                arena.get_mut(id).variations.push(vf);
                            }
                        }
                        _ => break,
                    }
                }
            }
            Ok(Token::VariationStart) => {
                // A variation with no preceding move in this line: skip it,
                // recording the loss rather than aborting the whole game.
                tokens.next();
                let mut throwaway = board.clone();
                let _ = parse_line(tokens, arena, &mut throwaway, errors);
                match tokens.next() {
                    Some(Ok(Token::VariationEnd)) => {}
                    _ => anyhow::bail!("unterminated variation"),
                }
                errors.push("variation with no anchoring move was discarded".to_string());
            }
        }
    }
}

fn classify_comment(text: String) -> Comment {
    let trimmed = text.trim();
    if let Some(rest) = trimmed.strip_prefix("[%clk ") {
        if let Some(value) = rest.strip_suffix(']') {
            return Comment::Clock(value.trim().to_string());
        }
    }
    if let Some(rest) = trimmed.strip_prefix("[%eval ") {
        if let Some(value) = rest.strip_suffix(']') {
            return Comment::Eval(value.trim().to_string());
        }
    }
    Comment::Text(text)
}

/// Builds the starting [`Board`] for a game from its tags: `FEN`/`SetUp`
/// tags override the standard starting position.
///
/// # Errors
///
/// Returns [`PipelineError::FenSyntax`] (wrapped) if the `FEN` tag is
/// present but malformed.
pub fn initial_board(tags: &IndexMap<String, String>) -> anyhow::Result<Board> {
    match tags.get("FEN") {
        Some(fen) if tags.get("SetUp").map(String::as_str) != Some("0") => Board::from_fen(fen),
        _ => Ok(Board::starting()),
    }
}

/// Parses one game's raw text (tag section and movetext together).
///
/// # Errors
///
/// Returns an error if the tag section itself is malformed. Errors within
/// the movetext are instead recorded on [`Game::errors`] and parsing stops
/// at the point of failure, returning what was successfully built so far.
pub fn parse_game(raw: &str) -> anyhow::Result<Game> {
    let (tag_pairs, movetext) = lex_tags(raw)?;
    let mut tags = IndexMap::new();
    for (name, value) in tag_pairs {
        tags.insert(name, value);
    }

    let mut arena = MoveArena::new();
    let mut errors = Vec::new();
    let mut board = match initial_board(&tags) {
        Ok(board) => board,
        Err(err) => {
            errors.push(format!("invalid starting position: {err}"));
            return Ok(Game {
                tags,
                arena,
                root: None,
                errors,
                start_offset: 0,
            });
        }
    };

    let mut tokens: TokenStream<'_> = Lexer::new(movetext).peekable();
    let root = match parse_line(&mut tokens, &mut arena, &mut board, &mut errors) {
        Ok((root, result)) => {
            if let Some(result) = result {
                tags.entry("Result".to_string()).or_insert(result);
            }
            root
        }
        Err(err) => {
            errors.push(err.to_string());
            None
        }
    };

    Ok(Game {
        tags,
        arena,
        root,
        errors,
        start_offset: 0,
    })
}

/// Splits a multi-game PGN stream into per-game raw text chunks, yielding
/// one [`Game`] at a time without holding the whole file in memory: a
/// corrupt game is recorded as an error on that one `Game` rather than
/// aborting the stream.
pub struct GameStream<R> {
    reader: R,
    pending: String,
    done: bool,
}

impl<R: BufRead> GameStream<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            pending: String::new(),
            done: false,
        }
    }

    fn next_chunk(&mut self) -> std::io::Result<Option<String>> {
        let mut chunk = std::mem::take(&mut self.pending);
        let mut movetext_started = !chunk.trim().is_empty() && !chunk.trim_start().starts_with('[');
        let mut line = String::new();
        loop {
            line.clear();
            let read = self.reader.read_line(&mut line)?;
            if read == 0 {
                self.done = true;
                break;
            }
            let trimmed = line.trim_start();
            if trimmed.starts_with('[') && movetext_started {
                self.pending = line;
                break;
            }
            if !trimmed.is_empty() && !trimmed.starts_with('[') {
                movetext_started = true;
            }
            chunk.push_str(&line);
        }
        if chunk.trim().is_empty() {
            Ok(None)
        } else {
            Ok(Some(chunk))
        }
    }
}

impl<R: BufRead> Iterator for GameStream<R> {
    type Item = Game;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done && self.pending.is_empty() {
            return None;
        }
        loop {
            match self.next_chunk() {
                Ok(Some(chunk)) => {
                    return Some(match parse_game(&chunk) {
                        Ok(game) => game,
                        Err(err) => Game {
                            tags: IndexMap::new(),
                            arena: MoveArena::new(),
                            root: None,
                            errors: vec![err.to_string()],
                            start_offset: 0,
                        },
                    })
                }
                Ok(None) => return None,
                Err(_) => return None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn parses_tags_and_mainline() {
        let pgn = "[Event \"Test\"]\n[Result \"1-0\"]\n\n1. e4 e5 2. Nf3 Nc6 3. Bb5 1-0\n";
        let game = parse_game(pgn).unwrap();
        assert_eq!(game.tag("Event"), Some("Test"));
        assert_eq!(game.result(), Some("1-0"));
        assert_eq!(game.ply_count(), 5);
        assert!(game.is_well_formed());
    }

    #[test]
    fn fools_mate_sets_check_and_mate_flags() {
        let pgn = "[Event \"Fool's mate\"]\n\n1. f3 e5 2. g4 Qh4# *\n";
        let game = parse_game(pgn).unwrap();
        let moves: Vec<_> = game
            .arena
            .main_line(game.root)
            .map(|id| game.arena.get(id).clone())
            .collect();
        assert_eq!(moves.len(), 4);
        assert!(moves[3].check);
        assert!(moves[3].mate);
    }

    #[test]
    fn variation_attaches_to_the_move_it_replaces() {
        let pgn = "[Event \"Test\"]\n\n1. e4 (1. d4 d5) e5 *\n";
        let game = parse_game(pgn).unwrap();
        let first = game.root.unwrap();
        assert_eq!(game.arena.get(first).text, "e4");
        assert_eq!(game.arena.get(first).variations.len(), 1);
        let variation_first = game.arena.get(first).variations[0];
        assert_eq!(game.arena.get(variation_first).text, "d4");
    }

    #[test]
    fn clock_comment_is_classified() {
        let pgn = "[Event \"Test\"]\n\n1. e4 {[%clk 0:05:00]} e5 *\n";
        let game = parse_game(pgn).unwrap();
        let first = game.root.unwrap();
        assert_eq!(
            game.arena.get(first).comments,
            vec![Comment::Clock("0:05:00".to_string())]
        );
    }

    #[test]
    fn illegal_move_is_recorded_as_an_error() {
        let pgn = "[Event \"Test\"]\n\n1. e4 e5 2. Bxf7 *\n";
        let game = parse_game(pgn).unwrap();
        assert!(!game.is_well_formed());
    }

    #[test]
    fn illegal_move_truncates_the_main_line_without_discarding_it() {
        let pgn = "[Event \"Test\"]\n\n1. e4 e5 2. Bxf7 Nf6 *\n";
        let game = parse_game(pgn).unwrap();
        assert!(!game.is_well_formed());
        let moves: Vec<_> = game
            .arena
            .main_line(game.root)
            .map(|id| game.arena.get(id).text.clone())
            .collect();
        assert_eq!(moves, vec!["e4", "e5"]);
        assert!(game.errors.iter().any(|e| e.contains("Bxf7")));
    }

    #[test]
    fn illegal_move_inside_a_variation_does_not_discard_the_main_line() {
        let pgn = "[Event \"Test\"]\n\n1. e4 (1. d4 Bxf7) e5 2. Nf3 *\n";
        let game = parse_game(pgn).unwrap();
        let moves: Vec<_> = game
            .arena
            .main_line(game.root)
            .map(|id| game.arena.get(id).text.clone())
            .collect();
        assert_eq!(moves, vec!["e4", "e5", "Nf3"]);
        assert!(game.errors.iter().any(|e| e.contains("Bxf7")));
    }

    #[test]
    fn game_stream_separates_consecutive_games() {
        let pgn = "[Event \"One\"]\n\n1. e4 e5 *\n\n[Event \"Two\"]\n\n1. d4 d5 *\n";
        let games: Vec<_> = GameStream::new(pgn.as_bytes()).collect();
        assert_eq!(games.len(), 2);
        assert_eq!(games[0].tag("Event"), Some("One"));
        assert_eq!(games[1].tag("Event"), Some("Two"));
    }

    #[test]
    fn game_stream_recovers_after_a_corrupt_game() {
        let pgn = "[Event \"Bad\"]\n\n1. e4 e5 2. Bxf7 *\n\n[Event \"Good\"]\n\n1. e4 e5 *\n";
        let games: Vec<_> = GameStream::new(pgn.as_bytes()).collect();
        assert_eq!(games.len(), 2);
        assert!(!games[0].is_well_formed());
        assert!(games[1].is_well_formed());
    }
}
