//! ECO (Encyclopaedia of Chess Openings) classification: ingests an
//! opening book itself written as PGN, indexes it by final-position hash,
//! and tags games with their longest matching prefix.

use std::collections::HashMap;

use crate::chess::board::Board;
use crate::chess::zobrist::Key;
use crate::error::PipelineError;
use crate::pgn::{Game, GameStream};
use crate::replay::replay_main_line;

const BUCKET_COUNT: u64 = 4096;

/// One named opening line from the book.
#[derive(Clone, Debug)]
pub struct EcoEntry {
    pub code: String,
    pub opening: Option<String>,
    pub variation: Option<String>,
    pub sub_variation: Option<String>,
    pub required_hash: Key,
    pub cumulative_hash: Key,
    pub half_moves: usize,
}

/// An indexed opening book, ready to classify games.
#[derive(Debug, Default)]
pub struct EcoBook {
    buckets: HashMap<u64, Vec<EcoEntry>>,
    /// Deepest `HalfMoves + 6` across all entries: the point past which
    /// classification gives up looking.
    cutoff: usize,
}

impl EcoBook {
    /// Builds a book by replaying every game in `pgn` (each must carry at
    /// least an `ECO` tag) from the standard starting position.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::EcoLoad`] if the book contains no usable
    /// entries: an empty or entirely-malformed book is a fatal startup
    /// error.
    pub fn build(pgn: &str) -> anyhow::Result<Self> {
        let mut book = Self::default();
        for game in GameStream::new(pgn.as_bytes()) {
            let Some(code) = game.tag("ECO").map(str::to_string) else {
                continue;
            };
            let trace = replay_main_line(Board::starting(), &game.arena, game.root);
            let entry = EcoEntry {
                code,
                opening: game.tag("Opening").map(str::to_string),
                variation: game.tag("Variation").map(str::to_string),
                sub_variation: game.tag("Sub-Variation").map(str::to_string),
                required_hash: trace.final_hash(),
                cumulative_hash: trace.cumulative_hash(),
                half_moves: trace.plies_replayed,
            };
            book.cutoff = book.cutoff.max(entry.half_moves + 6);
            book.buckets
                .entry(entry.required_hash % BUCKET_COUNT)
                .or_default()
                .push(entry);
        }
        if book.buckets.is_empty() {
            anyhow::bail!(PipelineError::EcoLoad(
                "opening book contained no games with an ECO tag".to_string()
            ));
        }
        Ok(book)
    }

    /// Classifies `game`, returning its strongest match if any ply of the
    /// game's main line, up to the book's cutoff depth, hit a known
    /// opening.
    #[must_use]
    pub fn classify(&self, game: &Game) -> Option<EcoEntry> {
        let trace = replay_main_line(Board::starting(), &game.arena, game.root);
        let mut best_exact: Option<EcoEntry> = None;
        let mut best_possible: Option<EcoEntry> = None;

        let mut cumulative: Key = 0;
        for (ply, &hash) in trace.hashes.iter().enumerate() {
            cumulative ^= hash;
            if ply == 0 || ply > self.cutoff {
                continue;
            }
            let Some(bucket) = self.buckets.get(&(hash % BUCKET_COUNT)) else {
                continue;
            };
            for entry in bucket {
                if entry.required_hash != hash {
                    continue;
                }
                if entry.half_moves == ply && entry.cumulative_hash == cumulative {
                    best_exact = Some(entry.clone());
                } else if ply.abs_diff(entry.half_moves) <= 6 {
                    best_possible = Some(entry.clone());
                }
            }
        }

        best_exact.or(best_possible)
    }
}

/// Applies a classification result to `tags`, overwriting any pre-existing
/// `ECO`/`Opening`/`Variation`/`SubVariation` tags: only fields present on
/// `entry` are set.
pub fn add_eco_tags(tags: &mut indexmap::IndexMap<String, String>, entry: &EcoEntry) {
    tags.insert("ECO".to_string(), entry.code.clone());
    if let Some(opening) = &entry.opening {
        tags.insert("Opening".to_string(), opening.clone());
    }
    if let Some(variation) = &entry.variation {
        tags.insert("Variation".to_string(), variation.clone());
    }
    if let Some(sub_variation) = &entry.sub_variation {
        tags.insert("Sub-Variation".to_string(), sub_variation.clone());
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::pgn::parse_game;

    const BOOK: &str = "[ECO \"B90\"]\n[Opening \"Sicilian\"]\n[Variation \"Najdorf\"]\n\n1. e4 c5 2. Nf3 d6 3. d4 cxd4 4. Nxd4 Nf6 5. Nc3 a6 *\n";

    #[test]
    fn classifies_exact_match_against_opening_book() {
        let book = EcoBook::build(BOOK).unwrap();
        let game = parse_game(
            "[Event \"Test\"]\n\n1. e4 c5 2. Nf3 d6 3. d4 cxd4 4. Nxd4 Nf6 5. Nc3 a6 6. Be2 e5 *\n",
        )
        .unwrap();
        let entry = book.classify(&game).expect("should classify as Najdorf");
        assert_eq!(entry.code, "B90");
        assert_eq!(entry.opening.as_deref(), Some("Sicilian"));
        assert_eq!(entry.variation.as_deref(), Some("Najdorf"));
    }

    #[test]
    fn unrelated_game_does_not_classify() {
        let book = EcoBook::build(BOOK).unwrap();
        let game = parse_game("[Event \"Test\"]\n\n1. d4 d5 2. c4 e6 *\n").unwrap();
        assert!(book.classify(&game).is_none());
    }

    #[test]
    fn add_eco_tags_overwrites_existing() {
        let mut tags = indexmap::IndexMap::new();
        tags.insert("ECO".to_string(), "A00".to_string());
        let entry = EcoEntry {
            code: "B90".to_string(),
            opening: Some("Sicilian".to_string()),
            variation: None,
            sub_variation: None,
            required_hash: 0,
            cumulative_hash: 0,
            half_moves: 10,
        };
        add_eco_tags(&mut tags, &entry);
        assert_eq!(tags.get("ECO"), Some(&"B90".to_string()));
        assert_eq!(tags.get("Opening"), Some(&"Sicilian".to_string()));
        assert!(!tags.contains_key("Variation"));
    }

    #[test]
    fn empty_book_is_an_eco_load_error() {
        assert!(EcoBook::build("").is_err());
    }
}
