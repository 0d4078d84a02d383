//! Filter pipeline: the ordered, short-circuiting sequence of stages that
//! decides `Matched | SkipOutput | NotMatched` for one game and, for
//! matched games, applies truncation and annotation.

use std::hash::{Hash, Hasher};

use crate::chess::zobrist::Key;
use crate::config::{Annotations, PipelineConfig, TagCriterion, Truncation};
use crate::cql::{self, EvalContext, GameContext};
use crate::dedup::DuplicateCheck;
use crate::eco::{self, EcoBook};
use crate::filter::analysis::{self, GameAnalysis};
use crate::pgn::Game;
use crate::replay::{replay_main_line, PositionTrace};

/// The outcome of running a game through the pipeline.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Decision {
    Matched,
    NotMatched,
    /// The game should not be emitted to any sink (fix/validate rejection),
    /// distinct from `NotMatched` because it never reaches the negation
    /// stage.
    SkipOutput,
}

/// The hashes a matched game's worker computes once, handed to the
/// single-threaded consumer so it can run same-setup/duplicate detection
/// itself: duplicate detection runs on the consumer, not on workers, so it
/// needs no lock. A worker never owns detector state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DedupKeys {
    pub initial_hash: Key,
    pub final_hash: Key,
    pub cumulative_hash: Key,
    pub tag_fingerprint: u64,
}

/// Applies the consumer-side dedup stages, including the `-D`/`-U` output
/// routing, to an already-decided game, possibly downgrading `Matched` to
/// `SkipOutput`.
pub fn resolve_duplicates(
    decision: Decision,
    keys: DedupKeys,
    config: &PipelineConfig,
    same_setup: &mut dyn DuplicateCheck,
    duplicates: &mut dyn DuplicateCheck,
) -> Decision {
    if decision != Decision::Matched {
        return decision;
    }
    if config.delete_same_setup && same_setup.check_and_add(keys.initial_hash, keys.initial_hash, 0) {
        return Decision::SkipOutput;
    }
    let is_duplicate = duplicates.check_and_add(keys.final_hash, keys.cumulative_hash, keys.tag_fingerprint);
    if is_duplicate && config.suppress_duplicates {
        return Decision::SkipOutput;
    }
    if !is_duplicate && config.duplicates_only {
        return Decision::SkipOutput;
    }
    Decision::Matched
}

/// Filters a game against a [`PipelineConfig`], reusing a compiled CQL query
/// across every game in a run.
pub struct FilterPipeline {
    cql_ast: Option<cql::Ast>,
}

impl FilterPipeline {
    /// Compiles the configured CQL query once, up front.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::PipelineError::CqlSyntax`] if the query fails
    /// to parse; this is a fatal startup error.
    pub fn new(config: &PipelineConfig) -> anyhow::Result<Self> {
        let cql_ast = config.cql_query.as_deref().map(cql::parse).transpose()?;
        Ok(Self { cql_ast })
    }

    /// Runs every pipeline stage against `game` that does not require
    /// shared detector state, mutating it in place with ECO tags and
    /// annotations if it matches, and returns the hashes the consumer needs
    /// to finish the decision via [`resolve_duplicates`]. Safe to call
    /// concurrently from any number of workers.
    pub fn process(&self, game: &mut Game, config: &PipelineConfig, eco_book: Option<&EcoBook>) -> (Decision, DedupKeys) {
        let no_keys = DedupKeys {
            initial_hash: 0,
            final_hash: 0,
            cumulative_hash: 0,
            tag_fingerprint: 0,
        };
        if config.fixable {
            fix_tags(game);
        }
        if !validate(game, config) {
            return (Decision::SkipOutput, no_keys);
        }
        if let Some(book) = eco_book {
            if let Some(entry) = book.classify(game) {
                eco::add_eco_tags(&mut game.tags, &entry);
            }
        }

        let initial = match game.initial_board() {
            Ok(board) => board,
            Err(_) => return (Decision::SkipOutput, no_keys),
        };
        let initial_hash = crate::chess::zobrist::hash(&initial);
        let trace = replay_main_line(initial.clone(), &game.arena, game.root);
        let keys = DedupKeys {
            initial_hash,
            final_hash: trace.final_hash(),
            cumulative_hash: trace.cumulative_hash(),
            tag_fingerprint: tag_fingerprint(game),
        };

        let mut matched = matches_tag_criteria(game, &config.tag_criteria);
        if matched {
            if let Some(ast) = &self.cql_ast {
                matched = self.matches_cql(ast, game, &trace);
            }
        }
        if matched {
            if let Some(bound) = config.ply_bound {
                matched = bound.contains(game.ply_count());
            }
        }
        if matched {
            if let Some(bound) = config.move_bound {
                matched = bound.contains(game.ply_count().div_ceil(2));
            }
        }

        let analysis = config
            .features
            .needs_game_analysis()
            .then(|| analysis::analyze(initial, &*game));
        if matched {
            matched = matches_feature_flags(&config.features, &analysis, &trace);
        }
        if matched {
            matched = matches_setup_tags(&*game, &config.features);
        }

        if config.negate {
            matched = !matched;
        }

        if matched {
            annotate(game, &config.annotations, &trace);
            truncate(game, &config.truncation);
            Decision::Matched
        } else {
            Decision::NotMatched
        }
    }

    fn matches_cql(&self, ast: &cql::Ast, game: &Game, trace: &PositionTrace) -> bool {
        let game_ctx = game_context(game);
        trace.boards.iter().any(|board| {
            let ctx = EvalContext::with_game(board, game_ctx);
            cql::eval_bool(ast, &ctx)
        })
    }
}

fn game_context(game: &Game) -> GameContext<'_> {
    GameContext {
        result: game.result(),
        white_player: game.tag("White"),
        black_player: game.tag("Black"),
        year: game.tag("Date").and_then(|date| date.get(..4)).and_then(|y| y.parse().ok()),
        white_elo: game.tag("WhiteElo").and_then(|e| e.parse().ok()),
        black_elo: game.tag("BlackElo").and_then(|e| e.parse().ok()),
    }
}

const MANDATORY_TAGS: [&str; 7] = ["Event", "Site", "Date", "Round", "White", "Black", "Result"];
const VALID_RESULTS: [&str; 4] = ["1-0", "0-1", "1/2-1/2", "*"];

fn fix_tags(game: &mut Game) {
    for &tag in &MANDATORY_TAGS {
        game.tags.entry(tag.to_string()).or_insert_with(|| "?".to_string());
    }
    if let Some(result) = game.tags.get_mut("Result") {
        let normalized = match result.trim() {
            "1-0" | "1:0" | "10" => "1-0",
            "0-1" | "0:1" | "01" => "0-1",
            "1/2-1/2" | "0.5-0.5" | "draw" | "Draw" => "1/2-1/2",
            other => other,
        };
        *result = normalized.to_string();
    }
    if let Some(date) = game.tags.get_mut("Date") {
        *date = date.replace('/', ".").replace('-', ".");
    }
    for value in game.tags.values_mut() {
        *value = value.trim().chars().filter(|c| !c.is_control()).collect();
    }
}

fn validate(game: &Game, config: &PipelineConfig) -> bool {
    if config.strict {
        let has_all_tags = MANDATORY_TAGS.iter().all(|&tag| game.tags.contains_key(tag));
        let valid_result = game
            .result()
            .is_some_and(|result| VALID_RESULTS.contains(&result));
        if !has_all_tags || !valid_result {
            return false;
        }
    }
    if config.validate && !game.is_well_formed() {
        return false;
    }
    true
}

fn tag_fingerprint(game: &Game) -> u64 {
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    for key in ["White", "Black", "Date", "Round"] {
        game.tag(key).unwrap_or_default().hash(&mut hasher);
    }
    hasher.finish()
}

fn soundex(word: &str) -> String {
    let mut chars = word.chars().filter(|c| c.is_ascii_alphabetic());
    let Some(first) = chars.next() else {
        return String::new();
    };
    let code = |c: char| -> Option<char> {
        match c.to_ascii_uppercase() {
            'B' | 'F' | 'P' | 'V' => Some('1'),
            'C' | 'G' | 'J' | 'K' | 'Q' | 'S' | 'X' | 'Z' => Some('2'),
            'D' | 'T' => Some('3'),
            'L' => Some('4'),
            'M' | 'N' => Some('5'),
            'R' => Some('6'),
            _ => None,
        }
    };
    let mut digits = String::new();
    let mut previous = code(first);
    for c in chars {
        let current = code(c);
        if current.is_some() && current != previous {
            digits.push(current.unwrap());
        }
        previous = current;
        if digits.len() == 3 {
            break;
        }
    }
    while digits.len() < 3 {
        digits.push('0');
    }
    format!("{}{digits}", first.to_ascii_uppercase())
}

fn matches_tag_criteria(game: &Game, criteria: &[TagCriterion]) -> bool {
    criteria.iter().all(|criterion| match criterion {
        TagCriterion::Equals { tag, value } => game.tag(tag) == Some(value.as_str()),
        TagCriterion::Substring { tag, needle } => {
            game.tag(tag).is_some_and(|actual| actual.contains(needle.as_str()))
        }
        TagCriterion::Soundex { tag, value } => {
            game.tag(tag).is_some_and(|actual| soundex(actual) == soundex(value))
        }
        TagCriterion::FenStartingPosition(fen) => game.tag("FEN") == Some(fen.as_str()),
        TagCriterion::EcoPrefix(prefix) => game.tag("ECO").is_some_and(|eco| eco.starts_with(prefix.as_str())),
    })
}

fn matches_feature_flags(flags: &crate::config::FeatureFlags, analysis: &Option<GameAnalysis>, trace: &PositionTrace) -> bool {
    let mut matched = true;
    if flags.checkmate {
        matched &= trace.final_board().is_checkmate();
    }
    if flags.stalemate {
        matched &= trace.final_board().is_stalemate();
    }
    if let Some(analysis) = analysis {
        if flags.fifty_move_rule {
            matched &= analysis.has_fifty_move_rule;
        }
        if flags.seventy_five_move_rule {
            matched &= analysis.has_75_move_rule;
        }
        if flags.repetition {
            matched &= analysis.has_repetition;
        }
        if flags.repetition5 {
            matched &= analysis.has_5fold_repetition;
        }
        if flags.insufficient_material {
            matched &= analysis.insufficient_material_at_end;
        }
        if flags.underpromotion {
            matched &= analysis.has_underpromotion;
        }
        if flags.commented {
            matched &= analysis.has_comment;
        }
        if flags.higher_rated_winner {
            matched &= analysis.higher_rated_winner;
        }
        if flags.lower_rated_winner {
            matched &= analysis.lower_rated_winner;
        }
        if flags.odds {
            matched &= analysis.material_odds_at_start;
        }
        if let Some(n) = flags.piece_count {
            matched &= analysis.min_piece_count <= n as usize;
        }
    }
    matched
}

/// `--nosetuptags`/`--onlysetuptags`: presence of a `SetUp` tag marks a
/// game starting from a non-standard position, independent of any board
/// replay.
fn matches_setup_tags(game: &Game, flags: &crate::config::FeatureFlags) -> bool {
    let has_setup = game.tags.contains_key("SetUp");
    if flags.no_setup_tags && has_setup {
        return false;
    }
    if flags.only_setup_tags && !has_setup {
        return false;
    }
    true
}

fn annotate(game: &mut Game, annotations: &Annotations, trace: &PositionTrace) {
    if annotations.ply_count {
        game.tags.insert("PlyCount".to_string(), game.ply_count().to_string());
    }
    if annotations.hash_comments || annotations.add_hash_code {
        game.tags
            .insert("HashCode".to_string(), format!("{:016x}", trace.final_hash()));
    }
    if annotations.fen_comments {
        game.tags.insert("FEN".to_string(), trace.final_board().to_string());
    }
}

/// Rewrites the move list per the configured truncation, applied after the
/// match decision but before output. `start_ply` re-roots the main line at
/// a later move; `ply_limit` (and the derived bound from `drop_ply`) then
/// truncates the tail.
fn truncate(game: &mut Game, truncation: &Truncation) {
    let Some(root) = game.root else { return };
    let root = if let Some(start) = truncation.start_ply.filter(|&n| n > 0) {
        game.start_offset += start;
        game.arena.main_line(Some(root)).nth(start).unwrap_or(root)
    } else {
        root
    };
    game.root = Some(root);

    let limit = match (truncation.ply_limit, truncation.drop_ply) {
        (Some(limit), _) => Some(limit),
        (None, Some(drop)) => Some(game.arena.ply_count(Some(root)).saturating_sub(drop)),
        (None, None) => None,
    };
    if let Some(limit) = limit {
        if let Some(keep) = game.arena.main_line(Some(root)).nth(limit.saturating_sub(1)) {
            game.arena.truncate_after(keep);
        }
    }
}
