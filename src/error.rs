//! Structured error kinds for the pieces of the pipeline where callers need to
//! distinguish failure modes, layered under [`anyhow::Error`] so call sites
//! that don't care can keep using `?` and `.context(...)`.

use thiserror::Error;

/// A recoverable or fatal error raised by some stage of the pipeline.
///
/// Fatal kinds ([`Self::Configuration`], [`Self::CqlSyntax`],
/// [`Self::EcoLoad`]) terminate the process at startup. The rest are
/// attached to a single game and do not abort the run.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Unknown flag, malformed range, or unreadable input path.
    #[error("configuration error: {0}")]
    Configuration(String),
    /// A PGN game failed to parse; the game is skipped, parsing resumes at
    /// the next plausible game boundary.
    #[error("game {game_index}: parse error at {position}: {kind}")]
    PgnParse {
        /// Zero-based index of the game within the input stream.
        game_index: usize,
        /// Character offset (or line:column, format left to the caller).
        position: String,
        /// Human-readable description of what went wrong.
        kind: String,
    },
    /// A FEN string failed to parse.
    #[error("FEN syntax error in field {field}: {reason}")]
    FenSyntax {
        /// Which of the six FEN fields was invalid.
        field: &'static str,
        /// Why it was rejected.
        reason: String,
    },
    /// A SAN token did not correspond to any legal move at that ply.
    #[error("illegal move at ply {ply}: {text}")]
    IllegalMove {
        /// Ply (half-move) number, 1-based, on which the move was attempted.
        ply: usize,
        /// The SAN text that failed to resolve.
        text: String,
    },
    /// The CQL query failed to parse; this is fatal because the query is a
    /// program, not user data.
    #[error("CQL syntax error at position {0}")]
    CqlSyntax(usize),
    /// The ECO opening book failed to load.
    #[error("failed to load ECO book: {0}")]
    EcoLoad(String),
}
