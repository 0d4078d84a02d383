//! Filter pipeline and per-game move-feature analysis.

pub mod analysis;
pub mod pipeline;

pub use analysis::{analyze, GameAnalysis};
pub use pipeline::{resolve_duplicates, DedupKeys, Decision, FilterPipeline};
