//! Output coordinator: routes matched/duplicate/non-matching games to their
//! sinks, and drives the single-threaded consumer loop that applies
//! duplicate detection to results drained from a [`WorkerPool`]. Duplicate
//! detection runs here rather than in the workers themselves, since it is
//! cross-game state and needs exactly one writer.

use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use indexmap::IndexMap;

use crate::dedup::DuplicateCheck;
use crate::filter::{resolve_duplicates, Decision};
use crate::pgn::{write_game, Game};
use crate::worker::WorkerPool;

/// Anything a game's PGN text can be written to.
pub trait Sink {
    /// # Errors
    ///
    /// Returns an error if the underlying write fails.
    fn write_game(&mut self, text: &str) -> io::Result<()>;

    /// # Errors
    ///
    /// Returns an error if the underlying flush fails.
    fn flush(&mut self) -> io::Result<()>;
}

/// A plain file (or any `Write`) sink: one PGN stream, games appended in
/// submission order.
pub struct FileSink<W: Write>(BufWriter<W>);

impl FileSink<File> {
    /// # Errors
    ///
    /// Returns an error if `path` cannot be opened for writing.
    pub fn create(path: impl AsRef<Path>, append: bool) -> io::Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .append(append)
            .truncate(!append)
            .open(path)?;
        Ok(Self(BufWriter::new(file)))
    }
}

impl<W: Write> FileSink<W> {
    pub fn new(writer: W) -> Self {
        Self(BufWriter::new(writer))
    }
}

impl<W: Write> Sink for FileSink<W> {
    fn write_game(&mut self, text: &str) -> io::Result<()> {
        self.0.write_all(text.as_bytes())?;
        self.0.write_all(b"\n")
    }

    fn flush(&mut self) -> io::Result<()> {
        self.0.flush()
    }
}

/// Collects games in memory and emits them as one JSON array at the end.
/// Each entry is the game's PGN text as a JSON string, not a structured move
/// tree: JSON mode is a batching strategy for the PGN sink, not a distinct
/// move format.
#[derive(Default)]
pub struct JsonBatch {
    games: Vec<String>,
}

impl JsonBatch {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, text: &str) {
        self.games.push(text.to_string());
    }

    /// Serializes the batch into a JSON array of PGN strings.
    #[must_use]
    pub fn finish(self) -> String {
        let mut out = String::from("[\n");
        for (index, game) in self.games.iter().enumerate() {
            if index > 0 {
                out.push_str(",\n");
            }
            out.push_str("  ");
            out.push_str(&json_escape(game));
        }
        out.push_str("\n]\n");
        out
    }
}

fn json_escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('"');
    for ch in text.chars() {
        match ch {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 => out.push_str(&format!("\\u{:04x}", c as u32)),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

/// Rotates to a fresh file every `games_per_file` games, closing the current
/// handle before opening the next.
pub struct SplitWriter {
    base_path: PathBuf,
    games_per_file: usize,
    current: Option<FileSink<File>>,
    count_in_current: usize,
    next_index: usize,
}

impl SplitWriter {
    #[must_use]
    pub fn new(base_path: impl Into<PathBuf>, games_per_file: usize) -> Self {
        Self {
            base_path: base_path.into(),
            games_per_file: games_per_file.max(1),
            current: None,
            count_in_current: 0,
            next_index: 0,
        }
    }

    fn rotated_path(&self) -> PathBuf {
        let stem = self.base_path.file_stem().and_then(|s| s.to_str()).unwrap_or("output");
        let ext = self.base_path.extension().and_then(|s| s.to_str());
        let name = match ext {
            Some(ext) => format!("{stem}.{}.{ext}", self.next_index),
            None => format!("{stem}.{}", self.next_index),
        };
        self.base_path.with_file_name(name)
    }

    fn ensure_open(&mut self) -> io::Result<()> {
        if self.current.is_none() || self.count_in_current >= self.games_per_file {
            if let Some(mut old) = self.current.take() {
                old.flush()?;
            }
            let path = self.rotated_path();
            self.current = Some(FileSink::create(path, false)?);
            self.count_in_current = 0;
            self.next_index += 1;
        }
        Ok(())
    }
}

impl Sink for SplitWriter {
    fn write_game(&mut self, text: &str) -> io::Result<()> {
        self.ensure_open()?;
        self.current.as_mut().expect("ensure_open populates current").write_game(text)?;
        self.count_in_current += 1;
        Ok(())
    }

    fn flush(&mut self) -> io::Result<()> {
        if let Some(current) = self.current.as_mut() {
            current.flush()?;
        }
        Ok(())
    }
}

/// Routes each game to a file keyed by a prefix of its `ECO` tag, with a
/// bounded LRU of open handles. `IndexMap` gives O(1) key lookup while preserving
/// insertion/access order for the LRU sweep; a write to a key with an open
/// handle reuses it and moves it to the back of the order, amortizing the
/// open cost across every write to that key. Eviction closes the handle but
/// keeps the key memory of "already written to", so a later re-access reopens
/// in append mode instead of truncating.
pub struct EcoSplitWriter {
    base_dir: PathBuf,
    key_len: usize,
    max_handles: usize,
    handles: IndexMap<String, FileSink<File>>,
    ever_opened: std::collections::HashSet<String>,
}

impl EcoSplitWriter {
    #[must_use]
    pub fn new(base_dir: impl Into<PathBuf>, key_len: usize, max_handles: usize) -> Self {
        Self {
            base_dir: base_dir.into(),
            key_len: key_len.clamp(1, 3),
            max_handles: max_handles.max(1),
            handles: IndexMap::new(),
            ever_opened: std::collections::HashSet::new(),
        }
    }

    fn key_for(&self, eco: &str) -> String {
        eco.chars().take(self.key_len).collect()
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.base_dir.join(format!("{key}.pgn"))
    }

    /// Writes `text` to the file for `eco`'s truncated key, opening or
    /// reopening a handle as needed and evicting the least-recently-used
    /// handle if `max_handles` would otherwise be exceeded.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing file cannot be opened or written.
    pub fn write_for(&mut self, eco: &str, text: &str) -> io::Result<()> {
        let key = self.key_for(eco);
        if let Some(sink) = self.handles.shift_remove(&key) {
            // Move the accessed key to the back so index 0 stays
            // least-recently-used, reusing the existing handle rather than
            // reopening it.
            self.handles.insert(key.clone(), sink);
        } else {
            if self.handles.len() >= self.max_handles {
                if let Some((_, mut evicted)) = self.handles.shift_remove_index(0) {
                    evicted.flush()?;
                }
            }
            let append = self.ever_opened.contains(&key);
            let sink = FileSink::create(self.path_for(&key), append)?;
            self.handles.insert(key.clone(), sink);
            self.ever_opened.insert(key.clone());
        }
        self.handles
            .get_mut(&key)
            .expect("just inserted")
            .write_game(text)
    }

    /// Flushes and drops every open handle.
    ///
    /// # Errors
    ///
    /// Returns the first flush error encountered, if any.
    pub fn close_all(&mut self) -> io::Result<()> {
        for sink in self.handles.values_mut() {
            sink.flush()?;
        }
        self.handles.clear();
        Ok(())
    }
}

/// Ties together the main sink, duplicate sink, and optional ECO splitter,
/// and decides where a routed game goes.
pub struct OutputCoordinator {
    main: Box<dyn Sink>,
    duplicate: Box<dyn Sink + Send>,
    eco_split: Option<EcoSplitWriter>,
    /// `-n`: emit non-matching games to the main sink instead of matched
    /// ones.
    pub redirect_non_matching: bool,
}

impl OutputCoordinator {
    pub fn new(main: Box<dyn Sink>, duplicate: Box<dyn Sink + Send>) -> Self {
        Self {
            main,
            duplicate,
            eco_split: None,
            redirect_non_matching: false,
        }
    }

    #[must_use]
    pub fn with_eco_split(mut self, splitter: EcoSplitWriter) -> Self {
        self.eco_split = Some(splitter);
        self
    }

    /// Writes `game` to the sink its final `decision` routes it to.
    ///
    /// # Errors
    ///
    /// Returns an error if the chosen sink fails to write.
    pub fn route(&mut self, game: &Game, decision: Decision) -> anyhow::Result<()> {
        let emit_matched = decision == Decision::Matched && !self.redirect_non_matching;
        let emit_non_matching = decision == Decision::NotMatched && self.redirect_non_matching;
        if !(emit_matched || emit_non_matching) {
            return Ok(());
        }
        let text = write_game(game);
        if let (Decision::Matched, Some(splitter)) = (decision, self.eco_split.as_mut()) {
            if let Some(eco) = game.tag("ECO") {
                splitter.write_for(eco, &text)?;
                return Ok(());
            }
        }
        self.main.write_game(&text)?;
        Ok(())
    }

    /// Writes a duplicate game to the duplicate sink, if one was configured
    /// beyond a no-op.
    ///
    /// # Errors
    ///
    /// Returns an error if the duplicate sink fails to write.
    pub fn route_duplicate(&mut self, game: &Game) -> anyhow::Result<()> {
        let text = write_game(game);
        self.duplicate.write_game(&text)?;
        Ok(())
    }

    /// # Errors
    ///
    /// Returns an error if any sink fails to flush.
    pub fn flush(&mut self) -> anyhow::Result<()> {
        self.main.flush()?;
        self.duplicate.flush()?;
        if let Some(splitter) = self.eco_split.as_mut() {
            splitter.close_all()?;
        }
        Ok(())
    }
}

/// A sink that discards everything written to it, used as the default
/// duplicate sink when no `-D` path is configured.
#[derive(Default)]
pub struct NullSink;

impl Sink for NullSink {
    fn write_game(&mut self, _text: &str) -> io::Result<()> {
        Ok(())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Drains every [`crate::worker::ProcessResult`] from `pool`, applying
/// duplicate detection serially and routing each game to `coordinator`. This
/// is the single place all result side effects happen. Results may arrive
/// out of submission order once more than one worker is running; this
/// function does not reorder them, so output order is not guaranteed to
/// match input order.
///
/// # Errors
///
/// Returns the first I/O error from routing a game; the pool is still
/// joined before returning.
pub fn run_consumer(
    mut pool: WorkerPool,
    coordinator: &mut OutputCoordinator,
    config: &crate::config::PipelineConfig,
    same_setup: &mut dyn DuplicateCheck,
    duplicates: &mut dyn DuplicateCheck,
) -> anyhow::Result<PipelineStatsSnapshot> {
    let mut first_error: Option<anyhow::Error> = None;
    let mut matched_count = 0u64;
    let mut duplicate_count = 0u64;
    let mut total_games = 0u64;

    while let Ok(result) = pool.results().recv() {
        total_games += 1;
        let resolved = resolve_duplicates(result.decision, result.keys, config, same_setup, duplicates);
        if resolved == Decision::Matched {
            matched_count += 1;
        }
        let was_downgraded_as_duplicate = result.decision == Decision::Matched && resolved == Decision::SkipOutput;
        if was_downgraded_as_duplicate {
            duplicate_count += 1;
            if let Err(err) = coordinator.route_duplicate(&result.game) {
                first_error.get_or_insert(err);
            }
        } else if let Err(err) = coordinator.route(&result.game, resolved) {
            first_error.get_or_insert(err);
        }

        if let Some(limit) = config.stop_after {
            if matched_count >= limit as u64 {
                pool.stop.set();
            }
        }
    }

    pool.join();
    coordinator.flush()?;
    if let Some(err) = first_error {
        return Err(err);
    }
    Ok(PipelineStatsSnapshot {
        total_games,
        matched_count,
        duplicate_count,
    })
}

/// A final, immutable snapshot of the counters accumulated during a
/// [`run_consumer`] pass, reported in the end-of-run summary.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PipelineStatsSnapshot {
    pub total_games: u64,
    pub matched_count: u64,
    pub duplicate_count: u64,
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::config::CliArgs;
    use crate::dedup::DuplicateDetector;
    use crate::pgn::parse_game;
    use crate::worker::WorkItem;

    fn test_config(workers: usize, stop_after: Option<usize>) -> std::sync::Arc<crate::config::PipelineConfig> {
        std::sync::Arc::new(
            crate::config::PipelineConfig::from_args(CliArgs {
                inputs: vec![],
                output: None,
                append: false,
                duplicates_file: None,
                eco_file: None,
                fixable: false,
                strict: false,
                validate: false,
                suppress_duplicates: true,
                duplicates_only: false,
                check_file: None,
                duplicate_capacity: 0,
                delete_same_setup: false,
                cql_query: None,
                plyrange: None,
                moverange: None,
                selectonly: None,
                skipmatching: None,
                dropply: None,
                startply: None,
                plylimit: None,
                checkmate: false,
                stalemate: false,
                fifty: false,
                seventy_five: false,
                repetition: false,
                repetition5: false,
                insufficient: false,
                underpromotion: false,
                commented: false,
                higherratedwinner: false,
                lowerratedwinner: false,
                piececount: None,
                odds: false,
                nosetuptags: false,
                onlysetuptags: false,
                negate: false,
                plycount: false,
                fencomments: false,
                hashcomments: false,
                addhashcode: false,
                stopafter: stop_after,
                workers,
                quiet: true,
            })
            .unwrap(),
        )
    }

    #[test]
    fn json_batch_escapes_and_wraps_entries() {
        let mut batch = JsonBatch::new();
        batch.push("line one\nline two");
        let out = batch.finish();
        assert!(out.starts_with('['));
        assert!(out.contains("line one\\nline two"));
    }

    #[test]
    fn eco_split_writer_respects_max_handles() {
        let dir = std::env::temp_dir().join(format!("pgnsift-eco-test-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let mut writer = EcoSplitWriter::new(&dir, 1, 2);
        writer.write_for("A00", "game-a").unwrap();
        writer.write_for("B10", "game-b").unwrap();
        writer.write_for("C20", "game-c").unwrap();
        assert!(writer.handles.len() <= 2);
        writer.close_all().unwrap();

        let reopened = std::fs::read_to_string(dir.join("A.pgn")).unwrap();
        assert!(reopened.contains("game-a"));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn eco_split_writer_reuses_a_still_cached_handle() {
        let dir = std::env::temp_dir().join(format!("pgnsift-eco-reuse-test-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let mut writer = EcoSplitWriter::new(&dir, 1, 2);
        writer.write_for("A00", "game-1").unwrap();
        writer.write_for("B10", "game-2").unwrap();
        writer.write_for("A00", "game-3").unwrap();
        assert_eq!(writer.handles.len(), 2);
        writer.close_all().unwrap();

        let contents = std::fs::read_to_string(dir.join("A.pgn")).unwrap();
        assert_eq!(contents, "game-1\ngame-3\n");
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn consumer_resolves_cross_game_duplicates() {
        let config = test_config(2, None);
        let mut pool = WorkerPool::spawn(2, std::sync::Arc::clone(&config), None).unwrap();
        for index in 0..4 {
            let game = parse_game("[Event \"Test\"]\n\n1. e4 e5 *\n").unwrap();
            pool.submit(WorkItem { game, index }).unwrap();
        }
        pool.close();

        let mut coordinator = OutputCoordinator::new(Box::new(FileSink::new(Vec::<u8>::new())), Box::new(NullSink));
        let mut same_setup = DuplicateDetector::new();
        let mut duplicates = DuplicateDetector::new();
        let stats = run_consumer(pool, &mut coordinator, &config, &mut same_setup, &mut duplicates).unwrap();

        assert_eq!(stats.total_games, 4);
        assert_eq!(stats.matched_count, 1);
        assert_eq!(stats.duplicate_count, 3);
    }
}
