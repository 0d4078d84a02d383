//! Worker pool: `numWorkers` threads pull games off one shared bounded work
//! channel, run the filter pipeline, and push results onto one shared,
//! equally bounded result channel for a single-threaded consumer to act on.
//! Both channels are bounded so a fast producer or a fast set of workers
//! back-pressures instead of buffering an unbounded number of in-flight
//! `Game`s in memory.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, SyncSender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crate::config::PipelineConfig;
use crate::eco::EcoBook;
use crate::filter::{DedupKeys, Decision, FilterPipeline};
use crate::pgn::Game;

/// One unit of work: a parsed game and its position in the input stream.
pub struct WorkItem {
    pub game: Game,
    pub index: usize,
}

/// What a worker reports back after running the pipeline on one game.
///
/// `decision` reflects every stage except duplicate detection: workers
/// hold no detector state. A single-threaded consumer finishes the call by
/// passing `keys` through [`crate::filter::resolve_duplicates`], which may
/// still downgrade a `Matched` result to `SkipOutput`.
pub struct ProcessResult {
    pub game: Game,
    pub index: usize,
    pub decision: Decision,
    pub keys: DedupKeys,
}

/// Process-wide atomic counters shared by every worker and the consumer.
#[derive(Default)]
pub struct PipelineStats {
    pub matched_count: AtomicUsize,
    pub duplicate_count: AtomicUsize,
    pub total_games: AtomicUsize,
}

/// Cooperative stop flag: `stopAfter` and external cancellation both set
/// this, and workers short-circuit to a no-op drain rather than exiting
/// abruptly.
#[derive(Default)]
pub struct StopFlag(AtomicBool);

impl StopFlag {
    #[must_use]
    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    pub fn set(&self) {
        self.0.store(true, Ordering::Release);
    }
}

/// Owns the worker threads and the channels connecting them to the
/// submitter and the consumer.
pub struct WorkerPool {
    work_tx: Option<SyncSender<WorkItem>>,
    result_rx: Receiver<ProcessResult>,
    handles: Vec<JoinHandle<()>>,
    pub stats: Arc<PipelineStats>,
    pub stop: Arc<StopFlag>,
}

impl WorkerPool {
    /// Spawns `num_workers` threads, each running an independent
    /// [`FilterPipeline`] compiled from `config` (cheap: just the parsed
    /// CQL AST, so no sharing is needed across threads).
    ///
    /// # Errors
    ///
    /// Propagates a CQL compile failure; this is a fatal startup error.
    pub fn spawn(
        num_workers: usize,
        config: Arc<PipelineConfig>,
        eco_book: Option<Arc<EcoBook>>,
    ) -> anyhow::Result<Self> {
        let num_workers = num_workers.max(1);
        let (work_tx, work_rx) = mpsc::sync_channel::<WorkItem>(num_workers * 4);
        let (result_tx, result_rx) = mpsc::sync_channel::<ProcessResult>(num_workers * 4);
        let work_rx = Arc::new(std::sync::Mutex::new(work_rx));
        let stats = Arc::new(PipelineStats::default());
        let stop = Arc::new(StopFlag::default());

        let mut handles = Vec::with_capacity(num_workers);
        for _ in 0..num_workers {
            let pipeline = FilterPipeline::new(&config)?;
            let work_rx = Arc::clone(&work_rx);
            let result_tx = result_tx.clone();
            let config = Arc::clone(&config);
            let eco_book = eco_book.clone();
            let stop = Arc::clone(&stop);
            handles.push(thread::spawn(move || {
                worker_loop(&pipeline, &config, eco_book.as_deref(), &work_rx, &result_tx, &stop);
            }));
        }
        drop(result_tx);

        Ok(Self {
            work_tx: Some(work_tx),
            result_rx,
            handles,
            stats,
            stop,
        })
    }

    /// Blocking submit; back-pressures the caller (the PGN parser) once the
    /// bounded work channel is full.
    ///
    /// # Errors
    ///
    /// Returns an error if every worker has already exited.
    pub fn submit(&self, item: WorkItem) -> anyhow::Result<()> {
        self.work_tx
            .as_ref()
            .expect("submit called after close")
            .send(item)
            .map_err(|_| anyhow::anyhow!("worker pool closed"))
    }

    /// Non-blocking submit variant.
    pub fn try_submit(&self, item: WorkItem) -> Result<(), WorkItem> {
        match self.work_tx.as_ref().expect("try_submit called after close").try_send(item) {
            Ok(()) => Ok(()),
            Err(mpsc::TrySendError::Full(item) | mpsc::TrySendError::Disconnected(item)) => Err(item),
        }
    }

    /// Closes the work channel (no more submissions) without waiting for
    /// workers to finish; pair with draining [`Self::results`] and
    /// [`Self::join`].
    pub fn close(&mut self) {
        self.work_tx = None;
    }

    /// Takes ownership of the submission handle so it can be moved onto a
    /// dedicated submitter thread running concurrently with a consumer that
    /// owns `self`. Submission continues until the returned sender is
    /// dropped (the thread's loop ending has the same effect as
    /// [`Self::close`]). Returns `None` if [`Self::close`] (or a prior call
    /// to this method) already consumed the handle.
    pub fn take_sender(&mut self) -> Option<SyncSender<WorkItem>> {
        self.work_tx.take()
    }

    /// Iterates every [`ProcessResult`] until every worker has exited and
    /// the result channel is drained: graceful shutdown is [`Self::close`]
    /// followed by a result-channel drain.
    pub fn results(&self) -> &Receiver<ProcessResult> {
        &self.result_rx
    }

    /// Joins every worker thread. Call after [`Self::close`] and draining
    /// [`Self::results`].
    pub fn join(mut self) {
        for handle in self.handles.drain(..) {
            let _ = handle.join();
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn worker_loop(
    pipeline: &FilterPipeline,
    config: &PipelineConfig,
    eco_book: Option<&EcoBook>,
    work_rx: &Arc<std::sync::Mutex<Receiver<WorkItem>>>,
    result_tx: &SyncSender<ProcessResult>,
    stop: &StopFlag,
) {
    loop {
        let item = {
            let rx = work_rx.lock().expect("work channel mutex poisoned");
            rx.recv()
        };
        let Ok(item) = item else { break };
        if stop.is_set() {
            continue;
        }
        let mut game = item.game;
        let (decision, keys) = pipeline.process(&mut game, config, eco_book);
        if result_tx
            .send(ProcessResult {
                game,
                index: item.index,
                decision,
                keys,
            })
            .is_err()
        {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::config::CliArgs;
    use crate::pgn::parse_game;

    fn test_config() -> Arc<PipelineConfig> {
        Arc::new(
            PipelineConfig::from_args(CliArgs {
                inputs: vec![],
                output: None,
                append: false,
                duplicates_file: None,
                eco_file: None,
                fixable: false,
                strict: false,
                validate: false,
                suppress_duplicates: false,
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
                checkmate: true,
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
                stopafter: None,
                workers: 2,
                quiet: true,
            })
            .unwrap(),
        )
    }

    #[test]
    fn pool_processes_every_submitted_game_exactly_once() {
        let config = test_config();
        let mut pool = WorkerPool::spawn(2, Arc::clone(&config), None).unwrap();

        for index in 0..8 {
            let game = parse_game("[Event \"Test\"]\n\n1. f3 e5 2. g4 Qh4# *\n").unwrap();
            pool.submit(WorkItem { game, index }).unwrap();
        }
        pool.close();

        let mut seen = Vec::new();
        while let Ok(result) = pool.results().recv() {
            seen.push(result.index);
            assert_eq!(result.decision, Decision::Matched);
        }
        pool.join();

        seen.sort_unstable();
        assert_eq!(seen, (0..8).collect::<Vec<_>>());
    }

    #[test]
    fn stop_flag_short_circuits_without_panicking() {
        let config = test_config();
        let mut pool = WorkerPool::spawn(1, Arc::clone(&config), None).unwrap();
        pool.stop.set();
        for index in 0..3 {
            let game = parse_game("[Event \"Test\"]\n\n1. e4 e5 *\n").unwrap();
            pool.submit(WorkItem { game, index }).unwrap();
        }
        pool.close();
        let mut count = 0;
        while pool.results().recv().is_ok() {
            count += 1;
        }
        pool.join();
        assert_eq!(count, 0);
    }
}
