//! `pgnsift` binary: wires the library's pipeline stages together behind
//! the CLI surface [`pgnsift::config::CliArgs`] exposes.

use std::fs::File;
use std::io::{self, BufReader, Read};
use std::sync::mpsc::SyncSender;
use std::sync::Arc;
use std::thread;

use clap::Parser;
use pgnsift::config::{CliArgs, PipelineConfig};
use pgnsift::dedup::{BoundedDuplicateDetector, DuplicateDetector};
use pgnsift::eco::EcoBook;
use pgnsift::output::{FileSink, NullSink, OutputCoordinator};
use pgnsift::pgn::GameStream;
use pgnsift::worker::{StopFlag, WorkItem, WorkerPool};

fn main() {
    if let Err(err) = run() {
        eprintln!("pgnsift: {err:#}");
        std::process::exit(1);
    }
}

fn run() -> anyhow::Result<()> {
    let args = CliArgs::parse();
    let config = Arc::new(PipelineConfig::from_args(args)?);

    let eco_book = config
        .eco_file
        .as_ref()
        .map(|path| -> anyhow::Result<Arc<EcoBook>> {
            let text = std::fs::read_to_string(path)?;
            Ok(Arc::new(EcoBook::build(&text)?))
        })
        .transpose()?;

    let mut duplicates = BoundedDuplicateDetector::new(config.duplicate_capacity);
    if let Some(check_file) = config.check_file.as_ref() {
        warm_duplicate_detector(&mut duplicates, check_file)?;
    }
    let mut same_setup = DuplicateDetector::new();

    let main_sink: Box<dyn pgnsift::output::Sink> = match config.output.as_ref() {
        Some(path) => Box::new(FileSink::create(path, config.append)?),
        None => Box::new(FileSink::new(io::stdout())),
    };
    let duplicate_sink: Box<dyn pgnsift::output::Sink + Send> = match config.duplicates_file.as_ref() {
        Some(path) => Box::new(FileSink::create(path, false)?),
        None => Box::new(NullSink),
    };
    let mut coordinator = OutputCoordinator::new(main_sink, duplicate_sink);
    coordinator.redirect_non_matching = false;

    let mut pool = WorkerPool::spawn(config.workers, Arc::clone(&config), eco_book)?;
    let work_tx = pool.take_sender().expect("pool was just spawned");
    let stop = Arc::clone(&pool.stop);
    let submit_config = Arc::clone(&config);
    let submitter = thread::spawn(move || submit_inputs(&submit_config, &work_tx, &stop));

    // Dropping `pool`'s own clone of the sender happened above via
    // `take_sender`; the channel now closes only once the submitter thread
    // above finishes and drops `work_tx`, letting the consumer below run
    // concurrently with submission instead of after it.
    let stats = pgnsift::output::run_consumer(pool, &mut coordinator, &config, &mut same_setup, &mut duplicates)?;

    match submitter.join() {
        Ok(result) => result?,
        Err(_) => anyhow::bail!("submission thread panicked"),
    }

    if !config.quiet {
        println!(
            "{} games processed, {} matched, {} duplicates",
            stats.total_games, stats.matched_count, stats.duplicate_count
        );
    }
    Ok(())
}

fn warm_duplicate_detector(detector: &mut BoundedDuplicateDetector, path: &std::path::Path) -> anyhow::Result<()> {
    let text = std::fs::read_to_string(path)?;
    for game in GameStream::new(text.as_bytes()) {
        let Ok(initial) = game.initial_board() else { continue };
        let trace = pgnsift::replay::replay_main_line(initial, &game.arena, game.root);
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        use std::hash::{Hash, Hasher};
        for key in ["White", "Black", "Date", "Round"] {
            game.tag(key).unwrap_or_default().hash(&mut hasher);
        }
        let _ = detector.check_and_add(trace.final_hash(), trace.cumulative_hash(), hasher.finish());
    }
    Ok(())
}

/// Reads every configured input and submits each game for processing, on
/// whatever thread this runs on. Kept separate from the result-draining
/// consumer so the two run concurrently: submission alone would otherwise
/// have to finish (potentially buffering a whole large input in the bounded
/// work channel's backlog) before any output could happen, and `stopAfter`
/// would never be observable here since only the consumer sets it.
fn submit_inputs(config: &PipelineConfig, work_tx: &SyncSender<WorkItem>, stop: &StopFlag) -> anyhow::Result<()> {
    let mut position = 0usize;
    if config.inputs.is_empty() {
        let mut text = String::new();
        io::stdin().lock().read_to_string(&mut text)?;
        submit_stream(GameStream::new(text.as_bytes()), config, work_tx, stop, &mut position)?;
        return Ok(());
    }
    for path in &config.inputs {
        if stop.is_set() {
            break;
        }
        if path.as_os_str() == "-" {
            let mut text = String::new();
            io::stdin().lock().read_to_string(&mut text)?;
            submit_stream(GameStream::new(text.as_bytes()), config, work_tx, stop, &mut position)?;
        } else {
            let reader = BufReader::new(File::open(path)?);
            submit_stream(GameStream::new(reader), config, work_tx, stop, &mut position)?;
        }
    }
    Ok(())
}

fn submit_stream<R: io::BufRead>(
    stream: GameStream<R>,
    config: &PipelineConfig,
    work_tx: &SyncSender<WorkItem>,
    stop: &StopFlag,
    position: &mut usize,
) -> anyhow::Result<()> {
    for game in stream {
        if stop.is_set() {
            break;
        }
        let index = *position;
        *position += 1;
        if !config.select_only.is_empty() && !config.select_only.contains(index) {
            continue;
        }
        if config.skip_matching.contains(index) {
            continue;
        }
        if work_tx.send(WorkItem { game, index }).is_err() {
            break;
        }
    }
    Ok(())
}
