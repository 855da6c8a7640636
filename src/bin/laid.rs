//! Command-line entry point: load a dataset container, preprocess it, run
//! the greedy cover engine across `--threads` worker threads, and print the
//! selected attributes.

use std::path::PathBuf;
use std::process::exit;

use peak_alloc::PeakAlloc;
use structopt::StructOpt;

use laid::comm::{SingleProcessCommunicator, ThreadCommunicator};
use laid::dataset::Dataset;
use laid::engine::{self, PairWindow};
use laid::error::LaidError;
use laid::pairs;
use laid::preprocess::{self, JnsqEncoding};
use laid::source::BinaryFileSource;

#[global_allocator]
static PEAK_ALLOC: PeakAlloc = PeakAlloc;

#[derive(Debug, StructOpt)]
#[structopt(
    name = "laid",
    about = "Greedy set-cover feature selection over a bit-packed disjoint matrix"
)]
struct Args {
    /// Path to the dataset container.
    #[structopt(short, long)]
    file: PathBuf,

    /// Name of the dataset inside the container.
    #[structopt(short, long, default_value = "dataset")]
    dataset: String,

    /// Number of worker threads. Defaults to the number of logical cores.
    #[structopt(short = "T", long)]
    threads: Option<usize>,

    /// How the JNSQ inconsistency counter is encoded.
    #[structopt(long, default_value = "invert")]
    jnsq_encoding: JnsqEncoding,

    /// Increase log verbosity (-v, -vv, -vvv).
    #[structopt(short, long, parse(from_occurrences))]
    verbose: u8,

    /// Silence everything but errors.
    #[structopt(short, long)]
    quiet: bool,
}

fn main() {
    let args = Args::from_args();
    init_logging(args.verbose, args.quiet);

    if let Err(err) = run(args) {
        log::error!("{err}");
        exit(1);
    }
}

fn run(args: Args) -> Result<(), LaidError> {
    let mut source = BinaryFileSource::open(&args.file, &args.dataset)?;

    let mut dataset = Dataset::init();
    dataset.read_attributes(&mut source)?;
    dataset.read_rows(&mut source)?;
    log::info!(
        "loaded {} observations, {} attributes, {} classes",
        dataset.n_observations,
        dataset.n_attributes,
        dataset.n_classes
    );

    let report = preprocess::preprocess(&mut dataset, args.jnsq_encoding)?;
    log::info!(
        "preprocessed: removed {} duplicate row(s), jnsq field is {} bit(s) wide (max run {})",
        report.duplicates_removed,
        report.jnsq_bits,
        report.max_jnsq
    );

    let threads = args.threads.unwrap_or_else(num_cpus::get).max(1);
    let total_pairs = pairs::total_pairs(&dataset.class_index);
    log::info!("{total_pairs} inter-class pairs split across {threads} worker thread(s)");

    let selected = solve(&dataset, total_pairs, threads)?;

    let rendered = selected
        .iter()
        .map(|a| a.to_string())
        .collect::<Vec<_>>()
        .join(" ");
    println!("Solution: {{ {rendered} }}");
    log::debug!("peak RSS estimate: {:.2} MB", PEAK_ALLOC.peak_usage_as_mb());
    Ok(())
}

fn solve(dataset: &Dataset, total_pairs: u64, threads: usize) -> Result<Vec<usize>, LaidError> {
    if threads == 1 {
        let comm = SingleProcessCommunicator;
        return engine::run(
            dataset,
            &comm,
            PairWindow {
                start: 0,
                len: total_pairs,
            },
        );
    }

    let comms = ThreadCommunicator::group(threads);
    let results: Vec<Result<Vec<usize>, LaidError>> = std::thread::scope(|scope| {
        let handles: Vec<_> = comms
            .into_iter()
            .enumerate()
            .map(|(rank, comm)| {
                let dataset = &*dataset;
                scope.spawn(move || {
                    let window = engine::partition(total_pairs, threads, rank);
                    engine::run(dataset, &comm, window)
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().expect("worker thread panicked"))
            .collect()
    });

    // Every worker computes and returns the same globally selected set; any
    // one of them (rank 0, first in the vec) is the answer.
    results.into_iter().next().expect("at least one worker")
}

fn init_logging(verbose: u8, quiet: bool) {
    let level = if quiet {
        log::LevelFilter::Error
    } else {
        match verbose {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            2 => log::LevelFilter::Debug,
            _ => log::LevelFilter::Trace,
        }
    };

    let mut builder = env_logger::Builder::new();
    builder.filter_level(level);
    builder.parse_env("RUST_LOG");
    builder.init();
}
