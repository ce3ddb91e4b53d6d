//! Standalone benchmark runner that prints the formatted report.
//!
//! Generates a synthetic catalogue (or attaches to `BENCH_DATABASE`), runs
//! every strategy through the harness and prints timings plus the
//! equivalence report. All settings come from `BENCH_*` variables; see
//! [`query_bench::config`].
//!
//! Usage:
//!   cargo run --release
//!   BENCH_BACKEND=memory BENCH_FORMAT=json cargo run --release

use anyhow::Context;
use query_bench::alloc::CountingAllocator;
use query_bench::config::{Backend, BenchConfig, OutputFormat};
use query_bench::harness::Harness;
use query_bench::populate::{generate_synthetic, PopulationParams};
use query_bench::report::{print_equivalence, print_report, to_json};
use query_bench::source::memory::MemoryConnector;
use query_bench::source::sqlite::SqliteConnector;
use query_bench::source::Connector;
use query_bench::strategy::all_strategies;
use std::sync::Arc;

#[global_allocator]
static GLOBAL: CountingAllocator = CountingAllocator;

fn connector_for(config: &BenchConfig) -> anyhow::Result<Box<dyn Connector>> {
    if let Some(uri) = &config.database {
        log::info!("Attaching to existing catalogue at {uri}");
        return Ok(Box::new(SqliteConnector::attach(uri.clone())));
    }

    let params = PopulationParams {
        authors: config.authors,
        seed: config.seed,
        ..PopulationParams::standard()
    };
    let dataset = generate_synthetic(&params).context("generate catalogue")?;
    log::info!(
        "Generated {} authors and {} books (seed {:#x})",
        dataset.author_count(),
        dataset.book_count(),
        params.seed
    );

    Ok(match config.backend {
        Backend::Sqlite => {
            Box::new(SqliteConnector::from_dataset(&dataset).context("load SQLite")?)
        }
        Backend::Memory => Box::new(MemoryConnector::new(Arc::new(dataset))),
    })
}

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = BenchConfig::from_env()?;
    authors_core::initialize_logger(config.log_level, config.log_file.as_deref())?;

    let connector = connector_for(&config)?;
    let strategies = all_strategies(config.workers)?;
    let harness = Harness::new(config.warmup_runs, config.sample_runs);

    if config.format == OutputFormat::Text {
        println!("Running author retrieval strategy benchmark...");
        println!("  Backend:       {}", connector.name());
        println!("  Warmup runs:   {}", harness.warmup_runs);
        println!("  Sample runs:   {}", harness.sample_runs);
        println!("  Workers:       {}", config.workers);
    }

    let run = harness.run(connector.as_ref(), &strategies, &config.query);

    match config.format {
        OutputFormat::Text => {
            print_report(&run);
            print_equivalence(&run.equivalence);
        }
        OutputFormat::Json => println!("{}", to_json(&run)?),
    }

    if !run.equivalence.is_equivalent() {
        log::warn!(
            "Strategies disagree: {} mismatches",
            run.equivalence.mismatches.len()
        );
    }
    Ok(())
}
