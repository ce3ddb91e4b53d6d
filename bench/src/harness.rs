//! Benchmark harness: runs each strategy through warm-up and sampled runs,
//! each on a freshly acquired connection, then hands the outputs to the
//! equivalence checker.

use crate::alloc::{self, AllocationMeter};
use crate::equivalence::{EquivalenceChecker, EquivalenceReport, StrategyOutput};
use crate::error::Result;
use crate::report::StrategyReport;
use crate::source::Connector;
use crate::strategy::{QueryParams, Strategy};
use authors_core::types::AuthorResult;
use authors_core::BooksCountDrift;
use std::time::Instant;

pub const DEFAULT_WARMUP_RUNS: usize = 3;
pub const DEFAULT_SAMPLE_RUNS: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Harness {
    pub warmup_runs: usize,
    pub sample_runs: usize,
}

impl Default for Harness {
    fn default() -> Self {
        Self {
            warmup_runs: DEFAULT_WARMUP_RUNS,
            sample_runs: DEFAULT_SAMPLE_RUNS,
        }
    }
}

/// Everything one invocation of [`Harness::run`] produced.
#[derive(Debug, Clone)]
pub struct BenchmarkRun {
    pub backend: String,
    pub params: QueryParams,
    /// One per strategy, in registration order.
    pub reports: Vec<StrategyReport>,
    /// Last successful answer of each strategy. Strategies whose samples all
    /// failed have no entry.
    pub outputs: Vec<StrategyOutput>,
    pub equivalence: EquivalenceReport,
}

impl Harness {
    pub fn new(warmup_runs: usize, sample_runs: usize) -> Self {
        Self {
            warmup_runs,
            sample_runs,
        }
    }

    /// Benchmarks every strategy in order. A failing run is recorded as a
    /// failure sample of its strategy and never aborts the others.
    pub fn run(
        &self,
        connector: &dyn Connector,
        strategies: &[Box<dyn Strategy>],
        params: &QueryParams,
    ) -> BenchmarkRun {
        if !alloc::is_installed() {
            log::warn!("Allocation accounting is not installed; allocated bytes will read 0");
        }

        let mut reports = Vec::with_capacity(strategies.len());
        let mut outputs = Vec::with_capacity(strategies.len());

        for strategy in strategies {
            let (report, output) = self.bench_strategy(connector, strategy.as_ref(), params);
            log::info!(
                "{}: {:.2}ms mean over {} samples, {} failed",
                report.strategy_name,
                report.mean_us() / 1000.0,
                report.sample_count(),
                report.failure_count()
            );
            reports.push(report);
            outputs.extend(output);
        }

        let drift = audit(connector).unwrap_or_else(|e| {
            log::warn!("books_count audit skipped: {e}");
            Vec::new()
        });
        let equivalence = EquivalenceChecker::check(&outputs).with_invariant_audit(drift);

        BenchmarkRun {
            backend: connector.name().to_string(),
            params: params.clone(),
            reports,
            outputs,
            equivalence,
        }
    }

    fn bench_strategy(
        &self,
        connector: &dyn Connector,
        strategy: &dyn Strategy,
        params: &QueryParams,
    ) -> (StrategyReport, Option<StrategyOutput>) {
        let name = strategy.name();
        log::debug!("Benchmarking {name}...");

        for w in 0..self.warmup_runs {
            if let Err(e) = run_once(connector, strategy, params) {
                log::warn!("{name}: warm-up run {w} failed: {e}");
            }
        }

        let mut report = StrategyReport::new(name);
        let mut last = None;
        for s in 0..self.sample_runs {
            let meter = AllocationMeter::start();
            let start = Instant::now();
            let outcome = run_once(connector, strategy, params);
            let elapsed = start.elapsed();
            let allocated = meter.allocated();

            match outcome {
                Ok(results) => {
                    report.add_sample(elapsed, allocated);
                    last = Some(results);
                }
                Err(e) => {
                    log::warn!("{name}: sample run {s} failed: {e}");
                    report.add_failure(elapsed, &e);
                }
            }
        }

        let output = last.map(|results| StrategyOutput {
            strategy: name.to_string(),
            results,
        });
        (report, output)
    }
}

/// One execution on its own connection, released before returning.
fn run_once(
    connector: &dyn Connector,
    strategy: &dyn Strategy,
    params: &QueryParams,
) -> Result<Vec<AuthorResult>> {
    let source = connector.connect()?;
    strategy.execute(source.as_ref(), params)
}

/// Cached `books_count` values that disagree with the stored books.
pub fn audit(connector: &dyn Connector) -> Result<Vec<BooksCountDrift>> {
    let source = connector.connect()?;
    let drift = source.audit_books_count()?;
    for d in &drift {
        log::warn!(
            "{} caches books_count {} but has {} books",
            d.author_id,
            d.cached,
            d.actual
        );
    }
    Ok(drift)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::populate::fixtures;
    use crate::source::memory::MemoryConnector;
    use crate::source::outage::FlakyConnector;
    use crate::strategy::{all_strategies, Naive};
    use std::sync::Arc;

    #[test]
    fn every_run_opens_its_own_connection() {
        let connector = FlakyConnector::new(
            MemoryConnector::new(Arc::new(fixtures::serbian_authors())),
            [],
        );
        let strategies: Vec<Box<dyn Strategy>> = vec![Box::new(Naive)];

        let run = Harness::new(2, 5).run(&connector, &strategies, &QueryParams::default());

        // 2 warm-ups + 5 samples + 1 audit
        assert_eq!(connector.opened(), 8);
        assert_eq!(run.reports[0].sample_count(), 5);
        assert_eq!(run.outputs.len(), 1);
    }

    #[test]
    fn failed_samples_are_recorded_and_do_not_abort() {
        // Connections 0..2 are warm-ups of the first strategy, 2..7 its samples.
        let connector = FlakyConnector::new(
            MemoryConnector::new(Arc::new(fixtures::serbian_authors())),
            [0, 3, 4],
        );
        let strategies = all_strategies(2).unwrap();

        let run = Harness::new(2, 5).run(&connector, &strategies, &QueryParams::default());

        assert_eq!(run.reports.len(), 4);
        assert_eq!(run.reports[0].failure_count(), 2);
        assert_eq!(run.reports[0].sample_count(), 3);
        assert!(run.reports[0].failures[0].error.contains("unavailable"));
        for report in &run.reports[1..] {
            assert_eq!(report.failure_count(), 0, "{}", report.strategy_name);
            assert_eq!(report.sample_count(), 5);
        }
        assert_eq!(run.outputs.len(), 4);
        assert!(run.equivalence.is_equivalent());
    }

    #[test]
    fn strategy_with_only_failures_has_no_output() {
        let connector = FlakyConnector::new(
            MemoryConnector::new(Arc::new(fixtures::serbian_authors())),
            0..3,
        );
        let strategies: Vec<Box<dyn Strategy>> = vec![Box::new(Naive)];

        let run = Harness::new(0, 3).run(&connector, &strategies, &QueryParams::default());

        assert_eq!(run.reports[0].failure_count(), 3);
        assert!(run.outputs.is_empty());
        assert!(run.equivalence.is_equivalent());
    }

    #[test]
    fn stale_books_count_surfaces_as_warning() {
        let dataset = {
            let mut builder = fixtures::serbian_builder();
            builder.stale_books_count(authors_core::types::AuthorId(fixtures::AUTHOR_B), 9);
            builder.build().unwrap()
        };
        let connector = MemoryConnector::new(Arc::new(dataset));
        let strategies: Vec<Box<dyn Strategy>> = vec![Box::new(Naive)];

        let run = Harness::new(0, 1).run(&connector, &strategies, &QueryParams::default());

        assert_eq!(run.equivalence.warnings.len(), 1);
        assert_eq!(run.equivalence.warnings[0].cached, 9);
        assert_eq!(run.equivalence.warnings[0].actual, 3);
    }
}
