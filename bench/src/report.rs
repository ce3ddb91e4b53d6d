//! Report module: per-strategy timing/allocation results, the console report
//! and the JSON rendering of a whole run.

use crate::equivalence::{EquivalenceReport, RankingNote};
use crate::harness::BenchmarkRun;
use serde::Serialize;
use std::time::Duration;

/// One failed sample: how long it took to fail and why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailureSample {
    pub elapsed_micros: u128,
    pub error: String,
}

/// Results from the sampled runs of one strategy.
#[derive(Debug, Clone)]
pub struct StrategyReport {
    pub strategy_name: String,
    pub durations: Vec<Duration>,
    /// Bytes allocated by each successful sample, parallel to `durations`.
    pub allocations: Vec<u64>,
    pub failures: Vec<FailureSample>,
}

/// Aggregate row of the comparison table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StrategySummary {
    pub name: String,
    pub mean_duration_micros: f64,
    pub p95_duration_micros: f64,
    /// Mean bytes allocated per successful sample.
    pub mean_allocated_bytes: u64,
    /// Bytes allocated across all successful samples.
    pub total_allocated_bytes: u64,
    pub sample_count: usize,
    pub failure_count: usize,
}

impl StrategyReport {
    pub fn new(strategy_name: &str) -> Self {
        Self {
            strategy_name: strategy_name.to_string(),
            durations: Vec::new(),
            allocations: Vec::new(),
            failures: Vec::new(),
        }
    }

    pub fn add_sample(&mut self, elapsed: Duration, allocated: u64) {
        self.durations.push(elapsed);
        self.allocations.push(allocated);
    }

    pub fn add_failure(&mut self, elapsed: Duration, error: impl ToString) {
        self.failures.push(FailureSample {
            elapsed_micros: elapsed.as_micros(),
            error: error.to_string(),
        });
    }

    /// Successful samples only.
    pub fn sample_count(&self) -> usize {
        self.durations.len()
    }

    pub fn failure_count(&self) -> usize {
        self.failures.len()
    }

    pub fn mean_us(&self) -> f64 {
        if self.durations.is_empty() {
            return 0.0;
        }
        let sum: f64 = self.durations.iter().map(|d| d.as_secs_f64() * 1e6).sum();
        sum / self.durations.len() as f64
    }

    pub fn percentile_us(&self, pct: f64) -> f64 {
        if self.durations.is_empty() {
            return 0.0;
        }
        let mut sorted: Vec<f64> = self
            .durations
            .iter()
            .map(|d| d.as_secs_f64() * 1e6)
            .collect();
        sorted.sort_by(f64::total_cmp);
        let idx = ((pct / 100.0) * (sorted.len() - 1) as f64).round() as usize;
        sorted[idx.min(sorted.len() - 1)]
    }

    pub fn total_allocated(&self) -> u64 {
        self.allocations.iter().sum()
    }

    pub fn mean_allocated(&self) -> u64 {
        if self.allocations.is_empty() {
            return 0;
        }
        self.total_allocated() / self.allocations.len() as u64
    }

    pub fn summary(&self) -> StrategySummary {
        StrategySummary {
            name: self.strategy_name.clone(),
            mean_duration_micros: self.mean_us(),
            p95_duration_micros: self.percentile_us(95.0),
            mean_allocated_bytes: self.mean_allocated(),
            total_allocated_bytes: self.total_allocated(),
            sample_count: self.sample_count(),
            failure_count: self.failure_count(),
        }
    }
}

/// Print a formatted report comparing strategy results.
pub fn print_report(run: &BenchmarkRun) {
    println!("\n{}", "=".repeat(80));
    println!("  Author Retrieval Strategy Benchmark Report");
    println!(
        "  Backend: {} | {} {} | books before {} | top {}",
        run.backend, run.params.country, run.params.age, run.params.year_cutoff, run.params.top_n
    );
    println!("{}", "=".repeat(80));

    for report in &run.reports {
        let mean = report.mean_us();

        println!("\n  Strategy: {}", report.strategy_name);
        println!("  {}", "-".repeat(60));
        println!(
            "  Mean:            {:>10.0}µs  ({:.2}ms)",
            mean,
            mean / 1000.0
        );
        println!("  p50:             {:>10.0}µs", report.percentile_us(50.0));
        println!("  p95:             {:>10.0}µs", report.percentile_us(95.0));
        println!("  p99:             {:>10.0}µs", report.percentile_us(99.0));
        println!("  Allocated/run:   {:>10} B", report.mean_allocated());
        println!("  Allocated total: {:>10} B", report.total_allocated());
        println!(
            "  Samples:         {:>10} ok, {} failed",
            report.sample_count(),
            report.failure_count()
        );
        if let Some(first) = report.failures.first() {
            println!("  First failure:   {}", first.error);
        }
    }

    println!("\n{}", "=".repeat(80));

    if run.reports.len() >= 2 {
        println!("\n  Comparison Summary:");
        println!(
            "  {:20} {:>12} {:>12} {:>14} {:>8}",
            "Strategy", "Mean (µs)", "p95 (µs)", "Alloc/run (B)", "Failed"
        );
        println!("  {}", "-".repeat(70));

        let mut summaries: Vec<StrategySummary> =
            run.reports.iter().map(StrategyReport::summary).collect();
        summaries.sort_by(|a, b| a.mean_duration_micros.total_cmp(&b.mean_duration_micros));
        for s in &summaries {
            println!(
                "  {:20} {:>12.0} {:>12.0} {:>14} {:>8}",
                s.name,
                s.mean_duration_micros,
                s.p95_duration_micros,
                s.mean_allocated_bytes,
                s.failure_count
            );
        }
    }

    println!();
}

/// Print the equivalence verdict with every mismatch, warning and note.
pub fn print_equivalence(report: &EquivalenceReport) {
    println!("  Equivalence:");
    if report.is_equivalent() {
        println!("    all strategies agree with the reference");
    } else {
        for m in &report.mismatches {
            match m.author_id {
                Some(id) => println!("    [{}] {} {}: {}", m.pair, m.kind, id, m.detail),
                None => println!("    [{}] {}: {}", m.pair, m.kind, m.detail),
            }
        }
    }

    if !report.warnings.is_empty() {
        println!("\n  Cached books_count drift (rankings are unreliable):");
        for w in &report.warnings {
            println!("    {}: cached {}, actual {}", w.author_id, w.cached, w.actual);
        }
    }

    if !report.ranking_notes.is_empty() {
        println!("\n  Ranking notes (total vs. qualifying book count):");
        for note in &report.ranking_notes {
            println!("    {}", describe_note(note));
        }
    }

    println!();
}

fn describe_note(note: &RankingNote) -> String {
    format!(
        "{}: {} ({} books, {} before cutoff) ranks above {} ({} books, {} before cutoff)",
        note.strategy,
        note.higher,
        note.higher_books_count,
        note.higher_qualifying,
        note.lower,
        note.lower_books_count,
        note.lower_qualifying
    )
}

#[derive(Serialize)]
struct JsonRun<'a> {
    backend: &'a str,
    params: &'a crate::strategy::QueryParams,
    strategies: Vec<StrategySummary>,
    failures: Vec<(&'a str, &'a [FailureSample])>,
    equivalence: &'a EquivalenceReport,
}

/// Machine-readable form of a run: summaries, failure samples and the
/// equivalence report. Raw per-strategy results are left out.
pub fn to_json(run: &BenchmarkRun) -> serde_json::Result<String> {
    let json = JsonRun {
        backend: &run.backend,
        params: &run.params,
        strategies: run.reports.iter().map(StrategyReport::summary).collect(),
        failures: run
            .reports
            .iter()
            .filter(|r| !r.failures.is_empty())
            .map(|r| (r.strategy_name.as_str(), r.failures.as_slice()))
            .collect(),
        equivalence: &run.equivalence,
    };
    serde_json::to_string_pretty(&json)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report_with(micros: &[u64]) -> StrategyReport {
        let mut report = StrategyReport::new("naive");
        for &us in micros {
            report.add_sample(Duration::from_micros(us), us * 10);
        }
        report
    }

    #[test]
    fn empty_report_reads_zero() {
        let report = StrategyReport::new("naive");
        assert_eq!(report.mean_us(), 0.0);
        assert_eq!(report.percentile_us(95.0), 0.0);
        assert_eq!(report.mean_allocated(), 0);
    }

    #[test]
    fn mean_and_percentiles() {
        let report = report_with(&[100, 300, 200, 400, 500]);
        assert!((report.mean_us() - 300.0).abs() < 1e-6);
        assert!((report.percentile_us(50.0) - 300.0).abs() < 1e-6);
        assert!((report.percentile_us(100.0) - 500.0).abs() < 1e-6);
        assert_eq!(report.mean_allocated(), 3000);

        let summary = report.summary();
        assert_eq!(summary.mean_allocated_bytes, 3000);
        assert_eq!(summary.total_allocated_bytes, 15000);
    }

    #[test]
    fn failures_do_not_count_as_samples() {
        let mut report = report_with(&[100]);
        report.add_failure(Duration::from_micros(5), "data source unavailable: down");

        let summary = report.summary();
        assert_eq!(summary.sample_count, 1);
        assert_eq!(summary.failure_count, 1);
        assert!((summary.mean_duration_micros - 100.0).abs() < 1e-6);
        assert_eq!(report.failures[0].elapsed_micros, 5);
    }
}
