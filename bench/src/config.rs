//! Runner configuration, read from `BENCH_*` environment variables (a `.env`
//! file is loaded first when present).

use crate::error::{Error, Result};
use crate::harness::{DEFAULT_WARMUP_RUNS, DEFAULT_SAMPLE_RUNS};
use crate::populate::DEFAULT_SEED;
use crate::strategy::QueryParams;
use log::LevelFilter;
use std::str::FromStr;

pub const DEFAULT_WORKERS: usize = 4;
pub const DEFAULT_AUTHORS: usize = 2000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Sqlite,
    Memory,
}

impl FromStr for Backend {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sqlite" => Ok(Self::Sqlite),
            "memory" => Ok(Self::Memory),
            other => Err(format!("unknown backend `{other}` (expected sqlite or memory)")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            other => Err(format!("unknown format `{other}` (expected text or json)")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BenchConfig {
    pub warmup_runs: usize,
    pub sample_runs: usize,
    pub query: QueryParams,
    /// Size of the book-filtering worker pool.
    pub workers: usize,
    /// Authors in the generated catalogue.
    pub authors: usize,
    pub seed: u64,
    pub backend: Backend,
    /// SQLite URI or path of an existing catalogue. When set, nothing is
    /// generated.
    pub database: Option<String>,
    pub log_level: LevelFilter,
    pub log_file: Option<String>,
    pub format: OutputFormat,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            warmup_runs: DEFAULT_WARMUP_RUNS,
            sample_runs: DEFAULT_SAMPLE_RUNS,
            query: QueryParams::default(),
            workers: DEFAULT_WORKERS,
            authors: DEFAULT_AUTHORS,
            seed: DEFAULT_SEED,
            backend: Backend::Sqlite,
            database: None,
            log_level: LevelFilter::Info,
            log_file: None,
            format: OutputFormat::Text,
        }
    }
}

impl BenchConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from `lookup`; unset keys keep their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();
        let query = QueryParams {
            country: lookup("BENCH_COUNTRY").unwrap_or(defaults.query.country),
            age: parse(&lookup, "BENCH_AGE")?.unwrap_or(defaults.query.age),
            year_cutoff: parse(&lookup, "BENCH_YEAR_CUTOFF")?.unwrap_or(defaults.query.year_cutoff),
            top_n: parse(&lookup, "BENCH_TOP_N")?.unwrap_or(defaults.query.top_n),
        };

        let config = Self {
            warmup_runs: parse(&lookup, "BENCH_WARMUP_RUNS")?.unwrap_or(defaults.warmup_runs),
            sample_runs: parse(&lookup, "BENCH_SAMPLE_RUNS")?.unwrap_or(defaults.sample_runs),
            query,
            workers: parse(&lookup, "BENCH_WORKERS")?.unwrap_or(defaults.workers),
            authors: parse(&lookup, "BENCH_AUTHORS")?.unwrap_or(defaults.authors),
            seed: parse(&lookup, "BENCH_SEED")?.unwrap_or(defaults.seed),
            backend: parse(&lookup, "BENCH_BACKEND")?.unwrap_or(defaults.backend),
            database: lookup("BENCH_DATABASE").filter(|s| !s.is_empty()),
            log_level: parse(&lookup, "BENCH_LOG_LEVEL")?.unwrap_or(defaults.log_level),
            log_file: lookup("BENCH_LOG_FILE").filter(|s| !s.is_empty()),
            format: parse(&lookup, "BENCH_FORMAT")?.unwrap_or(defaults.format),
        };

        if config.workers == 0 {
            return Err(invalid("BENCH_WORKERS", "must be at least 1"));
        }
        if config.sample_runs == 0 {
            return Err(invalid("BENCH_SAMPLE_RUNS", "must be at least 1"));
        }
        if config.database.is_some() && config.backend == Backend::Memory {
            return Err(invalid("BENCH_DATABASE", "requires the sqlite backend"));
        }
        Ok(config)
    }
}

fn parse<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: ToString,
{
    lookup(key)
        .map(|raw| raw.trim().parse::<T>().map_err(|e| invalid(key, e)))
        .transpose()
}

fn invalid(key: &str, reason: impl ToString) -> Error {
    Error::Config {
        key: key.to_string(),
        reason: reason.to_string(),
    }
}
