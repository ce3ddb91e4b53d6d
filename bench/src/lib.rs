//! Author Retrieval Strategy Benchmark
//!
//! Answers one query, "the top-N authors from a given country and age, ranked
//! by book count, with each author's books published before a cutoff year",
//! four different ways and compares them:
//!
//! - **naive**: load every author graph, filter and rank in memory
//! - **parallel-projected**: push filter/order/limit to the source, filter
//!   books by year on a worker pool
//! - **pushdown**: also push a "has a book before the cutoff" predicate
//! - **compiled**: parallel-projected with a query plan translated once
//!
//! The [`harness`] times each strategy against a fresh connection per run and
//! the [`equivalence`] checker diffs their outputs.
//!
//! Run benchmarks: `cargo bench`
//! Run tests: `cargo test`

pub mod alloc;
pub mod config;
pub mod equivalence;
pub mod error;
pub mod harness;
pub mod populate;
pub mod report;
pub mod source;
pub mod strategy;

pub use error::{Error, Result};
