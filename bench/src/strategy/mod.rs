//! The four retrieval strategies.
//!
//! | Strategy             | Fetch                         | Year filter             |
//! |----------------------|-------------------------------|-------------------------|
//! | `naive`              | whole graph, nothing pushed   | sequential, in memory   |
//! | `parallel-projected` | projected, filter/order/limit | parallel per author     |
//! | `pushdown`           | projected + book existence    | while projecting        |
//! | `compiled`           | as parallel-projected, cached | parallel per author     |
//!
//! Every strategy answers with the same [`AuthorResult`] shape so that the
//! [`equivalence`](crate::equivalence) checker can diff them.

mod compiled;
mod naive;
pub mod parallel;
mod pushdown;

pub use compiled::Compiled;
pub use naive::Naive;
pub use parallel::ParallelProjected;
pub use pushdown::Pushdown;

use crate::error::Result;
use crate::source::DataSource;
use authors_core::constants::{DEFAULT_AGE, DEFAULT_COUNTRY, DEFAULT_TOP_N, DEFAULT_YEAR_CUTOFF};
use authors_core::types::AuthorResult;
use chrono::{Datelike, NaiveDate};
use serde::Serialize;

/// Inputs of the benchmarked query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueryParams {
    pub country: String,
    pub age: u32,
    /// Books published in this year or later are dropped from results.
    pub year_cutoff: i32,
    pub top_n: usize,
}

impl Default for QueryParams {
    fn default() -> Self {
        Self {
            country: DEFAULT_COUNTRY.to_string(),
            age: DEFAULT_AGE,
            year_cutoff: DEFAULT_YEAR_CUTOFF,
            top_n: DEFAULT_TOP_N,
        }
    }
}

/// One implementation of the top-N authors query.
///
/// Data source failures are returned as-is, never retried. A query that
/// matches no authors yields an empty list.
pub trait Strategy {
    fn name(&self) -> &'static str;

    fn execute(&self, source: &dyn DataSource, params: &QueryParams) -> Result<Vec<AuthorResult>>;
}

/// All strategies in registration order.
pub fn all_strategies(workers: usize) -> Result<Vec<Box<dyn Strategy>>> {
    Ok(vec![
        Box::new(Naive),
        Box::new(ParallelProjected::new(workers)?),
        Box::new(Pushdown),
        Box::new(Compiled::new(workers)?),
    ])
}

pub(crate) fn published_before(published: NaiveDate, year_cutoff: i32) -> bool {
    published.year() < year_cutoff
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::populate::fixtures;
    use crate::source::memory::MemorySource;
    use authors_core::types::AuthorId;
    use std::sync::Arc;

    fn ids(results: &[AuthorResult]) -> Vec<u32> {
        results.iter().map(|r| r.author_id.get()).collect()
    }

    fn book_counts(results: &[AuthorResult]) -> Vec<usize> {
        results.iter().map(|r| r.books.len()).collect()
    }

    #[test]
    fn registration_order_is_fixed() {
        let names: Vec<_> = all_strategies(2)
            .unwrap()
            .iter()
            .map(|s| s.name())
            .collect();
        assert_eq!(
            names,
            vec!["naive", "parallel-projected", "pushdown", "compiled"]
        );
    }

    #[test]
    fn every_strategy_answers_the_two_author_scenario() {
        let source = MemorySource::new(Arc::new(fixtures::serbian_authors()));
        let params = QueryParams::default();

        for strategy in all_strategies(2).unwrap() {
            let results = strategy.execute(&source, &params).unwrap();
            assert_eq!(
                ids(&results),
                vec![fixtures::AUTHOR_A, fixtures::AUTHOR_B],
                "{}",
                strategy.name()
            );
            assert_eq!(book_counts(&results), vec![2, 3], "{}", strategy.name());
            assert!(results
                .iter()
                .flat_map(|r| &r.books)
                .all(|b| b.published_year < 1900));
        }
    }

    #[test]
    fn pushdown_skips_authors_without_qualifying_books() {
        let source = MemorySource::new(Arc::new(fixtures::ranking_divergence()));
        let params = QueryParams::default();

        let naive = Naive.execute(&source, &params).unwrap();
        assert_eq!(
            ids(&naive),
            vec![fixtures::AUTHOR_PROLIFIC, fixtures::AUTHOR_A]
        );
        assert_eq!(book_counts(&naive), vec![0, 2]);

        let pushdown = Pushdown.execute(&source, &params).unwrap();
        assert_eq!(ids(&pushdown), vec![fixtures::AUTHOR_A, fixtures::AUTHOR_B]);
    }

    #[test]
    fn no_matching_authors_is_an_empty_answer() {
        let source = MemorySource::new(Arc::new(fixtures::serbian_authors()));
        let params = QueryParams {
            country: "Atlantis".to_string(),
            ..QueryParams::default()
        };

        for strategy in all_strategies(2).unwrap() {
            assert!(strategy.execute(&source, &params).unwrap().is_empty());
        }
    }

    #[test]
    fn results_carry_user_fields() {
        let source = MemorySource::new(Arc::new(fixtures::serbian_authors()));
        for strategy in all_strategies(1).unwrap() {
            let results = strategy.execute(&source, &QueryParams::default()).unwrap();
            let a = results
                .iter()
                .find(|r| r.author_id == AuthorId(fixtures::AUTHOR_A))
                .unwrap();
            assert_eq!(a.first_name, "Ana", "{}", strategy.name());
            assert_eq!(a.email, "ana@example.rs", "{}", strategy.name());
            assert_eq!(a.books_count, 5, "{}", strategy.name());
        }
    }
}
