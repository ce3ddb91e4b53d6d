use super::{published_before, QueryParams, Strategy};
use crate::error::Result;
use crate::source::{AuthorOrder, AuthorQuery, AuthorRow, DataSource, Include};
use authors_core::types::AuthorResult;
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::sync::{Mutex, PoisonError};

/// Pushes country, age, ordering and limit to the source, loads every book
/// of the selected authors, and drops late books on a worker pool.
pub struct ParallelProjected {
    pool: ThreadPool,
}

impl ParallelProjected {
    pub fn new(workers: usize) -> Result<Self> {
        Ok(Self {
            pool: book_filter_pool(workers)?,
        })
    }
}

impl Strategy for ParallelProjected {
    fn name(&self) -> &'static str {
        "parallel-projected"
    }

    fn execute(&self, source: &dyn DataSource, params: &QueryParams) -> Result<Vec<AuthorResult>> {
        let query = AuthorQuery::new()
            .country(params.country.clone())
            .age(params.age)
            .include(Include::USER | Include::BOOKS)
            .order_by(AuthorOrder::BooksCountDesc)
            .limit(params.top_n);
        let rows = source.fetch_projected(&query)?;
        Ok(filter_books_in_parallel(&self.pool, rows, params.year_cutoff))
    }
}

/// Bounded pool used for per-author book filtering.
pub(crate) fn book_filter_pool(workers: usize) -> Result<ThreadPool> {
    Ok(ThreadPoolBuilder::new()
        .num_threads(workers.max(1))
        .thread_name(|i| format!("book-filter-{i}"))
        .build()?)
}

/// Scatters one task per author onto `pool` and joins the results.
///
/// Tasks append to a shared sink in completion order, tagged with the row's
/// position; the joined list is put back into fetch order before returning.
pub fn filter_books_in_parallel(
    pool: &ThreadPool,
    rows: Vec<AuthorRow>,
    year_cutoff: i32,
) -> Vec<AuthorResult> {
    let sink: Mutex<Vec<(usize, AuthorResult)>> = Mutex::new(Vec::with_capacity(rows.len()));

    pool.scope(|scope| {
        for (position, row) in rows.into_iter().enumerate() {
            let sink = &sink;
            scope.spawn(move |_| {
                let result = row.into_result(|book| published_before(book.published, year_cutoff));
                sink.lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .push((position, result));
            });
        }
    });

    let mut collected = sink.into_inner().unwrap_or_else(PoisonError::into_inner);
    collected.sort_unstable_by_key(|(position, _)| *position);
    collected.into_iter().map(|(_, result)| result).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::populate::fixtures;
    use crate::source::memory::MemorySource;
    use crate::source::{BookRow, DataSource};
    use authors_core::constants::DEFAULT_TOP_N;
    use authors_core::types::AuthorId;
    use chrono::NaiveDate;
    use std::collections::HashSet;
    use std::sync::Arc;

    fn rows(n: usize) -> Vec<AuthorRow> {
        (0..n)
            .map(|i| AuthorRow {
                author_id: AuthorId(i as u32 + 1),
                age: 27,
                country: "Serbia".to_string(),
                books_count: 2,
                user: None,
                books: vec![
                    BookRow {
                        name: format!("old {i}"),
                        published: NaiveDate::from_ymd_opt(1850, 1, 1).unwrap(),
                    },
                    BookRow {
                        name: format!("new {i}"),
                        published: NaiveDate::from_ymd_opt(1950, 1, 1).unwrap(),
                    },
                ],
            })
            .collect()
    }

    #[test]
    fn every_author_lands_exactly_once_in_fetch_order() {
        let pool = book_filter_pool(3).unwrap();
        for n in [0, 1, DEFAULT_TOP_N, DEFAULT_TOP_N + 50] {
            let results = filter_books_in_parallel(&pool, rows(n), 1900);

            assert_eq!(results.len(), n);
            let ids: Vec<u32> = results.iter().map(|r| r.author_id.get()).collect();
            assert_eq!(ids, (1..=n as u32).collect::<Vec<_>>());
            assert_eq!(ids.iter().collect::<HashSet<_>>().len(), n);
            assert!(results.iter().all(|r| r.books.len() == 1));
        }
    }

    #[test]
    fn many_authors_on_small_pool_match_source_order() {
        let n = DEFAULT_TOP_N + 50;
        let source = MemorySource::new(Arc::new(fixtures::many_matching(n)));
        let params = QueryParams {
            top_n: n,
            ..QueryParams::default()
        };

        let strategy = ParallelProjected::new(2).unwrap();
        let results = strategy.execute(&source, &params).unwrap();

        let expected: Vec<_> = source
            .fetch_projected(
                &AuthorQuery::new()
                    .country(params.country.clone())
                    .age(params.age)
                    .order_by(AuthorOrder::BooksCountDesc)
                    .limit(n),
            )
            .unwrap()
            .into_iter()
            .map(|row| row.author_id)
            .collect();
        let actual: Vec<_> = results.iter().map(|r| r.author_id).collect();
        assert_eq!(actual, expected);
        assert!(results
            .iter()
            .all(|r| r.books.len() as u32 == r.books_count));
    }
}
