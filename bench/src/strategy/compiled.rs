use super::parallel::{book_filter_pool, filter_books_in_parallel};
use super::{QueryParams, Strategy};
use crate::error::Result;
use crate::source::{AuthorOrder, AuthorQuery, CompiledQuery, DataSource, Include, QueryArgs};
use authors_core::constants::{DEFAULT_AGE, DEFAULT_COUNTRY, DEFAULT_TOP_N};
use authors_core::types::AuthorResult;
use rayon::ThreadPool;

/// [`ParallelProjected`](super::ParallelProjected) with the descriptor compiled
/// once at construction and only its values bound per call.
pub struct Compiled {
    query: CompiledQuery,
    pool: ThreadPool,
}

impl Compiled {
    pub fn new(workers: usize) -> Result<Self> {
        let template = AuthorQuery::new()
            .country(DEFAULT_COUNTRY)
            .age(DEFAULT_AGE)
            .include(Include::USER | Include::BOOKS)
            .order_by(AuthorOrder::BooksCountDesc)
            .limit(DEFAULT_TOP_N);

        Ok(Self {
            query: CompiledQuery::compile(&template),
            pool: book_filter_pool(workers)?,
        })
    }

    pub fn compiled_query(&self) -> &CompiledQuery {
        &self.query
    }
}

impl Strategy for Compiled {
    fn name(&self) -> &'static str {
        "compiled"
    }

    fn execute(&self, source: &dyn DataSource, params: &QueryParams) -> Result<Vec<AuthorResult>> {
        let args = QueryArgs {
            country: Some(params.country.clone()),
            age: Some(params.age),
            has_book_published_before: None,
            limit: Some(params.top_n),
        };
        let rows = source.fetch_compiled(&self.query, &args)?;
        Ok(filter_books_in_parallel(&self.pool, rows, params.year_cutoff))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::populate::fixtures;
    use crate::source::memory::MemorySource;
    use std::sync::Arc;

    #[test]
    fn reruns_with_new_parameters_do_not_reuse_old_values() {
        let source = MemorySource::new(Arc::new(fixtures::serbian_authors()));
        let strategy = Compiled::new(2).unwrap();

        let serbia = strategy.execute(&source, &QueryParams::default()).unwrap();
        let norway = strategy
            .execute(
                &source,
                &QueryParams {
                    country: "Norway".to_string(),
                    ..QueryParams::default()
                },
            )
            .unwrap();
        let older = strategy
            .execute(
                &source,
                &QueryParams {
                    age: 30,
                    top_n: 5,
                    ..QueryParams::default()
                },
            )
            .unwrap();

        assert_eq!(serbia.len(), 2);
        assert_eq!(norway.len(), 1);
        assert_eq!(norway[0].author_id.get(), fixtures::AUTHOR_ABROAD);
        assert_eq!(older.len(), 1);
        assert_eq!(older[0].author_id.get(), fixtures::AUTHOR_OLDER);
        assert_eq!(older[0].books.len(), 9);
        assert_eq!(strategy.compiled_query().translations(), 1);
    }
}
