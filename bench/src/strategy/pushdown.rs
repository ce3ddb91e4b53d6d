use super::{published_before, QueryParams, Strategy};
use crate::error::Result;
use crate::source::{AuthorOrder, AuthorQuery, DataSource, Include};
use authors_core::types::AuthorResult;

/// Pushes everything the source can evaluate, including "has at least one
/// book before the cutoff", then drops late books while projecting.
///
/// The source still ranks by total `books_count`, so the top N can differ
/// from [`Naive`](super::Naive): an author whose books all came out after the
/// cutoff is skipped here but ranked (with no books) there.
pub struct Pushdown;

impl Strategy for Pushdown {
    fn name(&self) -> &'static str {
        "pushdown"
    }

    fn execute(&self, source: &dyn DataSource, params: &QueryParams) -> Result<Vec<AuthorResult>> {
        let query = AuthorQuery::new()
            .country(params.country.clone())
            .age(params.age)
            .with_book_published_before(params.year_cutoff)
            .include(Include::USER | Include::BOOKS)
            .order_by(AuthorOrder::BooksCountDesc)
            .limit(params.top_n);

        Ok(source
            .fetch_projected(&query)?
            .into_iter()
            .map(|row| row.into_result(|book| published_before(book.published, params.year_cutoff)))
            .collect())
    }
}
