//! Data source abstraction and its backends.
//!
//! Two fetch modes are exposed:
//! - [`DataSource::fetch_graphs`]: whole entities plus every included relation
//! - [`DataSource::fetch_projected`]: only the fields an [`AuthorRow`] needs,
//!   with filters, ordering and limit evaluated before materialisation
//!
//! Backends:
//! - [`memory::MemoryConnector`]: evaluates descriptors over a [`Dataset`](authors_core::Dataset)
//! - [`sqlite::SqliteConnector`]: renders descriptors to SQL against SQLite
//! - [`outage::FlakyConnector`]: wraps another connector and simulates outages

pub mod memory;
pub mod outage;
pub mod query;
pub mod sqlite;

pub use query::{
    AuthorFilter, AuthorOrder, AuthorQuery, CompiledPlan, CompiledQuery, Include, QueryArgs,
    QueryShape,
};

use crate::error::Result;
use authors_core::types::{
    Author, AuthorId, AuthorResult, Book, BookResult, Publisher, Role, User, UserRole,
};
use authors_core::BooksCountDrift;
use chrono::NaiveDate;

/// Capability interface the strategies query through.
///
/// Every call materialises fresh records; nothing returned is shared with the
/// source or with other calls.
pub trait DataSource {
    /// Whole-entity fetch. Relations outside `query.include` are left empty.
    fn fetch_graphs(&self, query: &AuthorQuery) -> Result<Vec<AuthorGraph>>;

    /// Projected fetch with filters, ordering and limit pushed down.
    fn fetch_projected(&self, query: &AuthorQuery) -> Result<Vec<AuthorRow>>;

    /// Projected fetch through a cached plan with freshly bound values.
    fn fetch_compiled(&self, compiled: &CompiledQuery, args: &QueryArgs)
        -> Result<Vec<AuthorRow>>;

    /// Authors whose cached `books_count` differs from their real book count.
    fn audit_books_count(&self) -> Result<Vec<BooksCountDrift>>;
}

/// Opens scoped connections. Dropping the returned source releases it.
pub trait Connector {
    /// Human-readable backend name for reports.
    fn name(&self) -> &'static str;

    fn connect(&self) -> Result<Box<dyn DataSource>>;
}

// ── Whole-entity records ─────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorGraph {
    pub author: Author,
    pub user: Option<UserGraph>,
    pub books: Vec<BookGraph>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserGraph {
    pub user: User,
    pub roles: Vec<UserRoleGraph>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRoleGraph {
    pub user_role: UserRole,
    pub role: Option<Role>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookGraph {
    pub book: Book,
    pub publisher: Option<Publisher>,
}

// ── Projected records ────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserSummary {
    pub first_name: String,
    pub last_name: String,
    pub user_name: String,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookRow {
    pub name: String,
    pub published: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorRow {
    pub author_id: AuthorId,
    pub age: u32,
    pub country: String,
    pub books_count: u32,
    /// Present when [`Include::USER`] was requested.
    pub user: Option<UserSummary>,
    /// Every book of the author when [`Include::BOOKS`] was requested.
    pub books: Vec<BookRow>,
}

impl AuthorRow {
    /// Projects into the result shape, keeping the books that satisfy `keep`.
    pub fn into_result(self, keep: impl Fn(&BookRow) -> bool) -> AuthorResult {
        let user = self.user.unwrap_or_default();
        let books = self
            .books
            .into_iter()
            .filter(|book| keep(book))
            .map(|book| BookResult::new(book.name, book.published))
            .collect();
        AuthorResult {
            author_id: self.author_id,
            first_name: user.first_name,
            last_name: user.last_name,
            user_name: user.user_name,
            email: user.email,
            age: self.age,
            country: self.country,
            books_count: self.books_count,
            books,
        }
    }
}
