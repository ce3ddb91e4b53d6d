//! Query descriptors handed to a [`DataSource`](super::DataSource).
//!
//! A strategy's cost profile is visible in the descriptor it builds: which
//! relations it asks the source to load ([`Include`]), which predicates it
//! pushes down, and whether ordering and limiting happen at the source.

use crate::error::{Error, Result};
use bitflags::bitflags;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::OnceLock;

bitflags! {
    /// Related entities loaded alongside each author.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Include: u8 {
        /// the owning user (names, email, audit fields)
        const USER = 1 << 0;
        /// the user's role join rows; implies USER
        const USER_ROLES = 1 << 1;
        /// the role behind each join row; implies USER_ROLES
        const ROLES = 1 << 2;
        /// every book of the author
        const BOOKS = 1 << 3;
        /// the publisher of each book; implies BOOKS
        const PUBLISHER = 1 << 4;
        /// the whole graph
        const ALL = Self::USER.bits()
            | Self::USER_ROLES.bits()
            | Self::ROLES.bits()
            | Self::BOOKS.bits()
            | Self::PUBLISHER.bits();
    }
}

impl Include {
    /// Adds the parent relation of every nested include.
    pub fn with_parents(self) -> Self {
        let mut include = self;
        if include.contains(Self::ROLES) {
            include |= Self::USER_ROLES;
        }
        if include.contains(Self::USER_ROLES) {
            include |= Self::USER;
        }
        if include.contains(Self::PUBLISHER) {
            include |= Self::BOOKS;
        }
        include
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthorOrder {
    /// `books_count` descending, ties broken by ascending author id.
    BooksCountDesc,
}

/// Predicates evaluated against authors at the source.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthorFilter {
    pub country: Option<String>,
    pub age: Option<u32>,
    /// Keep only authors with at least one book published before this year.
    pub has_book_published_before: Option<i32>,
}

/// Builder-style descriptor for one author fetch.
///
/// ```
/// use query_bench::source::{AuthorOrder, AuthorQuery, Include};
///
/// let query = AuthorQuery::new()
///     .country("Serbia")
///     .age(27)
///     .include(Include::USER | Include::BOOKS)
///     .order_by(AuthorOrder::BooksCountDesc)
///     .limit(2);
/// assert_eq!(query.limit, Some(2));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorQuery {
    pub filter: AuthorFilter,
    pub include: Include,
    pub order: Option<AuthorOrder>,
    pub limit: Option<usize>,
}

impl Default for AuthorQuery {
    fn default() -> Self {
        Self::new()
    }
}

impl AuthorQuery {
    pub fn new() -> Self {
        Self {
            filter: AuthorFilter::default(),
            include: Include::empty(),
            order: None,
            limit: None,
        }
    }

    pub fn country(mut self, country: impl Into<String>) -> Self {
        self.filter.country = Some(country.into());
        self
    }

    pub fn age(mut self, age: u32) -> Self {
        self.filter.age = Some(age);
        self
    }

    pub fn with_book_published_before(mut self, year: i32) -> Self {
        self.filter.has_book_published_before = Some(year);
        self
    }

    pub fn include(mut self, include: Include) -> Self {
        self.include = (self.include | include).with_parents();
        self
    }

    pub fn order_by(mut self, order: AuthorOrder) -> Self {
        self.order = Some(order);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Which slots this descriptor uses, independent of their values.
    pub fn shape(&self) -> QueryShape {
        QueryShape {
            country: self.filter.country.is_some(),
            age: self.filter.age.is_some(),
            has_book_published_before: self.filter.has_book_published_before.is_some(),
            include: self.include,
            order: self.order,
            limit: self.limit.is_some(),
        }
    }

    /// The values bound to this descriptor's slots.
    pub fn args(&self) -> QueryArgs {
        QueryArgs {
            country: self.filter.country.clone(),
            age: self.filter.age,
            has_book_published_before: self.filter.has_book_published_before,
            limit: self.limit,
        }
    }
}

/// Value-free structure of an [`AuthorQuery`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct QueryShape {
    pub country: bool,
    pub age: bool,
    pub has_book_published_before: bool,
    pub include: Include,
    pub order: Option<AuthorOrder>,
    pub limit: bool,
}

/// Values for a [`QueryShape`]'s slots.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryArgs {
    pub country: Option<String>,
    pub age: Option<u32>,
    pub has_book_published_before: Option<i32>,
    pub limit: Option<usize>,
}

impl QueryArgs {
    /// Checks that every slot of `shape` has a value and no value lacks a slot.
    pub fn check_against(&self, shape: &QueryShape) -> Result<()> {
        check_slot("country", shape.country, self.country.is_some())?;
        check_slot("age", shape.age, self.age.is_some())?;
        check_slot(
            "has_book_published_before",
            shape.has_book_published_before,
            self.has_book_published_before.is_some(),
        )?;
        check_slot("limit", shape.limit, self.limit.is_some())
    }
}

fn check_slot(slot: &'static str, expected: bool, bound: bool) -> Result<()> {
    match (expected, bound) {
        (true, false) => Err(Error::UnboundParameter { slot }),
        (false, true) => Err(Error::UnexpectedParameter { slot }),
        _ => Ok(()),
    }
}

/// Backend-specific executable form of a [`QueryShape`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledPlan {
    pub statements: Vec<String>,
}

/// A query shape translated at most once and reused across invocations.
///
/// Only the shape is captured at compile time; every execution binds fresh
/// [`QueryArgs`], so results never depend on the values of earlier calls.
#[derive(Debug)]
pub struct CompiledQuery {
    shape: QueryShape,
    plan: OnceLock<CompiledPlan>,
    translations: AtomicUsize,
}

impl CompiledQuery {
    pub fn compile(template: &AuthorQuery) -> Self {
        Self {
            shape: template.shape(),
            plan: OnceLock::new(),
            translations: AtomicUsize::new(0),
        }
    }

    pub fn shape(&self) -> &QueryShape {
        &self.shape
    }

    /// Returns the cached plan, running `translate` on first use only.
    pub fn plan_or_translate(
        &self,
        translate: impl FnOnce(&QueryShape) -> CompiledPlan,
    ) -> &CompiledPlan {
        self.plan.get_or_init(|| {
            self.translations.fetch_add(1, Ordering::Relaxed);
            log::debug!("Translating compiled query plan for {:?}", self.shape);
            translate(&self.shape)
        })
    }

    /// How many times a plan has been translated (0 or 1).
    pub fn translations(&self) -> usize {
        self.translations.load(Ordering::Relaxed)
    }

    /// Rebuilds a one-off descriptor from the shape and `args`.
    pub fn bind(&self, args: &QueryArgs) -> Result<AuthorQuery> {
        args.check_against(&self.shape)?;
        Ok(AuthorQuery {
            filter: AuthorFilter {
                country: args.country.clone(),
                age: args.age,
                has_book_published_before: args.has_book_published_before,
            },
            include: self.shape.include,
            order: self.shape.order,
            limit: args.limit,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn template() -> AuthorQuery {
        AuthorQuery::new()
            .country("Serbia")
            .age(27)
            .include(Include::USER | Include::BOOKS)
            .order_by(AuthorOrder::BooksCountDesc)
            .limit(2)
    }

    #[test]
    fn nested_includes_pull_in_parents() {
        let query = AuthorQuery::new().include(Include::ROLES | Include::PUBLISHER);
        assert_eq!(query.include, Include::ALL);
    }

    #[test]
    fn shape_ignores_values() {
        let a = template();
        let b = AuthorQuery::new()
            .country("Norway")
            .age(61)
            .include(Include::USER | Include::BOOKS)
            .order_by(AuthorOrder::BooksCountDesc)
            .limit(10);
        assert_eq!(a.shape(), b.shape());
        assert_ne!(a.args(), b.args());
    }

    #[test]
    fn bind_uses_only_the_new_args() {
        let compiled = CompiledQuery::compile(&template());
        let bound = compiled
            .bind(&QueryArgs {
                country: Some("Norway".to_string()),
                age: Some(40),
                has_book_published_before: None,
                limit: Some(5),
            })
            .unwrap();

        assert_eq!(bound.filter.country.as_deref(), Some("Norway"));
        assert_eq!(bound.filter.age, Some(40));
        assert_eq!(bound.limit, Some(5));
        assert_eq!(bound.include, Include::USER | Include::BOOKS);
    }

    #[test]
    fn bind_rejects_missing_and_extra_values() {
        let compiled = CompiledQuery::compile(&template());

        let missing = QueryArgs {
            country: Some("Serbia".to_string()),
            age: None,
            has_book_published_before: None,
            limit: Some(2),
        };
        assert!(matches!(
            compiled.bind(&missing),
            Err(Error::UnboundParameter { slot: "age" })
        ));

        let extra = QueryArgs {
            has_book_published_before: Some(1900),
            ..template().args()
        };
        assert!(matches!(
            compiled.bind(&extra),
            Err(Error::UnexpectedParameter {
                slot: "has_book_published_before"
            })
        ));
    }

    #[test]
    fn plan_is_translated_once() {
        let compiled = CompiledQuery::compile(&template());
        let mut calls = 0;
        compiled.plan_or_translate(|_| {
            calls += 1;
            CompiledPlan {
                statements: vec!["SELECT 1".to_string()],
            }
        });
        let plan = compiled.plan_or_translate(|_| {
            calls += 1;
            CompiledPlan { statements: vec![] }
        });

        assert_eq!(calls, 1);
        assert_eq!(compiled.translations(), 1);
        assert_eq!(plan.statements, vec!["SELECT 1".to_string()]);
    }
}
