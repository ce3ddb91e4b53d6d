//! In-memory backend: evaluates descriptors directly over a [`Dataset`].

use super::{
    AuthorGraph, AuthorOrder, AuthorQuery, AuthorRow, BookGraph, BookRow, CompiledPlan,
    CompiledQuery, Connector, DataSource, Include, QueryArgs, QueryShape, UserGraph,
    UserRoleGraph, UserSummary,
};
use crate::error::Result;
use authors_core::types::Author;
use authors_core::{BooksCountDrift, Dataset};
use std::sync::Arc;

pub struct MemoryConnector {
    dataset: Arc<Dataset>,
}

impl MemoryConnector {
    pub fn new(dataset: Arc<Dataset>) -> Self {
        Self { dataset }
    }
}

impl Connector for MemoryConnector {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn connect(&self) -> Result<Box<dyn DataSource>> {
        Ok(Box::new(MemorySource::new(Arc::clone(&self.dataset))))
    }
}

pub struct MemorySource {
    dataset: Arc<Dataset>,
}

impl MemorySource {
    pub fn new(dataset: Arc<Dataset>) -> Self {
        Self { dataset }
    }

    /// Filter, order and limit, in that order.
    fn select_authors(&self, query: &AuthorQuery) -> Vec<&Author> {
        let filter = &query.filter;
        let mut authors: Vec<&Author> = self
            .dataset
            .authors()
            .filter(|a| filter.country.as_ref().is_none_or(|c| &a.country == c))
            .filter(|a| filter.age.is_none_or(|age| a.age == age))
            .filter(|a| {
                filter.has_book_published_before.is_none_or(|year| {
                    self.dataset
                        .books_of(a.id)
                        .any(|book| book.published_before(year))
                })
            })
            .collect();

        match query.order {
            Some(AuthorOrder::BooksCountDesc) => {
                authors.sort_by(|a, b| b.books_count.cmp(&a.books_count).then(a.id.cmp(&b.id)));
            }
            None => {}
        }
        if let Some(limit) = query.limit {
            authors.truncate(limit);
        }
        authors
    }

    fn graph_of(&self, author: &Author, include: Include) -> AuthorGraph {
        let user = if include.contains(Include::USER) {
            self.dataset.user(author.user_id).map(|user| UserGraph {
                user: user.clone(),
                roles: if include.contains(Include::USER_ROLES) {
                    self.dataset
                        .user_roles_of(user.id)
                        .map(|user_role| UserRoleGraph {
                            user_role: *user_role,
                            role: if include.contains(Include::ROLES) {
                                self.dataset.role(user_role.role_id).cloned()
                            } else {
                                None
                            },
                        })
                        .collect()
                } else {
                    Vec::new()
                },
            })
        } else {
            None
        };

        let books = if include.contains(Include::BOOKS) {
            self.dataset
                .books_of(author.id)
                .map(|book| BookGraph {
                    book: book.clone(),
                    publisher: if include.contains(Include::PUBLISHER) {
                        self.dataset.publisher(book.publisher_id).cloned()
                    } else {
                        None
                    },
                })
                .collect()
        } else {
            Vec::new()
        };

        AuthorGraph {
            author: author.clone(),
            user,
            books,
        }
    }

    fn row_of(&self, author: &Author, include: Include) -> AuthorRow {
        let user = if include.contains(Include::USER) {
            self.dataset.user(author.user_id).map(|user| UserSummary {
                first_name: user.first_name.clone(),
                last_name: user.last_name.clone(),
                user_name: user.user_name.clone(),
                email: user.email.clone(),
            })
        } else {
            None
        };
        let books = if include.contains(Include::BOOKS) {
            self.dataset
                .books_of(author.id)
                .map(|book| BookRow {
                    name: book.name.clone(),
                    published: book.published,
                })
                .collect()
        } else {
            Vec::new()
        };

        AuthorRow {
            author_id: author.id,
            age: author.age,
            country: author.country.clone(),
            books_count: author.books_count,
            user,
            books,
        }
    }
}

impl DataSource for MemorySource {
    fn fetch_graphs(&self, query: &AuthorQuery) -> Result<Vec<AuthorGraph>> {
        let include = query.include.with_parents();
        Ok(self
            .select_authors(query)
            .into_iter()
            .map(|author| self.graph_of(author, include))
            .collect())
    }

    fn fetch_projected(&self, query: &AuthorQuery) -> Result<Vec<AuthorRow>> {
        let include = query.include.with_parents();
        Ok(self
            .select_authors(query)
            .into_iter()
            .map(|author| self.row_of(author, include))
            .collect())
    }

    fn fetch_compiled(
        &self,
        compiled: &CompiledQuery,
        args: &QueryArgs,
    ) -> Result<Vec<AuthorRow>> {
        compiled.plan_or_translate(render_steps);
        let query = compiled.bind(args)?;
        self.fetch_projected(&query)
    }

    fn audit_books_count(&self) -> Result<Vec<BooksCountDrift>> {
        Ok(self.dataset.audit_books_count())
    }
}

/// The evaluation pipeline `select_authors` and `row_of` run for `shape`,
/// one step per entry.
fn render_steps(shape: &QueryShape) -> CompiledPlan {
    let mut statements = Vec::new();
    if shape.country {
        statements.push("filter country = ?".to_string());
    }
    if shape.age {
        statements.push("filter age = ?".to_string());
    }
    if shape.has_book_published_before {
        statements.push("filter any book published_year < ?".to_string());
    }
    if let Some(AuthorOrder::BooksCountDesc) = shape.order {
        statements.push("sort books_count desc, id asc".to_string());
    }
    if shape.limit {
        statements.push("truncate ?".to_string());
    }
    statements.push(format!("project {:?}", shape.include.with_parents()));
    CompiledPlan { statements }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::populate::fixtures;
    use authors_core::types::AuthorId;

    fn source() -> MemorySource {
        MemorySource::new(Arc::new(fixtures::serbian_authors()))
    }

    fn ids(rows: &[AuthorRow]) -> Vec<u32> {
        rows.iter().map(|r| r.author_id.get()).collect()
    }

    #[test]
    fn projected_fetch_filters_orders_and_limits() {
        let query = AuthorQuery::new()
            .country("Serbia")
            .age(27)
            .order_by(AuthorOrder::BooksCountDesc)
            .limit(2);
        let rows = source().fetch_projected(&query).unwrap();

        assert_eq!(ids(&rows), vec![fixtures::AUTHOR_A, fixtures::AUTHOR_B]);
        assert!(rows.iter().all(|r| r.user.is_none() && r.books.is_empty()));
    }

    #[test]
    fn projected_fetch_includes_user_and_books_on_request() {
        let query = AuthorQuery::new()
            .country("Serbia")
            .age(27)
            .include(Include::USER | Include::BOOKS)
            .order_by(AuthorOrder::BooksCountDesc)
            .limit(1);
        let rows = source().fetch_projected(&query).unwrap();

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].books.len(), 5);
        assert_eq!(rows[0].user.as_ref().unwrap().first_name, "Ana");
    }

    #[test]
    fn existence_predicate_drops_authors_without_old_books() {
        let query = AuthorQuery::new().with_book_published_before(1900);
        let rows = source().fetch_projected(&query).unwrap();

        assert!(!ids(&rows).contains(&fixtures::AUTHOR_MODERN));
    }

    #[test]
    fn graph_fetch_honours_include_list() {
        let query = AuthorQuery::new().include(Include::USER | Include::BOOKS);
        let graphs = source().fetch_graphs(&query).unwrap();

        let a = graphs
            .iter()
            .find(|g| g.author.id == AuthorId(fixtures::AUTHOR_A))
            .unwrap();
        let user = a.user.as_ref().unwrap();
        assert!(user.roles.is_empty());
        assert!(a.books.iter().all(|b| b.publisher.is_none()));

        let full = source()
            .fetch_graphs(&AuthorQuery::new().include(Include::ALL))
            .unwrap();
        let a = full
            .iter()
            .find(|g| g.author.id == AuthorId(fixtures::AUTHOR_A))
            .unwrap();
        let roles = &a.user.as_ref().unwrap().roles;
        assert!(!roles.is_empty());
        assert!(roles.iter().all(|r| r.role.is_some()));
        assert!(a.books.iter().all(|b| b.publisher.is_some()));
    }

    #[test]
    fn unknown_country_yields_no_rows() {
        let rows = source()
            .fetch_projected(&AuthorQuery::new().country("Atlantis"))
            .unwrap();
        assert!(rows.is_empty());
    }

    #[test]
    fn compiled_fetch_translates_once_per_query() {
        let template = AuthorQuery::new()
            .country("Serbia")
            .age(27)
            .include(Include::BOOKS)
            .order_by(AuthorOrder::BooksCountDesc)
            .limit(2);
        let compiled = CompiledQuery::compile(&template);
        let source = source();

        let serbia = source.fetch_compiled(&compiled, &template.args()).unwrap();
        let norway = source
            .fetch_compiled(
                &compiled,
                &QueryArgs {
                    country: Some("Norway".to_string()),
                    ..template.args()
                },
            )
            .unwrap();

        assert_eq!(compiled.translations(), 1);
        assert_eq!(ids(&serbia), vec![fixtures::AUTHOR_A, fixtures::AUTHOR_B]);
        assert_eq!(ids(&norway), vec![fixtures::AUTHOR_ABROAD]);
        let plan = compiled.plan_or_translate(|_| unreachable!("plan is cached"));
        assert_eq!(plan.statements[0], "filter country = ?");
        assert_eq!(plan.statements[2], "sort books_count desc, id asc");
    }
}
