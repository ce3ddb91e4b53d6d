use super::{published_before, QueryParams, Strategy};
use crate::error::Result;
use crate::source::{AuthorGraph, AuthorQuery, DataSource, Include};
use authors_core::types::{AuthorId, AuthorResult, BookId, BookResult, RoleId, UserId};
use chrono::{NaiveDate, NaiveDateTime};

/// Loads every author with the whole relation graph, projects all of it, and
/// only then filters, ranks and trims in memory.
pub struct Naive;

impl Strategy for Naive {
    fn name(&self) -> &'static str {
        "naive"
    }

    fn execute(&self, source: &dyn DataSource, params: &QueryParams) -> Result<Vec<AuthorResult>> {
        let graphs = source.fetch_graphs(&AuthorQuery::new().include(Include::ALL))?;

        let mut authors: Vec<AuthorDto> = graphs
            .into_iter()
            .map(AuthorDto::from_graph)
            .filter(|a| a.country == params.country && a.age == params.age)
            .collect();

        authors.sort_by(|a, b| {
            b.books_count
                .cmp(&a.books_count)
                .then(a.author_id.cmp(&b.author_id))
        });
        authors.truncate(params.top_n);

        let mut results = Vec::with_capacity(authors.len());
        for mut author in authors {
            let mut books = Vec::new();
            for book in author.books.drain(..) {
                if published_before(book.published, params.year_cutoff) {
                    books.push(book);
                }
            }
            author.books = books;
            results.push(author.into_result());
        }
        Ok(results)
    }
}

/// Everything the graph offers, flattened. Most fields are never read; they
/// are part of the materialisation cost this strategy measures.
#[allow(dead_code)]
struct AuthorDto {
    author_id: AuthorId,
    nick_name: String,
    age: u32,
    country: String,
    books_count: u32,
    user_id: Option<UserId>,
    first_name: String,
    last_name: String,
    user_name: String,
    email: String,
    created: Option<NaiveDateTime>,
    email_confirmed: bool,
    last_activity: Option<NaiveDateTime>,
    role_id: Option<RoleId>,
    books: Vec<BookDto>,
}

#[allow(dead_code)]
struct BookDto {
    id: BookId,
    name: String,
    published: NaiveDate,
    isbn: String,
    publisher_name: Option<String>,
}

impl AuthorDto {
    fn from_graph(graph: AuthorGraph) -> Self {
        let AuthorGraph {
            author,
            user,
            books,
        } = graph;
        let (user, roles) = match user {
            Some(graph) => (Some(graph.user), graph.roles),
            None => (None, Vec::new()),
        };
        let role_id = user.as_ref().and_then(|user| {
            roles
                .iter()
                .find(|r| r.user_role.user_id == user.id)
                .map(|r| r.user_role.role_id)
        });

        Self {
            author_id: author.id,
            nick_name: author.nick_name,
            age: author.age,
            country: author.country,
            books_count: author.books_count,
            user_id: user.as_ref().map(|u| u.id),
            first_name: user.as_ref().map(|u| u.first_name.clone()).unwrap_or_default(),
            last_name: user.as_ref().map(|u| u.last_name.clone()).unwrap_or_default(),
            user_name: user.as_ref().map(|u| u.user_name.clone()).unwrap_or_default(),
            email: user.as_ref().map(|u| u.email.clone()).unwrap_or_default(),
            created: user.as_ref().map(|u| u.created),
            email_confirmed: user.as_ref().is_some_and(|u| u.email_confirmed),
            last_activity: user.as_ref().map(|u| u.last_activity),
            role_id,
            books: books
                .into_iter()
                .map(|graph| BookDto {
                    id: graph.book.id,
                    name: graph.book.name,
                    published: graph.book.published,
                    isbn: graph.book.isbn,
                    publisher_name: graph.publisher.map(|p| p.name),
                })
                .collect(),
        }
    }

    fn into_result(self) -> AuthorResult {
        AuthorResult {
            author_id: self.author_id,
            first_name: self.first_name,
            last_name: self.last_name,
            user_name: self.user_name,
            email: self.email,
            age: self.age,
            country: self.country,
            books_count: self.books_count,
            books: self
                .books
                .into_iter()
                .map(|book| BookResult::new(book.name, book.published))
                .collect(),
        }
    }
}
