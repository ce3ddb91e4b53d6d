//! SQLite backend: descriptors are rendered to SQL so filters, the
//! book-existence predicate, ordering and limit run inside the engine.
//!
//! Related entities are loaded with one statement per relation, each scoped
//! by the author selection as a subquery:
//!
//! | Relation    | Statement                                                 |
//! |-------------|-----------------------------------------------------------|
//! | authors     | `SELECT .. FROM authors a WHERE .. ORDER BY .. LIMIT ?`   |
//! | users       | `.. WHERE u.id IN (SELECT a.user_id FROM authors a ..)`   |
//! | user_roles  | `.. WHERE ur.user_id IN (SELECT a.user_id ..)`            |
//! | roles       | `.. WHERE r.id IN (SELECT ur.role_id ..)`                 |
//! | books       | `.. WHERE b.author_id IN (SELECT a.id ..)`                |
//! | publishers  | `.. WHERE p.id IN (SELECT b.publisher_id ..)`             |
//!
//! Ad-hoc descriptors are rendered and prepared on every call. Compiled
//! queries render once and go through the connection's statement cache.

use super::{
    AuthorGraph, AuthorOrder, AuthorQuery, AuthorRow, BookGraph, BookRow,
    CompiledPlan, CompiledQuery, Connector, DataSource, Include, QueryArgs, QueryShape, UserGraph,
    UserRoleGraph, UserSummary,
};
use crate::error::{Error, Result};
use authors_core::types::{
    Author, AuthorId, Book, BookId, Publisher, PublisherId, Role, RoleId, User, UserId, UserRole,
};
use authors_core::{BooksCountDrift, Dataset};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, ErrorCode, OpenFlags, Row, Statement};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

static NEXT_DATABASE: AtomicUsize = AtomicUsize::new(0);

const OPEN_FLAGS: OpenFlags = OpenFlags::SQLITE_OPEN_READ_WRITE
    .union(OpenFlags::SQLITE_OPEN_CREATE)
    .union(OpenFlags::SQLITE_OPEN_URI)
    .union(OpenFlags::SQLITE_OPEN_NO_MUTEX);

/// Opens connections to one SQLite database.
///
/// For generated datasets the database is a shared-cache in-memory database
/// kept alive by a private keeper connection for the connector's lifetime.
pub struct SqliteConnector {
    uri: String,
    _keeper: Option<Connection>,
}

impl SqliteConnector {
    /// Creates a fresh in-memory database holding `dataset`.
    pub fn from_dataset(dataset: &Dataset) -> Result<Self> {
        let uri = format!(
            "file:query-bench-{}-{}?mode=memory&cache=shared",
            std::process::id(),
            NEXT_DATABASE.fetch_add(1, Ordering::Relaxed)
        );
        let mut keeper = Connection::open_with_flags(&uri, OPEN_FLAGS).map_err(reclassify_sqlite)?;
        configure_connection(&keeper)?;
        create_tables(&keeper)?;
        populate(&mut keeper, dataset)?;

        log::info!(
            "Loaded {} authors and {} books into {uri}",
            dataset.author_count(),
            dataset.book_count()
        );
        Ok(Self {
            uri,
            _keeper: Some(keeper),
        })
    }

    /// Attaches to an existing, already-populated database.
    pub fn attach(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            _keeper: None,
        }
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// A concrete [`SqliteSource`], for callers that need the connection.
    pub fn open(&self) -> Result<SqliteSource> {
        let conn = Connection::open_with_flags(&self.uri, OPEN_FLAGS).map_err(reclassify_sqlite)?;
        configure_connection(&conn).map_err(reclassify)?;
        Ok(SqliteSource { conn })
    }
}

impl Connector for SqliteConnector {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn connect(&self) -> Result<Box<dyn DataSource>> {
        Ok(Box::new(self.open()?))
    }
}

/// Configure a connection for in-memory read performance.
pub fn configure_connection(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "PRAGMA synchronous = OFF;
         PRAGMA cache_size = -65536;
         PRAGMA temp_store = MEMORY;
         PRAGMA foreign_keys = ON;",
    )?;
    Ok(())
}

/// Create all tables and indexes.
pub fn create_tables(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE users (
            id              INTEGER PRIMARY KEY,
            first_name      TEXT NOT NULL,
            last_name       TEXT NOT NULL,
            user_name       TEXT NOT NULL,
            email           TEXT NOT NULL,
            created         TEXT NOT NULL,
            email_confirmed INTEGER NOT NULL,
            last_activity   TEXT NOT NULL
        );

        CREATE TABLE roles (
            id   INTEGER PRIMARY KEY,
            name TEXT NOT NULL
        );

        CREATE TABLE user_roles (
            user_id INTEGER NOT NULL REFERENCES users(id),
            role_id INTEGER NOT NULL REFERENCES roles(id),
            PRIMARY KEY (user_id, role_id)
        );

        CREATE TABLE publishers (
            id   INTEGER PRIMARY KEY,
            name TEXT NOT NULL
        );

        -- books_count is a denormalised cache of COUNT(books)
        CREATE TABLE authors (
            id          INTEGER PRIMARY KEY,
            user_id     INTEGER NOT NULL UNIQUE REFERENCES users(id),
            nick_name   TEXT NOT NULL,
            age         INTEGER NOT NULL,
            country     TEXT NOT NULL,
            books_count INTEGER NOT NULL
        );

        CREATE INDEX idx_authors_country_age ON authors(country, age);

        CREATE TABLE books (
            id             INTEGER PRIMARY KEY,
            author_id      INTEGER NOT NULL REFERENCES authors(id),
            publisher_id   INTEGER NOT NULL REFERENCES publishers(id),
            name           TEXT NOT NULL,
            isbn           TEXT NOT NULL,
            published      TEXT NOT NULL,
            published_year INTEGER NOT NULL
        );

        CREATE INDEX idx_books_author ON books(author_id, published_year);",
    )?;
    Ok(())
}

/// Bulk-insert every table of `dataset` in one transaction.
pub fn populate(conn: &mut Connection, dataset: &Dataset) -> Result<()> {
    let tx = conn.transaction()?;
    {
        let mut stmt = tx.prepare(
            "INSERT INTO users (id, first_name, last_name, user_name, email,
                                created, email_confirmed, last_activity)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        )?;
        for user in dataset.users() {
            stmt.execute(params![
                user.id.get(),
                user.first_name,
                user.last_name,
                user.user_name,
                user.email,
                user.created,
                user.email_confirmed,
                user.last_activity,
            ])?;
        }

        let mut stmt = tx.prepare("INSERT INTO roles (id, name) VALUES (?1, ?2)")?;
        for role in dataset.roles() {
            stmt.execute(params![role.id.get(), role.name])?;
        }

        let mut stmt = tx.prepare("INSERT INTO user_roles (user_id, role_id) VALUES (?1, ?2)")?;
        for user_role in dataset.user_roles() {
            stmt.execute(params![user_role.user_id.get(), user_role.role_id.get()])?;
        }

        let mut stmt = tx.prepare("INSERT INTO publishers (id, name) VALUES (?1, ?2)")?;
        for publisher in dataset.publishers() {
            stmt.execute(params![publisher.id.get(), publisher.name])?;
        }

        let mut stmt = tx.prepare(
            "INSERT INTO authors (id, user_id, nick_name, age, country, books_count)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )?;
        for author in dataset.authors() {
            stmt.execute(params![
                author.id.get(),
                author.user_id.get(),
                author.nick_name,
                author.age,
                author.country,
                author.books_count,
            ])?;
        }

        let mut stmt = tx.prepare(
            "INSERT INTO books (id, author_id, publisher_id, name, isbn,
                                published, published_year)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        )?;
        for book in dataset.books() {
            stmt.execute(params![
                book.id.get(),
                book.author_id.get(),
                book.publisher_id.get(),
                book.name,
                book.isbn,
                book.published,
                book.published_year(),
            ])?;
        }
    }
    tx.commit()?;
    Ok(())
}

// ── Rendering ───────────────────────────────────────────────────────

/// `WHERE ..` and `ORDER BY .. LIMIT ?` for the author selection.
fn author_clauses(shape: &QueryShape) -> (String, String) {
    let mut conditions = Vec::new();
    if shape.country {
        conditions.push("a.country = ?");
    }
    if shape.age {
        conditions.push("a.age = ?");
    }
    if shape.has_book_published_before {
        conditions.push(
            "EXISTS (SELECT 1 FROM books eb WHERE eb.author_id = a.id AND eb.published_year < ?)",
        );
    }
    let where_sql = if conditions.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", conditions.join(" AND "))
    };

    let mut tail = String::new();
    match shape.order {
        Some(AuthorOrder::BooksCountDesc) => tail.push_str("ORDER BY a.books_count DESC, a.id ASC"),
        None => {}
    }
    if shape.limit {
        if !tail.is_empty() {
            tail.push(' ');
        }
        tail.push_str("LIMIT ?");
    }
    (where_sql, tail)
}

/// Statement 0 selects authors; statement 1, if present, their books.
pub fn render_projected(shape: &QueryShape) -> CompiledPlan {
    let (where_sql, tail) = author_clauses(shape);
    let include = shape.include.with_parents();

    let (user_columns, user_join) = if include.contains(Include::USER) {
        (
            ", u.first_name, u.last_name, u.user_name, u.email",
            " JOIN users u ON u.id = a.user_id",
        )
    } else {
        ("", "")
    };
    let mut statements = vec![format!(
        "SELECT a.id, a.age, a.country, a.books_count{user_columns}
         FROM authors a{user_join} {where_sql} {tail}"
    )];
    if include.contains(Include::BOOKS) {
        statements.push(format!(
            "SELECT b.author_id, b.name, b.published FROM books b
             WHERE b.author_id IN (SELECT a.id FROM authors a {where_sql} {tail})
             ORDER BY b.author_id, b.id"
        ));
    }
    CompiledPlan { statements }
}

struct GraphSql {
    authors: String,
    users: Option<String>,
    user_roles: Option<String>,
    roles: Option<String>,
    books: Option<String>,
    publishers: Option<String>,
}

fn render_graph(shape: &QueryShape) -> GraphSql {
    let (where_sql, tail) = author_clauses(shape);
    let include = shape.include.with_parents();
    let author_ids = format!("SELECT a.id FROM authors a {where_sql} {tail}");
    let user_ids = format!("SELECT a.user_id FROM authors a {where_sql} {tail}");

    GraphSql {
        authors: format!(
            "SELECT a.id, a.user_id, a.nick_name, a.age, a.country, a.books_count
             FROM authors a {where_sql} {tail}"
        ),
        users: include.contains(Include::USER).then(|| {
            format!(
                "SELECT u.id, u.first_name, u.last_name, u.user_name, u.email,
                        u.created, u.email_confirmed, u.last_activity
                 FROM users u WHERE u.id IN ({user_ids})"
            )
        }),
        user_roles: include.contains(Include::USER_ROLES).then(|| {
            format!(
                "SELECT ur.user_id, ur.role_id FROM user_roles ur
                 WHERE ur.user_id IN ({user_ids}) ORDER BY ur.rowid"
            )
        }),
        roles: include.contains(Include::ROLES).then(|| {
            format!(
                "SELECT r.id, r.name FROM roles r WHERE r.id IN (
                     SELECT ur.role_id FROM user_roles ur WHERE ur.user_id IN ({user_ids}))"
            )
        }),
        books: include.contains(Include::BOOKS).then(|| {
            format!(
                "SELECT b.id, b.author_id, b.publisher_id, b.name, b.isbn, b.published
                 FROM books b WHERE b.author_id IN ({author_ids})
                 ORDER BY b.author_id, b.id"
            )
        }),
        publishers: include.contains(Include::PUBLISHER).then(|| {
            format!(
                "SELECT p.id, p.name FROM publishers p WHERE p.id IN (
                     SELECT b.publisher_id FROM books b WHERE b.author_id IN ({author_ids}))"
            )
        }),
    }
}

/// Values for the author-selection placeholders, in rendering order.
fn bind_values(shape: &QueryShape, args: &QueryArgs) -> Result<Vec<Value>> {
    args.check_against(shape)?;
    let mut values = Vec::with_capacity(4);
    if let Some(country) = &args.country {
        values.push(Value::Text(country.clone()));
    }
    if let Some(age) = args.age {
        values.push(Value::Integer(i64::from(age)));
    }
    if let Some(year) = args.has_book_published_before {
        values.push(Value::Integer(i64::from(year)));
    }
    if let Some(limit) = args.limit {
        values.push(Value::Integer(i64::try_from(limit).unwrap_or(i64::MAX)));
    }
    Ok(values)
}

// ── Source ──────────────────────────────────────────────────────────

/// One open connection. Released when dropped.
pub struct SqliteSource {
    conn: Connection,
}

impl SqliteSource {
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    fn with_statement<T>(
        &self,
        sql: &str,
        cached: bool,
        f: impl FnOnce(&mut Statement<'_>) -> Result<T>,
    ) -> Result<T> {
        if cached {
            let mut stmt = self.conn.prepare_cached(sql)?;
            f(&mut stmt)
        } else {
            let mut stmt = self.conn.prepare(sql)?;
            f(&mut stmt)
        }
    }

    fn query_all<T>(
        &self,
        sql: &str,
        values: &[Value],
        cached: bool,
        map: impl FnMut(&Row<'_>) -> rusqlite::Result<T>,
    ) -> Result<Vec<T>> {
        self.with_statement(sql, cached, |stmt| {
            let rows = stmt.query_map(params_from_iter(values.iter()), map)?;
            let mut result = Vec::new();
            for r in rows {
                result.push(r?);
            }
            Ok(result)
        })
    }

    fn run_projected(
        &self,
        plan: &CompiledPlan,
        shape: &QueryShape,
        values: &[Value],
        cached: bool,
    ) -> Result<Vec<AuthorRow>> {
        let with_user = shape.include.with_parents().contains(Include::USER);
        let mut rows = self.query_all(&plan.statements[0], values, cached, |row| {
            Ok(AuthorRow {
                author_id: AuthorId(row.get(0)?),
                age: row.get(1)?,
                country: row.get(2)?,
                books_count: row.get(3)?,
                user: if with_user {
                    Some(UserSummary {
                        first_name: row.get(4)?,
                        last_name: row.get(5)?,
                        user_name: row.get(6)?,
                        email: row.get(7)?,
                    })
                } else {
                    None
                },
                books: Vec::new(),
            })
        })?;

        if let Some(books_sql) = plan.statements.get(1) {
            let books = self.query_all(books_sql, values, cached, |row| {
                Ok((
                    AuthorId(row.get(0)?),
                    BookRow {
                        name: row.get(1)?,
                        published: row.get(2)?,
                    },
                ))
            })?;
            let mut by_author: HashMap<AuthorId, Vec<BookRow>> = HashMap::new();
            for (author_id, book) in books {
                by_author.entry(author_id).or_default().push(book);
            }
            for row in &mut rows {
                row.books = by_author.remove(&row.author_id).unwrap_or_default();
            }
        }
        Ok(rows)
    }

    fn run_graphs(&self, query: &AuthorQuery) -> Result<Vec<AuthorGraph>> {
        let shape = query.shape();
        let sql = render_graph(&shape);
        let values = bind_values(&shape, &query.args())?;

        let authors = self.query_all(&sql.authors, &values, false, |row| {
            Ok(Author {
                id: AuthorId(row.get(0)?),
                user_id: UserId(row.get(1)?),
                nick_name: row.get(2)?,
                age: row.get(3)?,
                country: row.get(4)?,
                books_count: row.get(5)?,
            })
        })?;

        let mut users: HashMap<UserId, User> = HashMap::new();
        if let Some(users_sql) = &sql.users {
            for user in self.query_all(users_sql, &values, false, |row| {
                Ok(User {
                    id: UserId(row.get(0)?),
                    first_name: row.get(1)?,
                    last_name: row.get(2)?,
                    user_name: row.get(3)?,
                    email: row.get(4)?,
                    created: row.get(5)?,
                    email_confirmed: row.get(6)?,
                    last_activity: row.get(7)?,
                })
            })? {
                users.insert(user.id, user);
            }
        }

        let mut user_roles: HashMap<UserId, Vec<UserRole>> = HashMap::new();
        if let Some(user_roles_sql) = &sql.user_roles {
            for user_role in self.query_all(user_roles_sql, &values, false, |row| {
                Ok(UserRole {
                    user_id: UserId(row.get(0)?),
                    role_id: RoleId(row.get(1)?),
                })
            })? {
                user_roles.entry(user_role.user_id).or_default().push(user_role);
            }
        }

        let mut roles: HashMap<RoleId, Role> = HashMap::new();
        if let Some(roles_sql) = &sql.roles {
            for role in self.query_all(roles_sql, &values, false, |row| {
                Ok(Role {
                    id: RoleId(row.get(0)?),
                    name: row.get(1)?,
                })
            })? {
                roles.insert(role.id, role);
            }
        }

        let mut books: HashMap<AuthorId, Vec<Book>> = HashMap::new();
        if let Some(books_sql) = &sql.books {
            for book in self.query_all(books_sql, &values, false, |row| {
                Ok(Book {
                    id: BookId(row.get(0)?),
                    author_id: AuthorId(row.get(1)?),
                    publisher_id: PublisherId(row.get(2)?),
                    name: row.get(3)?,
                    isbn: row.get(4)?,
                    published: row.get(5)?,
                })
            })? {
                books.entry(book.author_id).or_default().push(book);
            }
        }

        let mut publishers: HashMap<PublisherId, Publisher> = HashMap::new();
        if let Some(publishers_sql) = &sql.publishers {
            for publisher in self.query_all(publishers_sql, &values, false, |row| {
                Ok(Publisher {
                    id: PublisherId(row.get(0)?),
                    name: row.get(1)?,
                })
            })? {
                publishers.insert(publisher.id, publisher);
            }
        }

        Ok(authors
            .into_iter()
            .map(|author| {
                let user = users.remove(&author.user_id).map(|user| UserGraph {
                    roles: user_roles
                        .remove(&user.id)
                        .unwrap_or_default()
                        .into_iter()
                        .map(|user_role| UserRoleGraph {
                            role: roles.get(&user_role.role_id).cloned(),
                            user_role,
                        })
                        .collect(),
                    user,
                });
                let books = books
                    .remove(&author.id)
                    .unwrap_or_default()
                    .into_iter()
                    .map(|book| BookGraph {
                        publisher: publishers.get(&book.publisher_id).cloned(),
                        book,
                    })
                    .collect();
                AuthorGraph {
                    author,
                    user,
                    books,
                }
            })
            .collect())
    }
}

impl DataSource for SqliteSource {
    fn fetch_graphs(&self, query: &AuthorQuery) -> Result<Vec<AuthorGraph>> {
        self.run_graphs(query).map_err(reclassify)
    }

    fn fetch_projected(&self, query: &AuthorQuery) -> Result<Vec<AuthorRow>> {
        let shape = query.shape();
        let values = bind_values(&shape, &query.args())?;
        let plan = render_projected(&shape);
        self.run_projected(&plan, &shape, &values, false)
            .map_err(reclassify)
    }

    fn fetch_compiled(
        &self,
        compiled: &CompiledQuery,
        args: &QueryArgs,
    ) -> Result<Vec<AuthorRow>> {
        let shape = compiled.shape();
        let values = bind_values(shape, args)?;
        let plan = compiled.plan_or_translate(render_projected);
        self.run_projected(plan, shape, &values, true)
            .map_err(reclassify)
    }

    fn audit_books_count(&self) -> Result<Vec<BooksCountDrift>> {
        self.query_all(
            "SELECT a.id, a.books_count, COUNT(b.id)
             FROM authors a LEFT JOIN books b ON b.author_id = a.id
             GROUP BY a.id
             HAVING a.books_count != COUNT(b.id)
             ORDER BY a.id",
            &[],
            false,
            |row| {
                Ok(BooksCountDrift {
                    author_id: AuthorId(row.get(0)?),
                    cached: row.get(1)?,
                    actual: row.get(2)?,
                })
            },
        )
        .map_err(reclassify)
    }
}

/// Connection-level failures surface as [`Error::SourceUnavailable`].
fn reclassify(err: Error) -> Error {
    match err {
        Error::Storage(inner) => reclassify_sqlite(inner),
        other => other,
    }
}

fn reclassify_sqlite(err: rusqlite::Error) -> Error {
    match err {
        rusqlite::Error::SqliteFailure(failure, message)
            if matches!(
                failure.code,
                ErrorCode::CannotOpen | ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked
            ) =>
        {
            Error::unavailable(message.unwrap_or_else(|| failure.to_string()))
        }
        other => Error::Storage(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shape(query: &AuthorQuery) -> QueryShape {
        query.shape()
    }

    #[test]
    fn projected_sql_pushes_filters_order_and_limit() {
        let query = AuthorQuery::new()
            .country("Serbia")
            .age(27)
            .include(Include::USER | Include::BOOKS)
            .order_by(AuthorOrder::BooksCountDesc)
            .limit(2);
        let plan = render_projected(&shape(&query));

        assert_eq!(plan.statements.len(), 2);
        let authors = &plan.statements[0];
        assert!(authors.contains("a.country = ? AND a.age = ?"));
        assert!(authors.contains("ORDER BY a.books_count DESC, a.id ASC LIMIT ?"));
        assert!(authors.contains("JOIN users u"));
        assert!(plan.statements[1].contains("b.author_id IN (SELECT a.id FROM authors a"));
    }

    #[test]
    fn projected_sql_without_books_is_one_statement() {
        let plan = render_projected(&shape(&AuthorQuery::new().with_book_published_before(1900)));
        assert_eq!(plan.statements.len(), 1);
        assert!(plan.statements[0].contains("EXISTS (SELECT 1 FROM books eb"));
        assert!(!plan.statements[0].contains("JOIN users"));
    }

    #[test]
    fn bind_values_follow_placeholder_order() {
        let query = AuthorQuery::new()
            .country("Serbia")
            .age(27)
            .with_book_published_before(1900)
            .limit(2);
        let values = bind_values(&query.shape(), &query.args()).unwrap();
        assert_eq!(
            values,
            vec![
                Value::Text("Serbia".to_string()),
                Value::Integer(27),
                Value::Integer(1900),
                Value::Integer(2),
            ]
        );
    }

    #[test]
    fn graph_sql_only_renders_included_relations() {
        let sql = render_graph(&shape(&AuthorQuery::new().include(Include::BOOKS)));
        assert!(sql.users.is_none());
        assert!(sql.roles.is_none());
        assert!(sql.books.is_some());
        assert!(sql.publishers.is_none());

        let sql = render_graph(&shape(&AuthorQuery::new().include(Include::ALL)));
        assert!(sql.users.is_some() && sql.user_roles.is_some() && sql.roles.is_some());
        assert!(sql.books.is_some() && sql.publishers.is_some());
    }
}
