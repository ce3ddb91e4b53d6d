//! Immutable, referentially-checked snapshot of every entity table.

use crate::types::{
    Author, AuthorId, Book, BookId, Publisher, PublisherId, Role, RoleId, User, UserId, UserRole,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DatasetError {
    #[error("duplicate {entity} id {id}")]
    DuplicateId { entity: &'static str, id: u32 },

    #[error("{entity} {id} references missing {target} {target_id}")]
    DanglingReference {
        entity: &'static str,
        id: u32,
        target: &'static str,
        target_id: u32,
    },

    #[error("user {user_id} owns more than one author")]
    UserOwnsSeveralAuthors { user_id: u32 },
}

/// An author whose cached `books_count` disagrees with the book table.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct BooksCountDrift {
    pub author_id: AuthorId,
    pub cached: u32,
    pub actual: u32,
}

/// Read-only entity snapshot. Authors and books iterate in ascending id order.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    users: BTreeMap<UserId, User>,
    roles: BTreeMap<RoleId, Role>,
    user_roles: Vec<UserRole>,
    authors: BTreeMap<AuthorId, Author>,
    books: BTreeMap<BookId, Book>,
    publishers: BTreeMap<PublisherId, Publisher>,
    books_by_author: HashMap<AuthorId, Vec<BookId>>,
}

impl Dataset {
    pub fn builder() -> DatasetBuilder {
        DatasetBuilder::default()
    }

    pub fn users(&self) -> impl Iterator<Item = &User> {
        self.users.values()
    }

    pub fn user(&self, id: UserId) -> Option<&User> {
        self.users.get(&id)
    }

    pub fn roles(&self) -> impl Iterator<Item = &Role> {
        self.roles.values()
    }

    pub fn role(&self, id: RoleId) -> Option<&Role> {
        self.roles.get(&id)
    }

    pub fn user_roles(&self) -> &[UserRole] {
        &self.user_roles
    }

    /// Join rows for `user_id`, in insertion order.
    pub fn user_roles_of(&self, user_id: UserId) -> impl Iterator<Item = &UserRole> {
        self.user_roles
            .iter()
            .filter(move |user_role| user_role.user_id == user_id)
    }

    pub fn authors(&self) -> impl Iterator<Item = &Author> {
        self.authors.values()
    }

    pub fn author(&self, id: AuthorId) -> Option<&Author> {
        self.authors.get(&id)
    }

    pub fn author_count(&self) -> usize {
        self.authors.len()
    }

    pub fn books(&self) -> impl Iterator<Item = &Book> {
        self.books.values()
    }

    pub fn book_count(&self) -> usize {
        self.books.len()
    }

    pub fn books_of(&self, author_id: AuthorId) -> impl Iterator<Item = &Book> {
        self.books_by_author
            .get(&author_id)
            .into_iter()
            .flatten()
            .filter_map(|id| self.books.get(id))
    }

    pub fn publishers(&self) -> impl Iterator<Item = &Publisher> {
        self.publishers.values()
    }

    pub fn publisher(&self, id: PublisherId) -> Option<&Publisher> {
        self.publishers.get(&id)
    }

    /// Compares every author's cached `books_count` with its real book count.
    pub fn audit_books_count(&self) -> Vec<BooksCountDrift> {
        self.authors
            .values()
            .filter_map(|author| {
                let actual = self
                    .books_by_author
                    .get(&author.id)
                    .map_or(0, |books| books.len() as u32);
                (author.books_count != actual).then_some(BooksCountDrift {
                    author_id: author.id,
                    cached: author.books_count,
                    actual,
                })
            })
            .collect()
    }
}

/// Collects entities and validates them into a [`Dataset`].
#[derive(Debug, Default)]
pub struct DatasetBuilder {
    users: Vec<User>,
    roles: Vec<Role>,
    user_roles: Vec<UserRole>,
    authors: Vec<Author>,
    books: Vec<Book>,
    publishers: Vec<Publisher>,
    stale_counts: Vec<(AuthorId, u32)>,
}

impl DatasetBuilder {
    pub fn add_user(&mut self, user: User) -> &mut Self {
        self.users.push(user);
        self
    }

    pub fn add_role(&mut self, role: Role) -> &mut Self {
        self.roles.push(role);
        self
    }

    pub fn add_user_role(&mut self, user_role: UserRole) -> &mut Self {
        self.user_roles.push(user_role);
        self
    }

    /// The author's `books_count` is ignored; `build` derives it.
    pub fn add_author(&mut self, author: Author) -> &mut Self {
        self.authors.push(author);
        self
    }

    pub fn add_book(&mut self, book: Book) -> &mut Self {
        self.books.push(book);
        self
    }

    pub fn add_publisher(&mut self, publisher: Publisher) -> &mut Self {
        self.publishers.push(publisher);
        self
    }

    /// Keeps `books_count` at `cached` for `author_id` instead of deriving it,
    /// the way a stale denormalised column would be loaded from a store.
    pub fn stale_books_count(&mut self, author_id: AuthorId, cached: u32) -> &mut Self {
        self.stale_counts.push((author_id, cached));
        self
    }

    pub fn build(self) -> Result<Dataset, DatasetError> {
        let users = index_unique(self.users, "user", |u| u.id, |id| id.get())?;
        let roles = index_unique(self.roles, "role", |r| r.id, |id| id.get())?;
        let publishers = index_unique(self.publishers, "publisher", |p| p.id, |id| id.get())?;
        let mut authors = index_unique(self.authors, "author", |a| a.id, |id| id.get())?;
        let books = index_unique(self.books, "book", |b| b.id, |id| id.get())?;

        for user_role in &self.user_roles {
            if !users.contains_key(&user_role.user_id) {
                return Err(DatasetError::DanglingReference {
                    entity: "user_role",
                    id: user_role.user_id.get(),
                    target: "user",
                    target_id: user_role.user_id.get(),
                });
            }
            if !roles.contains_key(&user_role.role_id) {
                return Err(DatasetError::DanglingReference {
                    entity: "user_role",
                    id: user_role.user_id.get(),
                    target: "role",
                    target_id: user_role.role_id.get(),
                });
            }
        }

        let mut owners = HashSet::new();
        for author in authors.values() {
            if !users.contains_key(&author.user_id) {
                return Err(DatasetError::DanglingReference {
                    entity: "author",
                    id: author.id.get(),
                    target: "user",
                    target_id: author.user_id.get(),
                });
            }
            if !owners.insert(author.user_id) {
                return Err(DatasetError::UserOwnsSeveralAuthors {
                    user_id: author.user_id.get(),
                });
            }
        }

        let mut books_by_author: HashMap<AuthorId, Vec<BookId>> = HashMap::new();
        for book in books.values() {
            if !authors.contains_key(&book.author_id) {
                return Err(DatasetError::DanglingReference {
                    entity: "book",
                    id: book.id.get(),
                    target: "author",
                    target_id: book.author_id.get(),
                });
            }
            if !publishers.contains_key(&book.publisher_id) {
                return Err(DatasetError::DanglingReference {
                    entity: "book",
                    id: book.id.get(),
                    target: "publisher",
                    target_id: book.publisher_id.get(),
                });
            }
            books_by_author.entry(book.author_id).or_default().push(book.id);
        }

        for author in authors.values_mut() {
            author.books_count = books_by_author
                .get(&author.id)
                .map_or(0, |books| books.len() as u32);
        }
        for (author_id, cached) in self.stale_counts {
            match authors.get_mut(&author_id) {
                Some(author) => author.books_count = cached,
                None => {
                    return Err(DatasetError::DanglingReference {
                        entity: "books_count override",
                        id: author_id.get(),
                        target: "author",
                        target_id: author_id.get(),
                    });
                }
            }
        }

        log::debug!(
            "Dataset built: {} users, {} authors, {} books, {} publishers",
            users.len(),
            authors.len(),
            books.len(),
            publishers.len()
        );

        Ok(Dataset {
            users,
            roles,
            user_roles: self.user_roles,
            authors,
            books,
            publishers,
            books_by_author,
        })
    }
}

fn index_unique<K: Ord + Copy, T>(
    rows: Vec<T>,
    entity: &'static str,
    key: impl Fn(&T) -> K,
    raw: impl Fn(K) -> u32,
) -> Result<BTreeMap<K, T>, DatasetError> {
    let mut map = BTreeMap::new();
    for row in rows {
        let id = key(&row);
        if map.insert(id, row).is_some() {
            return Err(DatasetError::DuplicateId {
                entity,
                id: raw(id),
            });
        }
    }
    Ok(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn user(id: u32) -> User {
        let at = NaiveDate::from_ymd_opt(2020, 1, 1)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap();
        User {
            id: UserId(id),
            first_name: format!("First{id}"),
            last_name: format!("Last{id}"),
            user_name: format!("user{id}"),
            email: format!("user{id}@example.com"),
            created: at,
            email_confirmed: true,
            last_activity: at,
        }
    }

    fn author(id: u32, user_id: u32) -> Author {
        Author {
            id: AuthorId(id),
            user_id: UserId(user_id),
            nick_name: format!("nick{id}"),
            age: 27,
            country: "Serbia".to_string(),
            books_count: 999,
        }
    }

    fn book(id: u32, author_id: u32, year: i32) -> Book {
        Book {
            id: BookId(id),
            author_id: AuthorId(author_id),
            publisher_id: PublisherId(1),
            name: format!("Book {id}"),
            isbn: format!("isbn-{id}"),
            published: NaiveDate::from_ymd_opt(year, 6, 1).unwrap(),
        }
    }

    fn base() -> DatasetBuilder {
        let mut builder = Dataset::builder();
        builder
            .add_user(user(1))
            .add_user(user(2))
            .add_publisher(Publisher {
                id: PublisherId(1),
                name: "Matica".to_string(),
            })
            .add_author(author(10, 1))
            .add_author(author(20, 2));
        builder
    }

    #[test]
    fn build_derives_books_count() {
        let mut builder = base();
        builder
            .add_book(book(1, 10, 1850))
            .add_book(book(2, 10, 1950))
            .add_book(book(3, 20, 1890));
        let dataset = builder.build().unwrap();

        assert_eq!(dataset.author(AuthorId(10)).unwrap().books_count, 2);
        assert_eq!(dataset.author(AuthorId(20)).unwrap().books_count, 1);
        assert!(dataset.audit_books_count().is_empty());
    }

    #[test]
    fn author_without_books_counts_zero() {
        let dataset = base().build().unwrap();
        assert_eq!(dataset.author(AuthorId(10)).unwrap().books_count, 0);
        assert_eq!(dataset.books_of(AuthorId(10)).count(), 0);
    }

    #[test]
    fn stale_books_count_is_reported_by_audit() {
        let mut builder = base();
        builder
            .add_book(book(1, 10, 1850))
            .stale_books_count(AuthorId(10), 4);
        let dataset = builder.build().unwrap();

        assert_eq!(
            dataset.audit_books_count(),
            vec![BooksCountDrift {
                author_id: AuthorId(10),
                cached: 4,
                actual: 1,
            }]
        );
    }

    #[test]
    fn book_with_unknown_author_is_rejected() {
        let mut builder = base();
        builder.add_book(book(1, 99, 1850));

        assert_eq!(
            builder.build().unwrap_err(),
            DatasetError::DanglingReference {
                entity: "book",
                id: 1,
                target: "author",
                target_id: 99,
            }
        );
    }

    #[test]
    fn duplicate_author_id_is_rejected() {
        let mut builder = base();
        builder.add_user(user(3)).add_author(author(10, 3));

        assert_eq!(
            builder.build().unwrap_err(),
            DatasetError::DuplicateId {
                entity: "author",
                id: 10,
            }
        );
    }

    #[test]
    fn user_may_own_only_one_author() {
        let mut builder = base();
        builder.add_author(author(30, 1));

        assert_eq!(
            builder.build().unwrap_err(),
            DatasetError::UserOwnsSeveralAuthors { user_id: 1 }
        );
    }

    #[test]
    fn books_of_iterates_in_id_order() {
        let mut builder = base();
        builder
            .add_book(book(5, 10, 1850))
            .add_book(book(2, 10, 1860))
            .add_book(book(9, 10, 1870));
        let dataset = builder.build().unwrap();

        let ids: Vec<_> = dataset.books_of(AuthorId(10)).map(|b| b.id.get()).collect();
        assert_eq!(ids, vec![2, 5, 9]);
    }
}
