//! Data population: generates a realistic author/book catalogue for
//! benchmarking, plus small hand-built fixtures for tests.

use crate::error::Result;
use authors_core::constants::{DEFAULT_AGE, DEFAULT_COUNTRY};
use authors_core::types::{
    Author, AuthorId, Book, BookId, Publisher, PublisherId, Role, RoleId, User, UserId, UserRole,
};
use authors_core::Dataset;
use chrono::{NaiveDate, NaiveDateTime};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

pub const DEFAULT_SEED: u64 = 0xB00C_5EED_1900_0027;

/// Countries authors are drawn from, uniformly.
pub const COUNTRIES: [&str; 6] = [
    DEFAULT_COUNTRY,
    "Croatia",
    "Norway",
    "Portugal",
    "Chile",
    "Japan",
];
const ROLE_NAMES: [&str; 3] = ["Administrator", "Author", "Reader"];

/// Size of the generated catalogue.
#[derive(Debug, Clone, Copy)]
pub struct PopulationParams {
    pub authors: usize,
    /// Upper bound (inclusive) on books per author.
    pub max_books_per_author: usize,
    pub publishers: usize,
    /// Authors are spread uniformly over this many ages starting at 20.
    pub age_span: u32,
    pub seed: u64,
}

impl PopulationParams {
    /// Standard benchmark catalogue: 2,000 authors, up to 40 books each.
    pub fn standard() -> Self {
        Self {
            authors: 2_000,
            max_books_per_author: 40,
            publishers: 50,
            age_span: 20,
            seed: DEFAULT_SEED,
        }
    }

    /// Small catalogue for tests. Ages 20..=27, so the default age occurs.
    pub fn small() -> Self {
        Self {
            authors: 120,
            max_books_per_author: 12,
            publishers: 5,
            age_span: 8,
            seed: DEFAULT_SEED,
        }
    }
}

/// Generate a synthetic catalogue matching `params`.
///
/// Uses a fixed seed for deterministic, reproducible benchmarks.
pub fn generate_synthetic(params: &PopulationParams) -> Result<Dataset> {
    let mut rng = StdRng::seed_from_u64(params.seed);
    let mut builder = Dataset::builder();

    for (i, name) in ROLE_NAMES.iter().enumerate() {
        builder.add_role(Role {
            id: RoleId(i as u32 + 1),
            name: name.to_string(),
        });
    }
    for p in 1..=params.publishers.max(1) {
        builder.add_publisher(Publisher {
            id: PublisherId(p as u32),
            name: format!("Publisher {p:03}"),
        });
    }

    let mut next_book = 1u32;
    for i in 1..=params.authors {
        let id = i as u32;
        let created = timestamp(rng.gen_range(2005..2020), rng.gen_range(1..=12));
        builder.add_user(User {
            id: UserId(id),
            first_name: format!("First{i:05}"),
            last_name: format!("Last{i:05}"),
            user_name: format!("author_{i:05}"),
            email: format!("author_{i:05}@example.com"),
            created,
            email_confirmed: rng.gen_bool(0.8),
            last_activity: timestamp(rng.gen_range(2020..2025), rng.gen_range(1..=12)),
        });

        // Every user reads; some also write or administer.
        builder.add_user_role(UserRole {
            user_id: UserId(id),
            role_id: RoleId(3),
        });
        if rng.gen_bool(0.6) {
            builder.add_user_role(UserRole {
                user_id: UserId(id),
                role_id: RoleId(2),
            });
        }
        if rng.gen_bool(0.02) {
            builder.add_user_role(UserRole {
                user_id: UserId(id),
                role_id: RoleId(1),
            });
        }

        builder.add_author(Author {
            id: AuthorId(id),
            user_id: UserId(id),
            nick_name: format!("nick_{i:05}"),
            age: 20 + rng.gen_range(0..params.age_span.max(1)),
            country: COUNTRIES[rng.gen_range(0..COUNTRIES.len())].to_string(),
            books_count: 0,
        });

        let books = rng.gen_range(0..=params.max_books_per_author);
        for _ in 0..books {
            let year = rng.gen_range(1700..=2020);
            builder.add_book(Book {
                id: BookId(next_book),
                author_id: AuthorId(id),
                publisher_id: PublisherId(rng.gen_range(1..=params.publishers.max(1)) as u32),
                name: format!("Book {next_book:06}"),
                isbn: format!("978-{:010}", rng.gen_range(0..10_000_000_000u64)),
                published: date(year, rng.gen_range(1..=12), rng.gen_range(1..=28)),
            });
            next_book += 1;
        }
    }

    let dataset = builder.build()?;
    log::info!(
        "Generated synthetic catalogue: {} authors, {} books, {} publishers",
        dataset.author_count(),
        dataset.book_count(),
        params.publishers
    );
    Ok(dataset)
}

fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).unwrap_or(NaiveDate::MIN)
}

fn timestamp(year: i32, month: u32) -> NaiveDateTime {
    date(year, month, 1).and_hms_opt(9, 30, 0).unwrap_or_default()
}

/// Hand-built catalogues with known answers.
pub mod fixtures {
    use super::*;
    use authors_core::DatasetBuilder;

    /// Serbia/27, 5 books, 2 of them before 1900.
    pub const AUTHOR_A: u32 = 1;
    /// Serbia/27, 3 books, all before 1900.
    pub const AUTHOR_B: u32 = 2;
    /// Serbia/45, 6 books, none before 1900.
    pub const AUTHOR_MODERN: u32 = 3;
    /// Serbia/30, 9 books before 1900: right country, wrong age.
    pub const AUTHOR_OLDER: u32 = 4;
    /// Norway/27, 7 books before 1900: right age, wrong country.
    pub const AUTHOR_ABROAD: u32 = 5;
    /// Serbia/27, 8 books, none before 1900.
    pub const AUTHOR_PROLIFIC: u32 = 6;

    struct Spec {
        id: u32,
        first_name: &'static str,
        country: &'static str,
        age: u32,
        /// Publication years, one book per entry.
        years: &'static [i32],
    }

    const A: Spec = Spec {
        id: AUTHOR_A,
        first_name: "Ana",
        country: DEFAULT_COUNTRY,
        age: DEFAULT_AGE,
        years: &[1850, 1890, 1901, 1950, 2001],
    };
    const B: Spec = Spec {
        id: AUTHOR_B,
        first_name: "Branko",
        country: DEFAULT_COUNTRY,
        age: DEFAULT_AGE,
        years: &[1860, 1870, 1899],
    };
    const MODERN: Spec = Spec {
        id: AUTHOR_MODERN,
        first_name: "Milica",
        country: DEFAULT_COUNTRY,
        age: 45,
        years: &[1900, 1920, 1940, 1960, 1980, 2000],
    };
    const OLDER: Spec = Spec {
        id: AUTHOR_OLDER,
        first_name: "Stevan",
        country: DEFAULT_COUNTRY,
        age: 30,
        years: &[1801, 1802, 1803, 1804, 1805, 1806, 1807, 1808, 1809],
    };
    const ABROAD: Spec = Spec {
        id: AUTHOR_ABROAD,
        first_name: "Henrik",
        country: "Norway",
        age: DEFAULT_AGE,
        years: &[1860, 1861, 1862, 1863, 1864, 1865, 1866],
    };
    const PROLIFIC: Spec = Spec {
        id: AUTHOR_PROLIFIC,
        first_name: "Desanka",
        country: DEFAULT_COUNTRY,
        age: DEFAULT_AGE,
        years: &[1901, 1902, 1903, 1904, 1905, 1906, 1907, 1908],
    };

    fn builder(specs: &[Spec]) -> DatasetBuilder {
        let mut builder = Dataset::builder();
        builder
            .add_role(Role {
                id: RoleId(1),
                name: "Author".to_string(),
            })
            .add_role(Role {
                id: RoleId(2),
                name: "Reader".to_string(),
            })
            .add_publisher(Publisher {
                id: PublisherId(1),
                name: "Matica srpska".to_string(),
            })
            .add_publisher(Publisher {
                id: PublisherId(2),
                name: "Prosveta".to_string(),
            });

        let mut next_book = 1u32;
        for spec in specs {
            let at = timestamp(2015, 3);
            builder
                .add_user(User {
                    id: UserId(spec.id),
                    first_name: spec.first_name.to_string(),
                    last_name: format!("{}ović", spec.first_name),
                    user_name: spec.first_name.to_lowercase(),
                    email: format!("{}@example.rs", spec.first_name.to_lowercase()),
                    created: at,
                    email_confirmed: true,
                    last_activity: at,
                })
                .add_user_role(UserRole {
                    user_id: UserId(spec.id),
                    role_id: RoleId(1),
                })
                .add_user_role(UserRole {
                    user_id: UserId(spec.id),
                    role_id: RoleId(2),
                })
                .add_author(Author {
                    id: AuthorId(spec.id),
                    user_id: UserId(spec.id),
                    nick_name: format!("{}_{}", spec.first_name.to_lowercase(), spec.id),
                    age: spec.age,
                    country: spec.country.to_string(),
                    books_count: 0,
                });
            for (n, &year) in spec.years.iter().enumerate() {
                builder.add_book(Book {
                    id: BookId(next_book),
                    author_id: AuthorId(spec.id),
                    publisher_id: PublisherId(1 + next_book % 2),
                    name: format!("{} vol. {}", spec.first_name, n + 1),
                    isbn: format!("978-86-{next_book:07}"),
                    published: date(year, 5, 15),
                });
                next_book += 1;
            }
        }
        builder
    }

    fn build(specs: &[Spec]) -> Dataset {
        builder(specs).build().expect("fixture catalogue is valid")
    }

    /// Unbuilt [`serbian_authors`], for tests that tamper with it first.
    pub fn serbian_builder() -> DatasetBuilder {
        builder(&[A, B, MODERN, OLDER, ABROAD])
    }

    /// A and B are the only Serbia/27 authors; A ranks first by total book
    /// count, B by books published before 1900.
    pub fn serbian_authors() -> Dataset {
        build(&[A, B, MODERN, OLDER, ABROAD])
    }

    /// Like [`serbian_authors`] plus a Serbia/27 author whose larger total
    /// book count comes entirely from books published after 1900.
    pub fn ranking_divergence() -> Dataset {
        build(&[A, B, MODERN, OLDER, ABROAD, PROLIFIC])
    }

    /// `count` Serbia/27 authors, author `i` having `i % 7 + 1` books before 1900.
    pub fn many_matching(count: usize) -> Dataset {
        let mut builder = Dataset::builder();
        builder.add_publisher(Publisher {
            id: PublisherId(1),
            name: "Matica srpska".to_string(),
        });
        let mut next_book = 1u32;
        for i in 1..=count as u32 {
            let at = timestamp(2018, 1);
            builder
                .add_user(User {
                    id: UserId(i),
                    first_name: format!("Writer{i}"),
                    last_name: "Petrović".to_string(),
                    user_name: format!("writer{i}"),
                    email: format!("writer{i}@example.rs"),
                    created: at,
                    email_confirmed: false,
                    last_activity: at,
                })
                .add_author(Author {
                    id: AuthorId(i),
                    user_id: UserId(i),
                    nick_name: format!("writer{i}"),
                    age: DEFAULT_AGE,
                    country: DEFAULT_COUNTRY.to_string(),
                    books_count: 0,
                });
            for n in 0..(i % 7 + 1) {
                builder.add_book(Book {
                    id: BookId(next_book),
                    author_id: AuthorId(i),
                    publisher_id: PublisherId(1),
                    name: format!("Writer{i} book {n}"),
                    isbn: format!("978-86-{next_book:07}"),
                    published: date(1800 + n as i32, 1, 1),
                });
                next_book += 1;
            }
        }
        builder.build().expect("fixture catalogue is valid")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn synthetic_is_deterministic() {
        let params = PopulationParams::small();
        let a = generate_synthetic(&params).unwrap();
        let b = generate_synthetic(&params).unwrap();

        assert_eq!(a.author_count(), params.authors);
        assert_eq!(a.book_count(), b.book_count());
        assert_eq!(
            a.authors().map(|x| x.books_count).collect::<Vec<_>>(),
            b.authors().map(|x| x.books_count).collect::<Vec<_>>()
        );
    }

    #[test]
    fn synthetic_satisfies_books_count_invariant() {
        let dataset = generate_synthetic(&PopulationParams::small()).unwrap();
        assert!(dataset.audit_books_count().is_empty());
        assert!(dataset
            .authors()
            .all(|a| a.books_count as usize <= PopulationParams::small().max_books_per_author));
    }

    #[test]
    fn fixture_counts_match_descriptions() {
        let dataset = fixtures::serbian_authors();
        let a = dataset.author(AuthorId(fixtures::AUTHOR_A)).unwrap();
        let b = dataset.author(AuthorId(fixtures::AUTHOR_B)).unwrap();
        assert_eq!((a.books_count, b.books_count), (5, 3));
        assert_eq!(
            dataset
                .books_of(a.id)
                .filter(|book| book.published_before(1900))
                .count(),
            2
        );
    }
}
