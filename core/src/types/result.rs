use super::AuthorId;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One row of the benchmarked query's answer: an author's projected fields
/// plus the books that passed the publication-year filter.
///
/// Every strategy produces this shape so their outputs can be compared.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct AuthorResult {
    pub author_id: AuthorId,
    pub first_name: String,
    pub last_name: String,
    pub user_name: String,
    pub email: String,
    pub age: u32,
    pub country: String,
    pub books_count: u32,
    pub books: Vec<BookResult>,
}

impl AuthorResult {
    /// Books sorted by name, then publication date.
    pub fn normalized_books(&self) -> Vec<BookResult> {
        let mut books = self.books.clone();
        books.sort_by(|a, b| a.name.cmp(&b.name).then(a.published.cmp(&b.published)));
        books
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
pub struct BookResult {
    pub name: String,
    pub published: NaiveDate,
    pub published_year: i32,
}

impl BookResult {
    pub fn new(name: impl Into<String>, published: NaiveDate) -> Self {
        use chrono::Datelike;
        Self {
            name: name.into(),
            published,
            published_year: published.year(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn normalized_books_sort_by_name_then_date() {
        let result = AuthorResult {
            author_id: AuthorId(1),
            first_name: String::new(),
            last_name: String::new(),
            user_name: String::new(),
            email: String::new(),
            age: 27,
            country: "Serbia".to_string(),
            books_count: 3,
            books: vec![
                BookResult::new("Zona", date(1850, 1, 1)),
                BookResult::new("Anna", date(1880, 5, 2)),
                BookResult::new("Anna", date(1860, 3, 9)),
            ],
        };

        let names: Vec<_> = result
            .normalized_books()
            .into_iter()
            .map(|b| (b.name, b.published_year))
            .collect();
        assert_eq!(
            names,
            vec![
                ("Anna".to_string(), 1860),
                ("Anna".to_string(), 1880),
                ("Zona".to_string(), 1850),
            ]
        );
    }
}
