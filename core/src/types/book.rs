use super::{AuthorId, BookId, PublisherId};
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Book {
    pub id: BookId,
    pub author_id: AuthorId,
    pub publisher_id: PublisherId,
    pub name: String,
    pub isbn: String,
    pub published: NaiveDate,
}

impl Book {
    pub fn published_year(&self) -> i32 {
        self.published.year()
    }

    /// True when the book came out in a year strictly before `year`.
    pub fn published_before(&self, year: i32) -> bool {
        self.published_year() < year
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Publisher {
    pub id: PublisherId,
    pub name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn book(published: NaiveDate) -> Book {
        Book {
            id: BookId(1),
            author_id: AuthorId(1),
            publisher_id: PublisherId(1),
            name: "Seobe".to_string(),
            isbn: "978-86-0000-000-1".to_string(),
            published,
        }
    }

    #[test]
    fn published_before_is_strict_on_year() {
        let last_day = book(NaiveDate::from_ymd_opt(1899, 12, 31).unwrap());
        let first_day = book(NaiveDate::from_ymd_opt(1900, 1, 1).unwrap());

        assert!(last_day.published_before(1900));
        assert!(!first_day.published_before(1900));
        assert_eq!(first_day.published_year(), 1900);
    }
}
