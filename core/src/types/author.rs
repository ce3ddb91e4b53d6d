use super::{AuthorId, UserId};
use serde::{Deserialize, Serialize};

/// Author profile, owned 1:1 by a [`User`](super::User).
///
/// `books_count` is a denormalised cache of how many books the author has.
/// [`DatasetBuilder::build`](crate::DatasetBuilder::build) derives it from the
/// book table, and rankings that sort by it rely on it staying accurate. Use
/// [`Dataset::audit_books_count`](crate::Dataset::audit_books_count) to check.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Author {
    pub id: AuthorId,
    pub user_id: UserId,
    pub nick_name: String,
    pub age: u32,
    pub country: String,
    pub books_count: u32,
}
