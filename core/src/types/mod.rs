//! Entity and result types.

mod author;
mod book;
mod ids;
mod result;
mod user;

pub use author::Author;
pub use book::{Book, Publisher};
pub use ids::{AuthorId, BookId, PublisherId, RoleId, UserId};
pub use result::{AuthorResult, BookResult};
pub use user::{Role, User, UserRole};
