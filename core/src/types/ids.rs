use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(
            Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash,
        )]
        #[serde(transparent)]
        pub struct $name(pub u32);

        impl $name {
            pub const fn get(self) -> u32 {
                self.0
            }
        }

        impl From<u32> for $name {
            fn from(value: u32) -> Self {
                Self(value)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "#{}"), self.0)
            }
        }
    };
}

entity_id!(
    /// Primary key of a [`User`](super::User).
    UserId,
    "user"
);
entity_id!(RoleId, "role");
entity_id!(
    /// Primary key of an [`Author`](super::Author).
    AuthorId,
    "author"
);
entity_id!(BookId, "book");
entity_id!(PublisherId, "publisher");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_entity_prefix() {
        assert_eq!(AuthorId(7).to_string(), "author#7");
        assert_eq!(PublisherId(12).to_string(), "publisher#12");
    }

    #[test]
    fn ids_order_by_raw_value() {
        let mut ids = vec![BookId(3), BookId(1), BookId(2)];
        ids.sort();
        assert_eq!(ids, vec![BookId(1), BookId(2), BookId(3)]);
    }
}
