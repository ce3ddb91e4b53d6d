use super::{RoleId, UserId};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Account that an [`Author`](super::Author) belongs to.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: UserId,
    pub first_name: String,
    pub last_name: String,
    pub user_name: String,
    pub email: String,
    pub created: NaiveDateTime,
    pub email_confirmed: bool,
    pub last_activity: NaiveDateTime,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Role {
    pub id: RoleId,
    pub name: String,
}

/// Many-to-many join row between [`User`] and [`Role`].
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UserRole {
    pub user_id: UserId,
    pub role_id: RoleId,
}
