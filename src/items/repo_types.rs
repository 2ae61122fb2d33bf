use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;

/// Item record in the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Item {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub available: bool,
    pub owner_id: Option<i64>, // None only for a malformed record
    pub request_id: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct NewItem {
    pub name: String,
    pub description: String,
    pub available: bool,
    pub owner_id: i64,
    pub request_id: Option<i64>,
}

/// Comment joined with its author's display name.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct Comment {
    pub id: i64,
    pub text: String,
    pub item_id: i64,
    pub author_id: i64,
    pub author_name: String,
    pub created: OffsetDateTime,
}

#[derive(Debug, Clone)]
pub struct NewComment {
    pub text: String,
    pub item_id: i64,
    pub author_id: i64,
    pub created: OffsetDateTime,
}
