use chrono::{DateTime, Utc};
use diesel::prelude::*;

use crate::infrastructure::postgres::schema::user_contents;

#[derive(Debug, Clone, PartialEq, Identifiable, Selectable, Queryable)]
#[diesel(table_name = user_contents)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct UserContentEntity {
    pub id: i32,
    pub user_id: String,
    pub content: String,
    pub created_by: String,
    pub is_public: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Insertable)]
#[diesel(table_name = user_contents)]
pub struct InsertUserContentEntity {
    pub user_id: String,
    pub content: String,
    pub created_by: String,
    pub is_public: bool,
}
