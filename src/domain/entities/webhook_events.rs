use chrono::{DateTime, Utc};
use diesel::prelude::*;

use crate::infrastructure::postgres::schema::webhook_events;

#[derive(Debug, Clone, PartialEq, Identifiable, Selectable, Queryable)]
#[diesel(table_name = webhook_events)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct WebhookEventEntity {
    pub id: String,
    pub event_type: String,
    pub status: String,
    pub user_id: Option<String>,
    pub metadata: Option<serde_json::Value>,
    pub claimed_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = webhook_events)]
pub struct InsertWebhookEventEntity {
    pub id: String,
    pub event_type: String,
    pub status: String,
    pub metadata: Option<serde_json::Value>,
    pub claimed_at: DateTime<Utc>,
}
