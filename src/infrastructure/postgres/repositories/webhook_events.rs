use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use diesel::{RunQueryDsl, insert_into, prelude::*, update};
use std::sync::Arc;

use crate::{
    domain::{
        entities::webhook_events::InsertWebhookEventEntity,
        repositories::webhook_events::WebhookEventRepository,
        value_objects::{
            enums::webhook_event_statuses::WebhookEventStatus, webhook_events::WebhookClaim,
        },
    },
    infrastructure::postgres::{postgres_connection::PgPoolSquad, schema::webhook_events},
};

pub struct WebhookEventPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl WebhookEventPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl WebhookEventRepository for WebhookEventPostgres {
    async fn claim(&self, event: InsertWebhookEventEntity) -> Result<WebhookClaim> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let claim = conn.transaction::<WebhookClaim, diesel::result::Error, _>(|tx| {
            let inserted = insert_into(webhook_events::table)
                .values(&event)
                .on_conflict(webhook_events::id)
                .do_nothing()
                .execute(tx)?;

            if inserted == 1 {
                return Ok(WebhookClaim::Claimed);
            }

            let reclaimed = update(
                webhook_events::table
                    .filter(webhook_events::id.eq(&event.id))
                    .filter(webhook_events::status.eq(WebhookEventStatus::Failed.to_string())),
            )
            .set((
                webhook_events::status.eq(WebhookEventStatus::Processing.to_string()),
                webhook_events::claimed_at.eq(event.claimed_at),
            ))
            .execute(tx)?;

            if reclaimed == 1 {
                return Ok(WebhookClaim::Reclaimed);
            }

            let status = webhook_events::table
                .filter(webhook_events::id.eq(&event.id))
                .select(webhook_events::status)
                .first::<String>(tx)?;

            Ok(WebhookClaim::Duplicate(
                WebhookEventStatus::from_str(&status).unwrap_or(WebhookEventStatus::Processed),
            ))
        })?;

        Ok(claim)
    }

    async fn backfill_user_id(&self, event_id: &str, user_id: &str) -> Result<()> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        update(
            webhook_events::table
                .filter(webhook_events::id.eq(event_id))
                .filter(webhook_events::user_id.is_null()),
        )
        .set(webhook_events::user_id.eq(user_id))
        .execute(&mut conn)?;

        Ok(())
    }

    async fn mark_processed(&self, event_id: &str) -> Result<()> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        update(webhook_events::table.filter(webhook_events::id.eq(event_id)))
            .set((
                webhook_events::status.eq(WebhookEventStatus::Processed.to_string()),
                webhook_events::processed_at.eq(Some(Utc::now())),
            ))
            .execute(&mut conn)?;

        Ok(())
    }

    async fn mark_failed(&self, event_id: &str) -> Result<()> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        update(webhook_events::table.filter(webhook_events::id.eq(event_id)))
            .set(webhook_events::status.eq(WebhookEventStatus::Failed.to_string()))
            .execute(&mut conn)?;

        Ok(())
    }
}
