use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;

use crate::domain::{
    entities::webhook_events::InsertWebhookEventEntity,
    value_objects::webhook_events::WebhookClaim,
};

#[automock]
#[async_trait]
pub trait WebhookEventRepository {
    /// Records the event id, or takes over a row a failed delivery left behind.
    /// A row still `processing` is never taken over: its effects may have committed.
    async fn claim(&self, event: InsertWebhookEventEntity) -> Result<WebhookClaim>;

    /// Only fills a missing user id.
    async fn backfill_user_id(&self, event_id: &str, user_id: &str) -> Result<()>;

    async fn mark_processed(&self, event_id: &str) -> Result<()>;

    async fn mark_failed(&self, event_id: &str) -> Result<()>;
}
