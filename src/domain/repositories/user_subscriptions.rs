use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;

use crate::domain::{
    entities::user_subscriptions::UserSubscriptionEntity,
    value_objects::token_ledger::SubscriptionMetadataModel,
};

#[automock]
#[async_trait]
pub trait UserSubscriptionRepository {
    async fn find_by_user_id(&self, user_id: &str) -> Result<Option<UserSubscriptionEntity>>;

    async fn find_by_stripe_customer_id(
        &self,
        stripe_customer_id: &str,
    ) -> Result<Option<UserSubscriptionEntity>>;

    /// Inserts a row with the default balance unless one exists, then returns the
    /// stored row either way.
    async fn insert_if_absent(&self, user_id: &str) -> Result<UserSubscriptionEntity>;

    /// Adds `amount` in one statement, clamped to `ceiling`. `None` when the user has
    /// no row.
    async fn credit_tokens(
        &self,
        user_id: &str,
        amount: i32,
        ceiling: i32,
    ) -> Result<Option<UserSubscriptionEntity>>;

    async fn upsert_metadata(
        &self,
        user_id: &str,
        metadata: SubscriptionMetadataModel,
    ) -> Result<UserSubscriptionEntity>;

    async fn delete_by_user_id(&self, user_id: &str) -> Result<Option<UserSubscriptionEntity>>;
}
