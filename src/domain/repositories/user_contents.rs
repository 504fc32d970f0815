use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;

use crate::domain::{
    entities::user_contents::{InsertUserContentEntity, UserContentEntity},
    value_objects::token_ledger::DebitOutcome,
};

#[automock]
#[async_trait]
pub trait UserContentRepository {
    /// Takes one token from the owner and inserts the row in a single transaction.
    /// Nothing is written unless both succeed.
    async fn debit_and_insert(&self, content: InsertUserContentEntity) -> Result<DebitOutcome>;

    /// Newest first.
    async fn list_by_user_id(&self, user_id: &str) -> Result<Vec<UserContentEntity>>;

    async fn delete_owned(
        &self,
        content_id: i32,
        user_id: &str,
    ) -> Result<Option<UserContentEntity>>;
}
