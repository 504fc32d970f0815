use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use diesel::{
    OptionalExtension, RunQueryDsl, delete, dsl::exists, insert_into, prelude::*, select, update,
};
use std::sync::Arc;

use crate::{
    domain::{
        entities::user_contents::{InsertUserContentEntity, UserContentEntity},
        repositories::user_contents::UserContentRepository,
        value_objects::token_ledger::DebitOutcome,
    },
    infrastructure::postgres::{
        postgres_connection::PgPoolSquad,
        schema::{user_contents, user_subscriptions},
    },
};

pub struct UserContentPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl UserContentPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl UserContentRepository for UserContentPostgres {
    async fn debit_and_insert(&self, content: InsertUserContentEntity) -> Result<DebitOutcome> {
        let mut conn = Arc::clone(&self.db_pool).get()?;
        let now = Utc::now();

        let outcome = conn.transaction::<DebitOutcome, diesel::result::Error, _>(|tx| {
            // The `token > 0` predicate is the lock: a concurrent debit waits on the row
            // and re-checks the predicate once the first one commits.
            let remaining_tokens = update(
                user_subscriptions::table
                    .filter(user_subscriptions::user_id.eq(&content.user_id))
                    .filter(user_subscriptions::token.gt(0)),
            )
            .set((
                user_subscriptions::token.eq(user_subscriptions::token - 1),
                user_subscriptions::updated_at.eq(now),
            ))
            .returning(user_subscriptions::token)
            .get_result::<i32>(tx)
            .optional()?;

            let Some(remaining_tokens) = remaining_tokens else {
                let provisioned = select(exists(
                    user_subscriptions::table
                        .filter(user_subscriptions::user_id.eq(&content.user_id)),
                ))
                .get_result::<bool>(tx)?;

                return Ok(if provisioned {
                    DebitOutcome::InsufficientTokens
                } else {
                    DebitOutcome::NotProvisioned
                });
            };

            let created = insert_into(user_contents::table)
                .values(&content)
                .returning(UserContentEntity::as_returning())
                .get_result::<UserContentEntity>(tx)?;

            Ok(DebitOutcome::Created {
                content: created,
                remaining_tokens,
            })
        })?;

        Ok(outcome)
    }

    async fn list_by_user_id(&self, user_id: &str) -> Result<Vec<UserContentEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let results = user_contents::table
            .filter(user_contents::user_id.eq(user_id))
            .order((user_contents::created_at.desc(), user_contents::id.desc()))
            .select(UserContentEntity::as_select())
            .load::<UserContentEntity>(&mut conn)?;

        Ok(results)
    }

    async fn delete_owned(
        &self,
        content_id: i32,
        user_id: &str,
    ) -> Result<Option<UserContentEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let result = delete(
            user_contents::table
                .filter(user_contents::id.eq(content_id))
                .filter(user_contents::user_id.eq(user_id)),
        )
        .returning(UserContentEntity::as_returning())
        .get_result::<UserContentEntity>(&mut conn)
        .optional()?;

        Ok(result)
    }
}
