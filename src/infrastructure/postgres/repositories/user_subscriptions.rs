use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use diesel::{OptionalExtension, RunQueryDsl, delete, insert_into, prelude::*, sql_types::Integer, update};
use std::sync::Arc;

use crate::{
    domain::{
        entities::user_subscriptions::{InsertUserSubscriptionEntity, UserSubscriptionEntity},
        repositories::user_subscriptions::UserSubscriptionRepository,
        value_objects::token_ledger::SubscriptionMetadataModel,
    },
    infrastructure::postgres::{postgres_connection::PgPoolSquad, schema::user_subscriptions},
};

diesel::define_sql_function!(fn least(a: Integer, b: Integer) -> Integer);

pub struct UserSubscriptionPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl UserSubscriptionPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl UserSubscriptionRepository for UserSubscriptionPostgres {
    async fn find_by_user_id(&self, user_id: &str) -> Result<Option<UserSubscriptionEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let result = user_subscriptions::table
            .filter(user_subscriptions::user_id.eq(user_id))
            .select(UserSubscriptionEntity::as_select())
            .first::<UserSubscriptionEntity>(&mut conn)
            .optional()?;

        Ok(result)
    }

    async fn find_by_stripe_customer_id(
        &self,
        stripe_customer_id: &str,
    ) -> Result<Option<UserSubscriptionEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let result = user_subscriptions::table
            .filter(user_subscriptions::stripe_customer_id.eq(stripe_customer_id))
            .select(UserSubscriptionEntity::as_select())
            .first::<UserSubscriptionEntity>(&mut conn)
            .optional()?;

        Ok(result)
    }

    async fn insert_if_absent(&self, user_id: &str) -> Result<UserSubscriptionEntity> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let insert_entity = InsertUserSubscriptionEntity {
            user_id: user_id.to_string(),
            stripe_customer_id: None,
            stripe_subscription_id: None,
            stripe_subscription_price_id: None,
            stripe_subscription_status: None,
            stripe_subscription_current_period_end: None,
        };

        insert_into(user_subscriptions::table)
            .values(&insert_entity)
            .on_conflict(user_subscriptions::user_id)
            .do_nothing()
            .execute(&mut conn)?;

        let result = user_subscriptions::table
            .filter(user_subscriptions::user_id.eq(user_id))
            .select(UserSubscriptionEntity::as_select())
            .first::<UserSubscriptionEntity>(&mut conn)?;

        Ok(result)
    }

    async fn credit_tokens(
        &self,
        user_id: &str,
        amount: i32,
        ceiling: i32,
    ) -> Result<Option<UserSubscriptionEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        // Read, add and clamp happen inside the one UPDATE.
        let result = update(user_subscriptions::table.filter(user_subscriptions::user_id.eq(user_id)))
            .set((
                user_subscriptions::token.eq(least(user_subscriptions::token + amount, ceiling)),
                user_subscriptions::updated_at.eq(Utc::now()),
            ))
            .returning(UserSubscriptionEntity::as_returning())
            .get_result::<UserSubscriptionEntity>(&mut conn)
            .optional()?;

        Ok(result)
    }

    async fn upsert_metadata(
        &self,
        user_id: &str,
        metadata: SubscriptionMetadataModel,
    ) -> Result<UserSubscriptionEntity> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let result = insert_into(user_subscriptions::table)
            .values(&metadata.to_insert_entity(user_id))
            .on_conflict(user_subscriptions::user_id)
            .do_update()
            .set(&metadata.to_changeset(Utc::now()))
            .returning(UserSubscriptionEntity::as_returning())
            .get_result::<UserSubscriptionEntity>(&mut conn)?;

        Ok(result)
    }

    async fn delete_by_user_id(&self, user_id: &str) -> Result<Option<UserSubscriptionEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let result = delete(user_subscriptions::table.filter(user_subscriptions::user_id.eq(user_id)))
            .returning(UserSubscriptionEntity::as_returning())
            .get_result::<UserSubscriptionEntity>(&mut conn)
            .optional()?;

        Ok(result)
    }
}
