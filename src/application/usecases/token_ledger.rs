use std::sync::Arc;

use axum::http::StatusCode;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::domain::{
    entities::{user_contents::InsertUserContentEntity, user_subscriptions::UserSubscriptionEntity},
    repositories::{
        user_contents::UserContentRepository, user_subscriptions::UserSubscriptionRepository,
    },
    value_objects::token_ledger::{
        ContentDto, DebitOutcome, MAX_CREDIT_AMOUNT, SubscriptionMetadataModel, TOKEN_CEILING,
    },
};

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("{0}")]
    Validation(String),
    #[error("insufficient tokens")]
    InsufficientTokens,
    #[error("token balance not provisioned")]
    NotProvisioned,
    #[error("credit amount {0} must be between 1 and 10000")]
    InvalidAmount(i32),
    #[error("content not found or access denied")]
    ContentNotFound,
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

impl LedgerError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            LedgerError::Validation(_) | LedgerError::InvalidAmount(_) => StatusCode::BAD_REQUEST,
            LedgerError::InsufficientTokens => StatusCode::PAYMENT_REQUIRED,
            LedgerError::NotProvisioned | LedgerError::ContentNotFound => StatusCode::NOT_FOUND,
            LedgerError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

pub type LedgerResult<T> = std::result::Result<T, LedgerError>;

/// Content body as posted by a client: must be a JSON string that is not blank.
pub fn content_from_json(value: Option<serde_json::Value>) -> LedgerResult<String> {
    match value {
        Some(serde_json::Value::String(content)) if !content.trim().is_empty() => Ok(content),
        _ => Err(LedgerError::Validation(
            "Content is required and must be a string".to_string(),
        )),
    }
}

/// The only writer of token balances and content rows.
pub struct TokenLedgerUseCase<S, C>
where
    S: UserSubscriptionRepository + Send + Sync + 'static,
    C: UserContentRepository + Send + Sync + 'static,
{
    subscription_repo: Arc<S>,
    content_repo: Arc<C>,
}

impl<S, C> TokenLedgerUseCase<S, C>
where
    S: UserSubscriptionRepository + Send + Sync + 'static,
    C: UserContentRepository + Send + Sync + 'static,
{
    pub fn new(subscription_repo: Arc<S>, content_repo: Arc<C>) -> Self {
        Self {
            subscription_repo,
            content_repo,
        }
    }

    pub async fn get_balance(&self, user_id: &str) -> LedgerResult<i32> {
        let subscription = self
            .subscription_repo
            .find_by_user_id(user_id)
            .await
            .map_err(|err| {
                error!(%user_id, db_error = ?err, "token_ledger: failed to load balance");
                LedgerError::Store(err)
            })?;

        match subscription {
            Some(subscription) => Ok(subscription.token),
            None => {
                info!(%user_id, "token_ledger: balance requested for unprovisioned user");
                Err(LedgerError::NotProvisioned)
            }
        }
    }

    pub async fn provision(&self, user_id: &str) -> LedgerResult<UserSubscriptionEntity> {
        Self::require_user_id(user_id)?;

        let subscription = self
            .subscription_repo
            .insert_if_absent(user_id)
            .await
            .map_err(|err| {
                error!(%user_id, db_error = ?err, "token_ledger: failed to provision user");
                LedgerError::Store(err)
            })?;

        info!(
            %user_id,
            token = subscription.token,
            "token_ledger: user provisioned"
        );
        Ok(subscription)
    }

    /// Balance lookup that provisions on first sight instead of reporting
    /// `NotProvisioned`.
    pub async fn balance_or_provision(&self, user_id: &str) -> LedgerResult<i32> {
        match self.get_balance(user_id).await {
            Err(LedgerError::NotProvisioned) => Ok(self.provision(user_id).await?.token),
            other => other,
        }
    }

    pub async fn find_subscription(
        &self,
        user_id: &str,
    ) -> LedgerResult<Option<UserSubscriptionEntity>> {
        Ok(self.subscription_repo.find_by_user_id(user_id).await?)
    }

    pub async fn find_subscription_by_customer(
        &self,
        stripe_customer_id: &str,
    ) -> LedgerResult<Option<UserSubscriptionEntity>> {
        Ok(self
            .subscription_repo
            .find_by_stripe_customer_id(stripe_customer_id)
            .await?)
    }

    pub async fn debit_and_create_content(
        &self,
        user_id: &str,
        content: &str,
        created_by: &str,
    ) -> LedgerResult<(ContentDto, i32)> {
        Self::require_user_id(user_id)?;
        if content.trim().is_empty() {
            return Err(LedgerError::Validation(
                "Content is required and must be a string".to_string(),
            ));
        }

        let insert_entity = InsertUserContentEntity {
            user_id: user_id.to_string(),
            content: content.to_string(),
            created_by: created_by.to_string(),
            is_public: false,
        };

        let outcome = self
            .content_repo
            .debit_and_insert(insert_entity)
            .await
            .map_err(|err| {
                error!(%user_id, db_error = ?err, "token_ledger: debit transaction failed");
                LedgerError::Store(err)
            })?;

        match outcome {
            DebitOutcome::Created {
                content,
                remaining_tokens,
            } => {
                info!(
                    %user_id,
                    content_id = content.id,
                    remaining_tokens,
                    "token_ledger: token debited and content created"
                );
                Ok((ContentDto::from(content), remaining_tokens))
            }
            DebitOutcome::InsufficientTokens => {
                warn!(%user_id, "token_ledger: debit refused, balance is zero");
                Err(LedgerError::InsufficientTokens)
            }
            DebitOutcome::NotProvisioned => {
                warn!(%user_id, "token_ledger: debit refused, user not provisioned");
                Err(LedgerError::NotProvisioned)
            }
        }
    }

    pub async fn credit_tokens(
        &self,
        user_id: &str,
        amount: i32,
    ) -> LedgerResult<UserSubscriptionEntity> {
        if amount <= 0 || amount > MAX_CREDIT_AMOUNT {
            warn!(%user_id, amount, "token_ledger: credit amount out of range");
            return Err(LedgerError::InvalidAmount(amount));
        }

        let subscription = self
            .subscription_repo
            .credit_tokens(user_id, amount, TOKEN_CEILING)
            .await
            .map_err(|err| {
                error!(%user_id, amount, db_error = ?err, "token_ledger: credit failed");
                LedgerError::Store(err)
            })?
            .ok_or_else(|| {
                warn!(%user_id, amount, "token_ledger: credit for unprovisioned user");
                LedgerError::NotProvisioned
            })?;

        info!(
            %user_id,
            amount,
            token = subscription.token,
            "token_ledger: tokens credited"
        );
        Ok(subscription)
    }

    pub async fn upsert_subscription_metadata(
        &self,
        user_id: &str,
        metadata: SubscriptionMetadataModel,
    ) -> LedgerResult<UserSubscriptionEntity> {
        Self::require_user_id(user_id)?;

        let subscription = self
            .subscription_repo
            .upsert_metadata(user_id, metadata.normalized())
            .await
            .map_err(|err| {
                error!(%user_id, db_error = ?err, "token_ledger: metadata upsert failed");
                LedgerError::Store(err)
            })?;

        info!(
            %user_id,
            stripe_subscription_id = ?subscription.stripe_subscription_id,
            stripe_subscription_status = ?subscription.stripe_subscription_status,
            "token_ledger: subscription metadata stored"
        );
        Ok(subscription)
    }

    /// Content rows are left in place. Deleting an absent row is not an error.
    pub async fn delete_subscription(
        &self,
        user_id: &str,
    ) -> LedgerResult<Option<UserSubscriptionEntity>> {
        let deleted = self
            .subscription_repo
            .delete_by_user_id(user_id)
            .await
            .map_err(|err| {
                error!(%user_id, db_error = ?err, "token_ledger: subscription delete failed");
                LedgerError::Store(err)
            })?;

        info!(
            %user_id,
            existed = deleted.is_some(),
            "token_ledger: subscription deleted"
        );
        Ok(deleted)
    }

    pub async fn list_content(&self, user_id: &str) -> LedgerResult<Vec<ContentDto>> {
        let contents = self
            .content_repo
            .list_by_user_id(user_id)
            .await
            .map_err(|err| {
                error!(%user_id, db_error = ?err, "token_ledger: failed to list content");
                LedgerError::Store(err)
            })?;

        Ok(contents.into_iter().map(ContentDto::from).collect())
    }

    pub async fn delete_content(&self, content_id: i32, user_id: &str) -> LedgerResult<ContentDto> {
        let deleted = self
            .content_repo
            .delete_owned(content_id, user_id)
            .await
            .map_err(|err| {
                error!(%user_id, content_id, db_error = ?err, "token_ledger: content delete failed");
                LedgerError::Store(err)
            })?;

        match deleted {
            Some(content) => {
                info!(%user_id, content_id, "token_ledger: content deleted");
                Ok(ContentDto::from(content))
            }
            None => {
                info!(%user_id, content_id, "token_ledger: no owned content to delete");
                Err(LedgerError::ContentNotFound)
            }
        }
    }

    fn require_user_id(user_id: &str) -> LedgerResult<()> {
        if user_id.trim().is_empty() {
            return Err(LedgerError::Validation("user id is required".to_string()));
        }
        Ok(())
    }
}
