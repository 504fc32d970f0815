use std::sync::Arc;

use axum::http::StatusCode;
use thiserror::Error;
use tracing::{info, warn};

use crate::{
    application::{
        interfaces::identity::IdentityWebhookVerifier,
        usecases::token_ledger::{LedgerError, TokenLedgerUseCase},
    },
    domain::{
        repositories::{
            user_contents::UserContentRepository, user_subscriptions::UserSubscriptionRepository,
        },
        value_objects::{
            enums::identity_event_types::IdentityEventType,
            identity_events::IdentityWebhookHeaders,
        },
    },
};

#[derive(Debug, Error)]
pub enum IdentityWebhookError {
    #[error("webhook signature verification failed")]
    InvalidSignature,
    #[error("invalid identity event: {0}")]
    InvalidPayload(String),
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

impl IdentityWebhookError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            IdentityWebhookError::InvalidSignature | IdentityWebhookError::InvalidPayload(_) => {
                StatusCode::BAD_REQUEST
            }
            IdentityWebhookError::Ledger(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentityWebhookOutcome {
    Provisioned { user_id: String, token_count: i32 },
    Ignored(IdentityEventType),
}

pub struct IdentityWebhookUseCase<S, C, V>
where
    S: UserSubscriptionRepository + Send + Sync + 'static,
    C: UserContentRepository + Send + Sync + 'static,
    V: IdentityWebhookVerifier + Send + Sync + 'static,
{
    ledger: Arc<TokenLedgerUseCase<S, C>>,
    verifier: Arc<V>,
}

impl<S, C, V> IdentityWebhookUseCase<S, C, V>
where
    S: UserSubscriptionRepository + Send + Sync + 'static,
    C: UserContentRepository + Send + Sync + 'static,
    V: IdentityWebhookVerifier + Send + Sync + 'static,
{
    pub fn new(ledger: Arc<TokenLedgerUseCase<S, C>>, verifier: Arc<V>) -> Self {
        Self { ledger, verifier }
    }

    pub async fn handle_identity_webhook(
        &self,
        headers: &IdentityWebhookHeaders,
        payload: &[u8],
    ) -> Result<IdentityWebhookOutcome, IdentityWebhookError> {
        let event = self.verifier.verify(headers, payload).map_err(|err| {
            warn!(
                delivery_id = %headers.id,
                error = %err,
                security_event = true,
                "identity_webhook: signature verification failed"
            );
            IdentityWebhookError::InvalidSignature
        })?;

        let event_type = event.event_type();
        info!(delivery_id = %headers.id, %event_type, "identity_webhook: event verified");

        match event_type {
            IdentityEventType::SubjectCreated => {
                let user_id = event.subject_id().ok_or_else(|| {
                    warn!(delivery_id = %headers.id, "identity_webhook: user.created without id");
                    IdentityWebhookError::InvalidPayload("missing user id".to_string())
                })?;

                let subscription = self.ledger.provision(user_id).await?;
                Ok(IdentityWebhookOutcome::Provisioned {
                    user_id: subscription.user_id,
                    token_count: subscription.token,
                })
            }
            other => {
                info!(
                    delivery_id = %headers.id,
                    event_type = %other,
                    user_id = ?event.subject_id(),
                    "identity_webhook: no ledger effect for event"
                );
                Ok(IdentityWebhookOutcome::Ignored(other))
            }
        }
    }
}
