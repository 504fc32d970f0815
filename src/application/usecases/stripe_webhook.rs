use std::sync::Arc;

use axum::http::StatusCode;
use chrono::Utc;
use serde::de::DeserializeOwned;
use serde_json::json;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::{
    application::{interfaces::payments::StripeGateway, usecases::token_ledger::{LedgerError, TokenLedgerUseCase}},
    domain::{
        entities::webhook_events::InsertWebhookEventEntity,
        repositories::{
            user_contents::UserContentRepository, user_subscriptions::UserSubscriptionRepository,
            webhook_events::WebhookEventRepository,
        },
        value_objects::{
            enums::webhook_event_statuses::WebhookEventStatus,
            stripe::{StripeCheckoutSession, StripeEvent, StripeInvoice, StripeSubscription},
            token_grants::TokenGrants,
            token_ledger::SubscriptionMetadataModel,
            webhook_events::WebhookClaim,
        },
    },
};

pub const CHECKOUT_SESSION_COMPLETED: &str = "checkout.session.completed";
pub const SUBSCRIPTION_UPDATED: &str = "customer.subscription.updated";
pub const SUBSCRIPTION_DELETED: &str = "customer.subscription.deleted";
pub const INVOICE_PAYMENT_SUCCEEDED: &str = "invoice.payment_succeeded";

#[derive(Debug, Error)]
pub enum WebhookError {
    #[error("webhook signature verification failed")]
    InvalidSignature,
    #[error("invalid webhook payload: {0}")]
    InvalidPayload(String),
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    #[error("payment provider request failed: {0}")]
    Provider(anyhow::Error),
    #[error(transparent)]
    Store(anyhow::Error),
}

impl WebhookError {
    /// Anything past the signature check is a processing failure, which the
    /// provider answers with a retry.
    pub fn status_code(&self) -> StatusCode {
        match self {
            WebhookError::InvalidSignature | WebhookError::InvalidPayload(_) => {
                StatusCode::BAD_REQUEST
            }
            WebhookError::Ledger(_) | WebhookError::Provider(_) | WebhookError::Store(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

pub type WebhookResult<T> = std::result::Result<T, WebhookError>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookOutcome {
    Processed,
    /// Already processed, or claimed by a delivery still in flight.
    Duplicate(WebhookEventStatus),
    /// Acknowledged without any ledger effect.
    Ignored,
}

struct Dispatched {
    outcome: WebhookOutcome,
    user_id: Option<String>,
}

impl Dispatched {
    fn processed(user_id: String) -> Self {
        Self {
            outcome: WebhookOutcome::Processed,
            user_id: Some(user_id),
        }
    }

    fn ignored() -> Self {
        Self {
            outcome: WebhookOutcome::Ignored,
            user_id: None,
        }
    }
}

pub struct StripeWebhookUseCase<S, C, W, G>
where
    S: UserSubscriptionRepository + Send + Sync + 'static,
    C: UserContentRepository + Send + Sync + 'static,
    W: WebhookEventRepository + Send + Sync + 'static,
    G: StripeGateway + Send + Sync + 'static,
{
    ledger: Arc<TokenLedgerUseCase<S, C>>,
    webhook_repo: Arc<W>,
    stripe_client: Arc<G>,
    token_grants: TokenGrants,
}

impl<S, C, W, G> StripeWebhookUseCase<S, C, W, G>
where
    S: UserSubscriptionRepository + Send + Sync + 'static,
    C: UserContentRepository + Send + Sync + 'static,
    W: WebhookEventRepository + Send + Sync + 'static,
    G: StripeGateway + Send + Sync + 'static,
{
    pub fn new(
        ledger: Arc<TokenLedgerUseCase<S, C>>,
        webhook_repo: Arc<W>,
        stripe_client: Arc<G>,
        token_grants: TokenGrants,
    ) -> Self {
        Self {
            ledger,
            webhook_repo,
            stripe_client,
            token_grants,
        }
    }

    pub async fn handle_stripe_webhook(
        &self,
        payload: &[u8],
        signature: &str,
    ) -> WebhookResult<WebhookOutcome> {
        let event = self
            .stripe_client
            .verify_webhook_signature(payload, signature)
            .map_err(|err| {
                warn!(
                    error = %err,
                    security_event = true,
                    "stripe_webhook: signature verification failed"
                );
                WebhookError::InvalidSignature
            })?;

        let event_id = event.id.clone();
        info!(%event_id, event_type = %event.type_, "stripe_webhook: event verified");

        let claim = self
            .webhook_repo
            .claim(InsertWebhookEventEntity {
                id: event_id.clone(),
                event_type: event.type_.clone(),
                status: WebhookEventStatus::Processing.to_string(),
                metadata: Some(json!({
                    "created": event.created,
                    "livemode": event.livemode,
                })),
                claimed_at: Utc::now(),
            })
            .await
            .map_err(|err| {
                error!(%event_id, db_error = ?err, "stripe_webhook: failed to claim event");
                WebhookError::Store(err)
            })?;

        match claim {
            WebhookClaim::Duplicate(status) => {
                info!(%event_id, %status, "stripe_webhook: duplicate delivery skipped");
                return Ok(WebhookOutcome::Duplicate(status));
            }
            WebhookClaim::Reclaimed => {
                info!(%event_id, "stripe_webhook: retrying failed event");
            }
            WebhookClaim::Claimed => {}
        }

        match self.dispatch(&event).await {
            Ok(dispatched) => {
                if let Some(user_id) = dispatched.user_id.as_deref() {
                    if let Err(err) = self.webhook_repo.backfill_user_id(&event_id, user_id).await {
                        error!(%event_id, %user_id, db_error = ?err, "stripe_webhook: failed to record user id");
                    }
                }
                // Effects are committed, so the row must not become `failed` and
                // reclaimable. It stays `processing` and redeliveries are duplicates.
                self.webhook_repo
                    .mark_processed(&event_id)
                    .await
                    .map_err(|err| {
                        error!(%event_id, db_error = ?err, "stripe_webhook: failed to mark event processed");
                        WebhookError::Store(err)
                    })?;
                info!(%event_id, outcome = ?dispatched.outcome, "stripe_webhook: event handled");
                Ok(dispatched.outcome)
            }
            Err(err) => {
                error!(%event_id, error = %err, "stripe_webhook: processing failed");
                if let Err(mark_err) = self.webhook_repo.mark_failed(&event_id).await {
                    error!(%event_id, db_error = ?mark_err, "stripe_webhook: failed to mark event failed");
                }
                Err(err)
            }
        }
    }

    async fn dispatch(&self, event: &StripeEvent) -> WebhookResult<Dispatched> {
        match event.type_.as_str() {
            CHECKOUT_SESSION_COMPLETED => self.handle_checkout_completed(event).await,
            SUBSCRIPTION_UPDATED => self.handle_subscription_updated(event).await,
            SUBSCRIPTION_DELETED => self.handle_subscription_deleted(event).await,
            INVOICE_PAYMENT_SUCCEEDED => self.handle_invoice_payment_succeeded(event).await,
            other => {
                debug!(event_id = %event.id, event_type = other, "stripe_webhook: unhandled event type");
                Ok(Dispatched::ignored())
            }
        }
    }

    async fn handle_checkout_completed(&self, event: &StripeEvent) -> WebhookResult<Dispatched> {
        let session: StripeCheckoutSession = Self::parse_object(event)?;

        let (Some(subscription_id), Some(customer_id)) = (
            non_empty(session.subscription.as_deref()),
            non_empty(session.customer.as_deref()),
        ) else {
            warn!(
                event_id = %event.id,
                mode = ?session.mode,
                "stripe_webhook: checkout session without subscription or customer"
            );
            return Ok(Dispatched::ignored());
        };

        let subscription = self.retrieve_subscription(subscription_id).await?;
        let customer = self
            .stripe_client
            .retrieve_customer(customer_id)
            .await
            .map_err(WebhookError::Provider)?;

        if customer.deleted {
            warn!(event_id = %event.id, %customer_id, "stripe_webhook: checkout customer was deleted");
            return Ok(Dispatched::ignored());
        }
        let Some(user_id) = customer.user_id() else {
            warn!(event_id = %event.id, %customer_id, "stripe_webhook: checkout customer has no userId metadata");
            return Ok(Dispatched::ignored());
        };

        let price_id = subscription.price_id();
        self.ledger
            .upsert_subscription_metadata(
                &user_id,
                SubscriptionMetadataModel {
                    stripe_customer_id: Some(customer_id.to_string()),
                    stripe_subscription_id: Some(subscription.id.clone()),
                    stripe_subscription_price_id: price_id.clone(),
                    stripe_subscription_status: subscription.status.clone(),
                    stripe_subscription_current_period_end: subscription.period_end(),
                },
            )
            .await?;

        let Some(price_id) = price_id else {
            warn!(event_id = %event.id, %user_id, "stripe_webhook: subscription has no price, nothing credited");
            return Ok(Dispatched::processed(user_id));
        };
        let grant = self.token_grants.grant_for(&price_id);
        self.ledger.credit_tokens(&user_id, grant).await?;

        info!(
            event_id = %event.id,
            %user_id,
            %price_id,
            grant,
            "stripe_webhook: checkout reconciled"
        );
        Ok(Dispatched::processed(user_id))
    }

    async fn handle_subscription_updated(&self, event: &StripeEvent) -> WebhookResult<Dispatched> {
        let subscription: StripeSubscription = Self::parse_object(event)?;

        let Some(user_id) = self
            .resolve_user_id(event, subscription.customer.as_deref())
            .await?
        else {
            return Ok(Dispatched::ignored());
        };

        self.ledger
            .upsert_subscription_metadata(
                &user_id,
                SubscriptionMetadataModel {
                    stripe_customer_id: None,
                    stripe_subscription_id: Some(subscription.id.clone()),
                    stripe_subscription_price_id: subscription.price_id(),
                    stripe_subscription_status: subscription.status.clone(),
                    stripe_subscription_current_period_end: subscription.period_end(),
                },
            )
            .await?;

        info!(
            event_id = %event.id,
            %user_id,
            status = ?subscription.status,
            "stripe_webhook: subscription refreshed"
        );
        Ok(Dispatched::processed(user_id))
    }

    async fn handle_subscription_deleted(&self, event: &StripeEvent) -> WebhookResult<Dispatched> {
        let subscription: StripeSubscription = Self::parse_object(event)?;

        let Some(user_id) = self
            .resolve_user_id(event, subscription.customer.as_deref())
            .await?
        else {
            return Ok(Dispatched::ignored());
        };

        self.ledger.delete_subscription(&user_id).await?;

        info!(event_id = %event.id, %user_id, "stripe_webhook: subscription removed");
        Ok(Dispatched::processed(user_id))
    }

    async fn handle_invoice_payment_succeeded(
        &self,
        event: &StripeEvent,
    ) -> WebhookResult<Dispatched> {
        let invoice: StripeInvoice = Self::parse_object(event)?;

        if !invoice.is_renewal() {
            debug!(
                event_id = %event.id,
                billing_reason = ?invoice.billing_reason,
                "stripe_webhook: invoice is not a renewal"
            );
            return Ok(Dispatched::ignored());
        }

        let Some(subscription_id) = invoice.subscription_id() else {
            warn!(event_id = %event.id, "stripe_webhook: renewal invoice without subscription id");
            return Ok(Dispatched::ignored());
        };

        let subscription = self.retrieve_subscription(&subscription_id).await?;
        let customer_id = invoice.customer.clone().or_else(|| subscription.customer.clone());

        let Some(user_id) = self.resolve_user_id(event, customer_id.as_deref()).await? else {
            return Ok(Dispatched::ignored());
        };

        // A renewal can arrive for a user whose row was never created locally.
        self.ledger.provision(&user_id).await?;

        let Some(price_id) = subscription.price_id() else {
            warn!(event_id = %event.id, %user_id, "stripe_webhook: renewed subscription has no price, nothing credited");
            return Ok(Dispatched::processed(user_id));
        };
        let grant = self.token_grants.grant_for(&price_id);
        self.ledger.credit_tokens(&user_id, grant).await?;

        info!(
            event_id = %event.id,
            %user_id,
            %price_id,
            grant,
            "stripe_webhook: renewal credited"
        );
        Ok(Dispatched::processed(user_id))
    }

    /// Customer metadata first, then the local row linked to the customer id.
    async fn resolve_user_id(
        &self,
        event: &StripeEvent,
        customer_id: Option<&str>,
    ) -> WebhookResult<Option<String>> {
        let Some(customer_id) = non_empty(customer_id) else {
            warn!(event_id = %event.id, "stripe_webhook: event carries no customer id");
            return Ok(None);
        };

        let customer = self
            .stripe_client
            .retrieve_customer(customer_id)
            .await
            .map_err(WebhookError::Provider)?;

        if !customer.deleted {
            if let Some(user_id) = customer.user_id() {
                return Ok(Some(user_id));
            }
        }

        let local = self.ledger.find_subscription_by_customer(customer_id).await?;
        match local {
            Some(subscription) => Ok(Some(subscription.user_id)),
            None => {
                warn!(
                    event_id = %event.id,
                    %customer_id,
                    "stripe_webhook: no user linked to customer"
                );
                Ok(None)
            }
        }
    }

    async fn retrieve_subscription(&self, subscription_id: &str) -> WebhookResult<StripeSubscription> {
        self.stripe_client
            .retrieve_subscription(subscription_id)
            .await
            .map_err(|err| {
                error!(%subscription_id, error = %err, "stripe_webhook: failed to retrieve subscription");
                WebhookError::Provider(err)
            })
    }

    fn parse_object<T: DeserializeOwned>(event: &StripeEvent) -> WebhookResult<T> {
        serde_json::from_value(event.data.object.clone()).map_err(|err| {
            warn!(
                event_id = %event.id,
                event_type = %event.type_,
                error = %err,
                "stripe_webhook: unexpected event object"
            );
            WebhookError::InvalidPayload(format!("{}: {err}", event.type_))
        })
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
