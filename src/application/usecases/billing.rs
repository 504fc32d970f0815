use std::sync::Arc;

use axum::http::StatusCode;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::{
    application::{
        interfaces::payments::StripeGateway,
        usecases::token_ledger::{LedgerError, TokenLedgerUseCase},
    },
    domain::{
        repositories::{
            user_contents::UserContentRepository, user_subscriptions::UserSubscriptionRepository,
        },
        value_objects::{
            billing::{CheckoutSessionDto, PortalSessionDto},
            enums::stripe_subscription_statuses::StripeSubscriptionStatus,
        },
    },
};

#[derive(Debug, Error)]
pub enum BillingError {
    #[error("Price ID is required")]
    MissingPriceId,
    #[error("User already has an active Stripe subscription")]
    AlreadySubscribed,
    #[error("User email not found")]
    MissingEmail,
    #[error("No subscription found")]
    NoBillingAccount,
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    #[error("payment provider request failed: {0}")]
    Provider(anyhow::Error),
}

impl BillingError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            BillingError::MissingPriceId
            | BillingError::AlreadySubscribed
            | BillingError::MissingEmail
            | BillingError::NoBillingAccount => StatusCode::BAD_REQUEST,
            BillingError::Ledger(err) => err.status_code(),
            BillingError::Provider(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

pub type BillingResult<T> = std::result::Result<T, BillingError>;

pub struct BillingUseCase<S, C, G>
where
    S: UserSubscriptionRepository + Send + Sync + 'static,
    C: UserContentRepository + Send + Sync + 'static,
    G: StripeGateway + Send + Sync + 'static,
{
    ledger: Arc<TokenLedgerUseCase<S, C>>,
    stripe_client: Arc<G>,
}

impl<S, C, G> BillingUseCase<S, C, G>
where
    S: UserSubscriptionRepository + Send + Sync + 'static,
    C: UserContentRepository + Send + Sync + 'static,
    G: StripeGateway + Send + Sync + 'static,
{
    pub fn new(ledger: Arc<TokenLedgerUseCase<S, C>>, stripe_client: Arc<G>) -> Self {
        Self {
            ledger,
            stripe_client,
        }
    }

    pub async fn create_checkout_session(
        &self,
        user_id: &str,
        email: Option<&str>,
        price_id: &str,
    ) -> BillingResult<CheckoutSessionDto> {
        let price_id = price_id.trim();
        if price_id.is_empty() {
            return Err(BillingError::MissingPriceId);
        }

        let existing = self.ledger.find_subscription(user_id).await?;
        let current_status = existing
            .as_ref()
            .and_then(|subscription| subscription.stripe_subscription_status.as_deref())
            .map(StripeSubscriptionStatus::from_str);
        if let Some(status) = current_status {
            if status.blocks_new_checkout() {
                warn!(%user_id, %status, "billing: checkout refused, subscription exists");
                return Err(BillingError::AlreadySubscribed);
            }
        }

        let email = email
            .map(str::trim)
            .filter(|email| !email.is_empty())
            .ok_or(BillingError::MissingEmail)?;

        let customer_id = self
            .stripe_client
            .find_or_create_customer(email, user_id)
            .await
            .map_err(|err| {
                error!(%user_id, error = %err, "billing: failed to resolve stripe customer");
                BillingError::Provider(err)
            })?;

        let session = self
            .stripe_client
            .create_checkout_session(price_id, &customer_id, user_id)
            .await
            .map_err(|err| {
                error!(%user_id, %price_id, error = %err, "billing: failed to create checkout session");
                BillingError::Provider(err)
            })?;

        info!(
            %user_id,
            %price_id,
            %customer_id,
            session_id = %session.id,
            "billing: checkout session created"
        );

        Ok(CheckoutSessionDto {
            session_id: session.id,
            url: session.url,
        })
    }

    pub async fn create_portal_session(&self, user_id: &str) -> BillingResult<PortalSessionDto> {
        let customer_id = self
            .ledger
            .find_subscription(user_id)
            .await?
            .and_then(|subscription| subscription.stripe_customer_id)
            .ok_or_else(|| {
                warn!(%user_id, "billing: portal requested without billing account");
                BillingError::NoBillingAccount
            })?;

        let url = self
            .stripe_client
            .create_portal_session(&customer_id)
            .await
            .map_err(|err| {
                error!(%user_id, error = %err, "billing: failed to create portal session");
                BillingError::Provider(err)
            })?;

        info!(%user_id, %customer_id, "billing: portal session created");
        Ok(PortalSessionDto { url })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        application::interfaces::payments::MockStripeGateway,
        domain::{
            entities::user_subscriptions::UserSubscriptionEntity,
            repositories::{
                user_contents::MockUserContentRepository,
                user_subscriptions::MockUserSubscriptionRepository,
            },
            value_objects::stripe::CheckoutSessionModel,
        },
    };
    use chrono::Utc;

    fn row(customer_id: Option<&str>, status: Option<&str>) -> UserSubscriptionEntity {
        let now = Utc::now();
        UserSubscriptionEntity {
            id: 1,
            user_id: "U1".to_string(),
            stripe_customer_id: customer_id.map(str::to_string),
            stripe_subscription_id: None,
            stripe_subscription_price_id: None,
            stripe_subscription_status: status.map(str::to_string),
            stripe_subscription_current_period_end: None,
            token: 10,
            created_at: now,
            updated_at: now,
        }
    }

    fn usecase(
        subscription_repo: MockUserSubscriptionRepository,
        gateway: MockStripeGateway,
    ) -> BillingUseCase<MockUserSubscriptionRepository, MockUserContentRepository, MockStripeGateway>
    {
        let ledger = TokenLedgerUseCase::new(
            Arc::new(subscription_repo),
            Arc::new(MockUserContentRepository::new()),
        );
        BillingUseCase::new(Arc::new(ledger), Arc::new(gateway))
    }

    #[tokio::test]
    async fn checkout_resolves_customer_and_returns_session() {
        let mut subscription_repo = MockUserSubscriptionRepository::new();
        subscription_repo
            .expect_find_by_user_id()
            .returning(|_| Ok(Some(row(None, None))));

        let mut gateway = MockStripeGateway::new();
        gateway
            .expect_find_or_create_customer()
            .withf(|email, user_id| email == "u1@example.com" && user_id == "U1")
            .times(1)
            .returning(|_, _| Ok("cus_1".to_string()));
        gateway
            .expect_create_checkout_session()
            .withf(|price_id, customer_id, user_id| {
                price_id == "price_pro" && customer_id == "cus_1" && user_id == "U1"
            })
            .times(1)
            .returning(|_, _, _| {
                Ok(CheckoutSessionModel {
                    id: "cs_1".to_string(),
                    url: Some("https://checkout.stripe.com/c/cs_1".to_string()),
                })
            });

        let usecase = usecase(subscription_repo, gateway);

        let session = usecase
            .create_checkout_session("U1", Some("u1@example.com"), "price_pro")
            .await
            .unwrap();
        assert_eq!(session.session_id, "cs_1");
        assert!(session.url.is_some());
    }

    #[tokio::test]
    async fn checkout_is_refused_while_a_subscription_is_live() {
        let mut subscription_repo = MockUserSubscriptionRepository::new();
        subscription_repo
            .expect_find_by_user_id()
            .returning(|_| Ok(Some(row(Some("cus_1"), Some("active")))));
        let mut gateway = MockStripeGateway::new();
        gateway.expect_create_checkout_session().never();

        let usecase = usecase(subscription_repo, gateway);

        let err = usecase
            .create_checkout_session("U1", Some("u1@example.com"), "price_pro")
            .await
            .unwrap_err();
        assert!(matches!(err, BillingError::AlreadySubscribed));
    }

    #[tokio::test]
    async fn checkout_requires_price_and_email() {
        let mut subscription_repo = MockUserSubscriptionRepository::new();
        subscription_repo
            .expect_find_by_user_id()
            .returning(|_| Ok(None));

        let usecase = usecase(subscription_repo, MockStripeGateway::new());

        let err = usecase
            .create_checkout_session("U1", Some("u1@example.com"), " ")
            .await
            .unwrap_err();
        assert!(matches!(err, BillingError::MissingPriceId));

        let err = usecase
            .create_checkout_session("U1", None, "price_pro")
            .await
            .unwrap_err();
        assert!(matches!(err, BillingError::MissingEmail));
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn portal_needs_a_linked_customer() {
        let mut subscription_repo = MockUserSubscriptionRepository::new();
        subscription_repo
            .expect_find_by_user_id()
            .returning(|_| Ok(Some(row(None, None))));
        let mut gateway = MockStripeGateway::new();
        gateway.expect_create_portal_session().never();

        let usecase = usecase(subscription_repo, gateway);

        let err = usecase.create_portal_session("U1").await.unwrap_err();
        assert!(matches!(err, BillingError::NoBillingAccount));
    }

    #[tokio::test]
    async fn portal_returns_provider_url() {
        let mut subscription_repo = MockUserSubscriptionRepository::new();
        subscription_repo
            .expect_find_by_user_id()
            .returning(|_| Ok(Some(row(Some("cus_9"), Some("active")))));
        let mut gateway = MockStripeGateway::new();
        gateway
            .expect_create_portal_session()
            .withf(|customer_id| customer_id == "cus_9")
            .returning(|_| Ok("https://billing.stripe.com/p/session".to_string()));

        let usecase = usecase(subscription_repo, gateway);

        let portal = usecase.create_portal_session("U1").await.unwrap();
        assert_eq!(portal.url, "https://billing.stripe.com/p/session");
    }
}
