use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;

use crate::domain::value_objects::stripe::{
    CheckoutSessionModel, StripeCustomer, StripeEvent, StripeSubscription,
};

/// The slice of Stripe the ledger needs.
#[automock]
#[async_trait]
pub trait StripeGateway: Send + Sync {
    /// Checks `stripe-signature` against the raw body and parses the event.
    fn verify_webhook_signature(&self, payload: &[u8], signature_header: &str)
    -> Result<StripeEvent>;

    async fn retrieve_subscription(&self, subscription_id: &str) -> Result<StripeSubscription>;

    async fn retrieve_customer(&self, customer_id: &str) -> Result<StripeCustomer>;

    /// Reuses the first customer registered under `email`, otherwise creates one
    /// tagged with the user id.
    async fn find_or_create_customer(&self, email: &str, user_id: &str) -> Result<String>;

    async fn create_checkout_session(
        &self,
        price_id: &str,
        customer_id: &str,
        user_id: &str,
    ) -> Result<CheckoutSessionModel>;

    /// Returns the portal URL.
    async fn create_portal_session(&self, customer_id: &str) -> Result<String>;
}
