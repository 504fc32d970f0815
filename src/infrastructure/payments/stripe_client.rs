use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use chrono::Utc;
use hmac::{Hmac, Mac};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, de::DeserializeOwned};
use sha2::Sha256;
use tracing::error;

use crate::{
    application::interfaces::payments::StripeGateway,
    config::config_model::Stripe,
    domain::value_objects::stripe::{
        CUSTOMER_USER_ID_KEY, CheckoutSessionModel, StripeCustomer, StripeEvent,
        StripeSubscription,
    },
};

type HmacSha256 = Hmac<Sha256>;

const STRIPE_API_BASE: &str = "https://api.stripe.com/v1";
/// Signed webhook timestamps older than this are rejected as replays.
pub const SIGNATURE_TOLERANCE_SECONDS: i64 = 300;

/// Minimal Stripe client built on reqwest.
pub struct StripeClient {
    http: reqwest::Client,
    secret_key: String,
    webhook_secret: String,
    success_url: String,
    cancel_url: String,
    portal_return_url: String,
}

#[derive(Debug, Deserialize)]
struct StripeErrorEnvelope {
    error: StripeErrorDetails,
}

#[derive(Debug, Deserialize)]
struct StripeErrorDetails {
    #[serde(rename = "type")]
    type_: Option<String>,
    code: Option<String>,
    message: Option<String>,
    param: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StripeList<T> {
    data: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct IdOnly {
    id: String,
}

impl StripeClient {
    pub fn new(
        secret_key: String,
        webhook_secret: String,
        success_url: String,
        cancel_url: String,
        portal_return_url: String,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            secret_key,
            webhook_secret,
            success_url,
            cancel_url,
            portal_return_url,
        }
    }

    pub fn from_config(stripe: &Stripe) -> Self {
        Self::new(
            stripe.secret_key.clone(),
            stripe.webhook_secret.clone(),
            stripe.success_url(),
            stripe.cancel_url(),
            stripe.portal_return_url(),
        )
    }

    async fn ensure_success(resp: reqwest::Response, context: &str) -> Result<reqwest::Response> {
        if resp.status().is_success() {
            return Ok(resp);
        }

        let status = resp.status();
        let request_id = resp
            .headers()
            .get("request-id")
            .and_then(|value| value.to_str().ok())
            .map(|value| value.to_string());

        let body = match resp.text().await {
            Ok(text) if !text.is_empty() => text,
            Ok(_) => "<empty response body>".to_string(),
            Err(err) => format!("<failed to read response body: {err}>"),
        };

        let details = serde_json::from_str::<StripeErrorEnvelope>(&body)
            .ok()
            .map(|envelope| envelope.error);

        error!(
            status = %status,
            stripe_request_id = ?request_id,
            stripe_error_type = ?details.as_ref().and_then(|d| d.type_.as_deref()),
            stripe_error_code = ?details.as_ref().and_then(|d| d.code.as_deref()),
            stripe_error_param = ?details.as_ref().and_then(|d| d.param.as_deref()),
            stripe_error_message = ?details.as_ref().and_then(|d| d.message.as_deref()),
            context = %context,
            "stripe_client: api request failed"
        );

        bail!(
            "Stripe API request failed: {} (status {}, request_id={:?})",
            context,
            status,
            request_id
        );
    }

    async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
        context: &str,
    ) -> Result<T> {
        let resp = self
            .http
            .get(format!("{STRIPE_API_BASE}{path}"))
            .header(AUTHORIZATION, format!("Bearer {}", self.secret_key))
            .query(query)
            .send()
            .await?;
        let resp = Self::ensure_success(resp, context).await?;

        Ok(resp.json().await?)
    }

    async fn post_form<T: DeserializeOwned>(
        &self,
        path: &str,
        body: &[(&str, String)],
        context: &str,
    ) -> Result<T> {
        let resp = self
            .http
            .post(format!("{STRIPE_API_BASE}{path}"))
            .header(AUTHORIZATION, format!("Bearer {}", self.secret_key))
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .form(body)
            .send()
            .await?;
        let resp = Self::ensure_success(resp, context).await?;

        Ok(resp.json().await?)
    }

    /// Verifies `stripe-signature` against `now` (unix seconds).
    /// https://stripe.com/docs/webhooks/signatures
    pub fn verify_webhook_signature_at(
        &self,
        payload: &[u8],
        signature_header: &str,
        now: i64,
    ) -> Result<StripeEvent> {
        let mut timestamp: Option<&str> = None;
        let mut signatures: Vec<&str> = Vec::new();

        for part in signature_header.split(',').map(str::trim) {
            if let Some(rest) = part.strip_prefix("t=") {
                timestamp = Some(rest);
            } else if let Some(rest) = part.strip_prefix("v1=") {
                signatures.push(rest);
            }
        }

        let timestamp = timestamp.context("missing timestamp in stripe-signature")?;
        if signatures.is_empty() {
            bail!("missing v1 in stripe-signature");
        }

        let issued_at: i64 = timestamp
            .parse()
            .context("non-numeric timestamp in stripe-signature")?;
        if (now - issued_at).abs() > SIGNATURE_TOLERANCE_SECONDS {
            bail!("stripe-signature timestamp outside tolerance");
        }

        let mut mac = HmacSha256::new_from_slice(self.webhook_secret.as_bytes())?;
        mac.update(timestamp.as_bytes());
        mac.update(b".");
        mac.update(payload);

        let matched = signatures.iter().any(|signature| {
            hex::decode(signature)
                .map(|provided| mac.clone().verify_slice(&provided).is_ok())
                .unwrap_or(false)
        });
        if !matched {
            bail!("invalid webhook signature");
        }

        let event: StripeEvent = serde_json::from_slice(payload)?;
        Ok(event)
    }
}

#[async_trait]
impl StripeGateway for StripeClient {
    fn verify_webhook_signature(
        &self,
        payload: &[u8],
        signature_header: &str,
    ) -> Result<StripeEvent> {
        self.verify_webhook_signature_at(payload, signature_header, Utc::now().timestamp())
    }

    async fn retrieve_subscription(&self, subscription_id: &str) -> Result<StripeSubscription> {
        // https://stripe.com/docs/api/subscriptions/retrieve
        self.get(
            &format!("/subscriptions/{subscription_id}"),
            &[],
            "retrieve subscription",
        )
        .await
    }

    async fn retrieve_customer(&self, customer_id: &str) -> Result<StripeCustomer> {
        // Deleted customers come back as `{ id, deleted: true }`.
        self.get(&format!("/customers/{customer_id}"), &[], "retrieve customer")
            .await
    }

    async fn find_or_create_customer(&self, email: &str, user_id: &str) -> Result<String> {
        let existing: StripeList<IdOnly> = self
            .get(
                "/customers",
                &[("email", email), ("limit", "1")],
                "list customers",
            )
            .await?;

        if let Some(customer) = existing.data.into_iter().next() {
            return Ok(customer.id);
        }

        let metadata_key = format!("metadata[{CUSTOMER_USER_ID_KEY}]");
        let created: IdOnly = self
            .post_form(
                "/customers",
                &[
                    ("email", email.to_string()),
                    (metadata_key.as_str(), user_id.to_string()),
                ],
                "create customer",
            )
            .await?;

        Ok(created.id)
    }

    async fn create_checkout_session(
        &self,
        price_id: &str,
        customer_id: &str,
        user_id: &str,
    ) -> Result<CheckoutSessionModel> {
        #[derive(Deserialize)]
        struct CheckoutResp {
            id: String,
            url: Option<String>,
        }

        let subscription_metadata_key =
            format!("subscription_data[metadata][{CUSTOMER_USER_ID_KEY}]");
        let session_metadata_key = format!("metadata[{CUSTOMER_USER_ID_KEY}]");

        let parsed: CheckoutResp = self
            .post_form(
                "/checkout/sessions",
                &[
                    ("mode", "subscription".to_string()),
                    ("customer", customer_id.to_string()),
                    ("line_items[0][price]", price_id.to_string()),
                    ("line_items[0][quantity]", "1".to_string()),
                    ("success_url", self.success_url.clone()),
                    ("cancel_url", self.cancel_url.clone()),
                    (subscription_metadata_key.as_str(), user_id.to_string()),
                    (session_metadata_key.as_str(), user_id.to_string()),
                ],
                "create checkout session",
            )
            .await?;

        Ok(CheckoutSessionModel {
            id: parsed.id,
            url: parsed.url,
        })
    }

    async fn create_portal_session(&self, customer_id: &str) -> Result<String> {
        #[derive(Deserialize)]
        struct PortalResp {
            url: String,
        }

        let parsed: PortalResp = self
            .post_form(
                "/billing_portal/sessions",
                &[
                    ("customer", customer_id.to_string()),
                    ("return_url", self.portal_return_url.clone()),
                ],
                "create portal session",
            )
            .await?;

        Ok(parsed.url)
    }
}
