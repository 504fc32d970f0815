use std::collections::HashMap;

use serde::Deserialize;

/// Customer metadata key carrying the identity-provider subject.
pub const CUSTOMER_USER_ID_KEY: &str = "userId";
/// Invoice billing reason Stripe uses for a recurring renewal charge.
pub const RENEWAL_BILLING_REASON: &str = "subscription_cycle";

#[derive(Debug, Clone, Deserialize)]
pub struct StripeEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub type_: String,
    pub created: Option<i64>,
    pub livemode: Option<bool>,
    pub data: StripeEventData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeEventData {
    pub object: serde_json::Value,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeCheckoutSession {
    pub id: Option<String>,
    pub mode: Option<String>,
    pub subscription: Option<String>,
    pub customer: Option<String>,
    pub metadata: Option<HashMap<String, String>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeSubscription {
    pub id: String,
    pub customer: Option<String>,
    pub status: Option<String>,
    pub current_period_end: Option<i64>,
    #[serde(default)]
    pub items: StripeSubscriptionItems,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct StripeSubscriptionItems {
    pub data: Vec<StripeSubscriptionItem>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeSubscriptionItem {
    pub price: Option<StripePrice>,
    pub current_period_end: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripePrice {
    pub id: String,
}

impl StripeSubscription {
    pub fn price_id(&self) -> Option<String> {
        self.items
            .data
            .first()
            .and_then(|item| item.price.as_ref())
            .map(|price| price.id.clone())
            .filter(|id| !id.is_empty())
    }

    /// Newer API versions only report the period on the subscription items.
    pub fn period_end(&self) -> Option<i64> {
        self.current_period_end.or_else(|| {
            self.items
                .data
                .first()
                .and_then(|item| item.current_period_end)
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeCustomer {
    pub id: String,
    #[serde(default)]
    pub deleted: bool,
    pub email: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl StripeCustomer {
    pub fn user_id(&self) -> Option<String> {
        self.metadata
            .get(CUSTOMER_USER_ID_KEY)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeInvoice {
    pub id: Option<String>,
    pub customer: Option<String>,
    pub billing_reason: Option<String>,
    pub subscription: Option<String>,
    pub parent: Option<StripeInvoiceParent>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeInvoiceParent {
    pub subscription_details: Option<StripeInvoiceSubscriptionDetails>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeInvoiceSubscriptionDetails {
    pub subscription: Option<String>,
}

impl StripeInvoice {
    /// Falls back to `parent.subscription_details` where newer API versions put it.
    pub fn subscription_id(&self) -> Option<String> {
        self.subscription
            .clone()
            .or_else(|| {
                self.parent
                    .as_ref()
                    .and_then(|parent| parent.subscription_details.as_ref())
                    .and_then(|details| details.subscription.clone())
            })
            .filter(|id| !id.is_empty())
    }

    pub fn is_renewal(&self) -> bool {
        self.billing_reason.as_deref() == Some(RENEWAL_BILLING_REASON)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CheckoutSessionModel {
    pub id: String,
    pub url: Option<String>,
}
