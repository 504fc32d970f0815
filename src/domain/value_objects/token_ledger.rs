use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::entities::{
    user_contents::UserContentEntity,
    user_subscriptions::{InsertUserSubscriptionEntity, UserSubscriptionMetadataChangeset},
};

/// Balance a freshly provisioned user starts with. Mirrors the column default.
pub const STARTING_TOKENS: i32 = 10;
/// Credits never push a balance past this value.
pub const TOKEN_CEILING: i32 = 100_000;
/// Largest single credit accepted by the ledger.
pub const MAX_CREDIT_AMOUNT: i32 = 10_000;

/// Result of the guarded decrement-and-insert.
#[derive(Debug, Clone, PartialEq)]
pub enum DebitOutcome {
    Created {
        content: UserContentEntity,
        remaining_tokens: i32,
    },
    InsufficientTokens,
    NotProvisioned,
}

/// Non-token billing fields written by reconciliation. `None` means "leave as is" on
/// update and NULL on insert.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SubscriptionMetadataModel {
    pub stripe_customer_id: Option<String>,
    pub stripe_subscription_id: Option<String>,
    pub stripe_subscription_price_id: Option<String>,
    pub stripe_subscription_status: Option<String>,
    pub stripe_subscription_current_period_end: Option<i64>,
}

impl SubscriptionMetadataModel {
    /// Empty provider identifiers mean "not linked" and are stored as NULL.
    pub fn normalized(self) -> Self {
        Self {
            stripe_customer_id: non_empty(self.stripe_customer_id),
            stripe_subscription_id: non_empty(self.stripe_subscription_id),
            stripe_subscription_price_id: non_empty(self.stripe_subscription_price_id),
            stripe_subscription_status: non_empty(self.stripe_subscription_status),
            stripe_subscription_current_period_end: self.stripe_subscription_current_period_end,
        }
    }

    pub fn to_insert_entity(&self, user_id: &str) -> InsertUserSubscriptionEntity {
        InsertUserSubscriptionEntity {
            user_id: user_id.to_string(),
            stripe_customer_id: self.stripe_customer_id.clone(),
            stripe_subscription_id: self.stripe_subscription_id.clone(),
            stripe_subscription_price_id: self.stripe_subscription_price_id.clone(),
            stripe_subscription_status: self.stripe_subscription_status.clone(),
            stripe_subscription_current_period_end: self.stripe_subscription_current_period_end,
        }
    }

    pub fn to_changeset(&self, updated_at: DateTime<Utc>) -> UserSubscriptionMetadataChangeset {
        UserSubscriptionMetadataChangeset {
            stripe_customer_id: self.stripe_customer_id.clone(),
            stripe_subscription_id: self.stripe_subscription_id.clone(),
            stripe_subscription_price_id: self.stripe_subscription_price_id.clone(),
            stripe_subscription_status: self.stripe_subscription_status.clone(),
            stripe_subscription_current_period_end: self.stripe_subscription_current_period_end,
            updated_at,
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TokenBalanceDto {
    pub token_count: i32,
}

/// `content` stays loosely typed so a non-string body is reported as a validation
/// failure by the ledger instead of a generic extractor rejection.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateContentRequest {
    pub content: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ContentDto {
    pub id: i32,
    pub user_id: String,
    pub content: String,
    pub created_by: String,
    pub is_public: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<UserContentEntity> for ContentDto {
    fn from(value: UserContentEntity) -> Self {
        Self {
            id: value.id,
            user_id: value.user_id,
            content: value.content,
            created_by: value.created_by,
            is_public: value.is_public,
            created_at: value.created_at,
            updated_at: value.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CreatedContentDto {
    pub success: bool,
    pub content: ContentDto,
    pub remaining_tokens: i32,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ContentListDto {
    pub content: Vec<ContentDto>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DeletedContentDto {
    pub success: bool,
    pub deleted_content: ContentDto,
}
