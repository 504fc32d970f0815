use std::fmt::Display;

use serde::{Deserialize, Serialize};

/// Billing status as reported by Stripe. Values Stripe adds later land in `Unknown`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum StripeSubscriptionStatus {
    Active,
    Trialing,
    PastDue,
    Unpaid,
    Incomplete,
    IncompleteExpired,
    Paused,
    Canceled,
    Unknown(String),
}

impl Display for StripeSubscriptionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let status = match self {
            StripeSubscriptionStatus::Active => "active",
            StripeSubscriptionStatus::Trialing => "trialing",
            StripeSubscriptionStatus::PastDue => "past_due",
            StripeSubscriptionStatus::Unpaid => "unpaid",
            StripeSubscriptionStatus::Incomplete => "incomplete",
            StripeSubscriptionStatus::IncompleteExpired => "incomplete_expired",
            StripeSubscriptionStatus::Paused => "paused",
            StripeSubscriptionStatus::Canceled => "canceled",
            StripeSubscriptionStatus::Unknown(raw) => raw.as_str(),
        };
        write!(f, "{}", status)
    }
}

impl StripeSubscriptionStatus {
    pub fn from_str(value: &str) -> Self {
        match value {
            "active" => StripeSubscriptionStatus::Active,
            "trialing" => StripeSubscriptionStatus::Trialing,
            "past_due" => StripeSubscriptionStatus::PastDue,
            "unpaid" => StripeSubscriptionStatus::Unpaid,
            "incomplete" => StripeSubscriptionStatus::Incomplete,
            "incomplete_expired" => StripeSubscriptionStatus::IncompleteExpired,
            "paused" => StripeSubscriptionStatus::Paused,
            "canceled" => StripeSubscriptionStatus::Canceled,
            other => StripeSubscriptionStatus::Unknown(other.to_string()),
        }
    }

    /// Whether a subscription in this state still belongs to the customer, so a
    /// second checkout would double-bill them.
    pub fn blocks_new_checkout(&self) -> bool {
        !matches!(
            self,
            StripeSubscriptionStatus::Canceled | StripeSubscriptionStatus::IncompleteExpired
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_and_unknown_statuses() {
        assert_eq!(
            StripeSubscriptionStatus::from_str("past_due"),
            StripeSubscriptionStatus::PastDue
        );
        let unknown = StripeSubscriptionStatus::from_str("on_hold");
        assert_eq!(unknown.to_string(), "on_hold");
    }

    #[test]
    fn only_finished_subscriptions_allow_checkout() {
        assert!(StripeSubscriptionStatus::Active.blocks_new_checkout());
        assert!(StripeSubscriptionStatus::PastDue.blocks_new_checkout());
        assert!(!StripeSubscriptionStatus::Canceled.blocks_new_checkout());
        assert!(!StripeSubscriptionStatus::IncompleteExpired.blocks_new_checkout());
    }
}
