pub mod identity_event_types;
pub mod stripe_subscription_statuses;
pub mod webhook_event_statuses;
