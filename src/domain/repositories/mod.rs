pub mod user_contents;
pub mod user_subscriptions;
pub mod webhook_events;
