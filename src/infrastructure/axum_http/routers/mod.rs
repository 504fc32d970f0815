pub mod billing;
pub mod contents;
pub mod identity_webhook;
pub mod stripe_webhook;
pub mod tokens;
