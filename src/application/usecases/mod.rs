pub mod billing;
pub mod identity_webhook;
pub mod stripe_webhook;
pub mod token_ledger;
