pub mod billing;
pub mod enums;
pub mod identity_events;
pub mod stripe;
pub mod token_grants;
pub mod token_ledger;
pub mod webhook_events;
