use anyhow::Result;
use mockall::automock;

use crate::domain::value_objects::identity_events::{IdentityEvent, IdentityWebhookHeaders};

#[automock]
pub trait IdentityWebhookVerifier: Send + Sync {
    fn verify(&self, headers: &IdentityWebhookHeaders, payload: &[u8]) -> Result<IdentityEvent>;
}
