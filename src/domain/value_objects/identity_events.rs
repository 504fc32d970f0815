use serde::Deserialize;

use crate::domain::value_objects::enums::identity_event_types::IdentityEventType;

/// Lifecycle event posted by the identity provider. Only the subject id is read;
/// the rest of the user object is ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct IdentityEvent {
    #[serde(rename = "type")]
    pub type_: String,
    pub data: IdentityEventData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IdentityEventData {
    pub id: Option<String>,
}

impl IdentityEvent {
    pub fn event_type(&self) -> IdentityEventType {
        IdentityEventType::from_str(&self.type_)
    }

    pub fn subject_id(&self) -> Option<&str> {
        self.data
            .id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
    }
}

/// Delivery headers of a signed identity webhook.
#[derive(Debug, Clone, PartialEq)]
pub struct IdentityWebhookHeaders {
    pub id: String,
    pub timestamp: String,
    pub signature: String,
}
