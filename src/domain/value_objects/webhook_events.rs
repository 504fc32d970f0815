use crate::domain::value_objects::enums::webhook_event_statuses::WebhookEventStatus;

/// What a delivery learned when it tried to take ownership of an event id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookClaim {
    /// First sighting; this delivery recorded the event.
    Claimed,
    /// The event was recorded by an earlier delivery that failed.
    Reclaimed,
    /// Processed already, or another delivery is working on it right now.
    Duplicate(WebhookEventStatus),
}

