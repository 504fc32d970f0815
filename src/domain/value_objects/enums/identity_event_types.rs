use std::fmt::Display;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentityEventType {
    SubjectCreated,
    SubjectUpdated,
    SubjectDeleted,
    Other(String),
}

impl Display for IdentityEventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let event_type = match self {
            IdentityEventType::SubjectCreated => "user.created",
            IdentityEventType::SubjectUpdated => "user.updated",
            IdentityEventType::SubjectDeleted => "user.deleted",
            IdentityEventType::Other(raw) => raw.as_str(),
        };
        write!(f, "{}", event_type)
    }
}

impl IdentityEventType {
    pub fn from_str(value: &str) -> Self {
        match value {
            "user.created" => IdentityEventType::SubjectCreated,
            "user.updated" => IdentityEventType::SubjectUpdated,
            "user.deleted" => IdentityEventType::SubjectDeleted,
            other => IdentityEventType::Other(other.to_string()),
        }
    }
}
