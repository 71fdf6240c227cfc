use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventAction {
    Create,
    Update,
    Delete,
    Unprocessable,
}

impl EventAction {
    /// Maps the raw action sent by the partner, anything unknown is unprocessable
    pub fn from_partner(action: &str) -> Self {
        match action {
            "CREATE" => Self::Create,
            "UPDATE" => Self::Update,
            "DELETE" => Self::Delete,
            _ => Self::Unprocessable,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventSubject {
    Appointment,
    Session,
    Unprocessable,
}

impl EventSubject {
    pub fn from_partner(subject_type: &str) -> Self {
        match subject_type {
            "RDV" => Self::Appointment,
            "SESSION" => Self::Session,
            _ => Self::Unprocessable,
        }
    }
}

/// A change notification emitted by the partner about one of its objects.
///
/// Events only live for the duration of a polling batch and inside the
/// processing job created for them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartnerEvent {
    pub id: String,
    pub beneficiary_partner_id: String,
    pub action: EventAction,
    pub subject: EventSubject,
    pub subject_id: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Two events with the same key describe the same kind of change on the same object
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DedupKey<'a> {
    pub beneficiary_partner_id: &'a str,
    pub subject: EventSubject,
    pub action: EventAction,
    pub subject_id: Option<&'a str>,
}

impl PartnerEvent {
    pub fn dedup_key(&self) -> DedupKey<'_> {
        DedupKey {
            beneficiary_partner_id: &self.beneficiary_partner_id,
            subject: self.subject,
            action: self.action,
            subject_id: self.subject_id.as_deref(),
        }
    }

    /// The id of the partner object, `None` when missing or blank
    pub fn subject_id(&self) -> Option<&str> {
        self.subject_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
    }

    pub fn job_key(&self) -> String {
        format!("partner-event:{}", self.id)
    }
}
