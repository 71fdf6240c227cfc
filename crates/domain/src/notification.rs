use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AppointmentNotification {
    New,
    Updated,
    Deleted,
    Reminder,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionNotification {
    Enrollment,
    Modification,
    #[serde(rename_all = "camelCase")]
    Withdrawal {
        starts_at: DateTime<Utc>,
    },
    Reminder,
}
