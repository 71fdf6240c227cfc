use crate::{partner_event::PartnerEvent, shared::entity::ID};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Reminders are sent this many days before the object starts
pub const REMINDER_DAYS_BEFORE: [i64; 2] = [7, 1];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobType {
    PollPartnerEvents,
    ProcessPartnerEvent,
    AppointmentReminder,
    SessionReminder,
}

impl JobType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PollPartnerEvents => "POLL_PARTNER_EVENTS",
            Self::ProcessPartnerEvent => "PROCESS_PARTNER_EVENT",
            Self::AppointmentReminder => "APPOINTMENT_REMINDER",
            Self::SessionReminder => "SESSION_REMINDER",
        }
    }
}

impl std::str::FromStr for JobType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "POLL_PARTNER_EVENTS" => Ok(Self::PollPartnerEvents),
            "PROCESS_PARTNER_EVENT" => Ok(Self::ProcessPartnerEvent),
            "APPOINTMENT_REMINDER" => Ok(Self::AppointmentReminder),
            "SESSION_REMINDER" => Ok(Self::SessionReminder),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Pending,
    Running,
    Done,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Running => "RUNNING",
            Self::Done => "DONE",
        }
    }
}

impl std::str::FromStr for JobStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(Self::Pending),
            "RUNNING" => Ok(Self::Running),
            "DONE" => Ok(Self::Done),
            _ => Err(()),
        }
    }
}

/// Everything a reminder needs to be sent without the original event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionReminder {
    pub instance_id: String,
    pub beneficiary_partner_id: String,
    pub session_id: String,
    pub starts_at: DateTime<Utc>,
}

impl SessionReminder {
    pub fn key_for(instance_id: &str) -> String {
        format!("instance-session:{}", instance_id)
    }

    pub fn reminder_key(&self) -> String {
        Self::key_for(&self.instance_id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "content", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobPayload {
    PollPartnerEvents,
    ProcessPartnerEvent(PartnerEvent),
    #[serde(rename_all = "camelCase")]
    AppointmentReminder {
        appointment_id: ID,
    },
    SessionReminder(SessionReminder),
}

impl JobPayload {
    pub fn job_type(&self) -> JobType {
        match self {
            Self::PollPartnerEvents => JobType::PollPartnerEvents,
            Self::ProcessPartnerEvent(_) => JobType::ProcessPartnerEvent,
            Self::AppointmentReminder { .. } => JobType::AppointmentReminder,
            Self::SessionReminder(_) => JobType::SessionReminder,
        }
    }
}

/// A unit of deferred work, unique by `key`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub key: String,
    pub run_at: DateTime<Utc>,
    pub payload: JobPayload,
    pub status: JobStatus,
    pub attempts: i32,
    pub started_at: Option<DateTime<Utc>>,
    pub updated: DateTime<Utc>,
}

impl Job {
    pub fn new(key: impl Into<String>, run_at: DateTime<Utc>, payload: JobPayload) -> Self {
        Self {
            key: key.into(),
            run_at,
            payload,
            status: JobStatus::Pending,
            attempts: 0,
            started_at: None,
            updated: run_at,
        }
    }

    pub fn job_type(&self) -> JobType {
        self.payload.job_type()
    }

    /// Whether this job belongs to the reminder group identified by `prefix`
    pub fn key_matches_prefix(&self, prefix: &str) -> bool {
        self.key == prefix
            || self
                .key
                .strip_prefix(prefix)
                .map(|rest| rest.starts_with(':'))
                .unwrap_or(false)
    }
}

/// Returns `(days_before, remind_at)` for every reminder that is still ahead
pub fn plan_reminders(starts_at: DateTime<Utc>, now: DateTime<Utc>) -> Vec<(i64, DateTime<Utc>)> {
    REMINDER_DAYS_BEFORE
        .iter()
        .filter(|days| starts_at - now > Duration::days(**days))
        .map(|days| (*days, starts_at - Duration::days(*days)))
        .collect()
}

/// Summary of one job execution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobRun {
    pub job_type: JobType,
    pub started_at: DateTime<Utc>,
    pub succeeded: bool,
    pub result: serde_json::Value,
    pub error_count: i32,
    pub execution_time_ms: i64,
    pub error: Option<String>,
}
