use crate::{
    beneficiary::Beneficiary,
    partner_object::{appointment_status, PartnerAppointment, PartnerObject},
    shared::entity::{Entity, ID},
};
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PartnerObjectType {
    Appointment,
    Session,
}

impl PartnerObjectType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Appointment => "APPOINTMENT",
            Self::Session => "SESSION",
        }
    }
}

impl std::str::FromStr for PartnerObjectType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "APPOINTMENT" => Ok(Self::Appointment),
            "SESSION" => Ok(Self::Session),
            _ => Err(()),
        }
    }
}

/// Reference to the partner object an `Appointment` mirrors
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartnerLink {
    pub object_type: PartnerObjectType,
    pub object_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Presence {
    Present,
    Absent,
    Unknown,
}

impl Presence {
    /// Only the two explicit partner statuses say anything about attendance
    pub fn from_partner_status(status: &str) -> Self {
        match status {
            appointment_status::PRESENT => Self::Present,
            appointment_status::ABSENT => Self::Absent,
            _ => Self::Unknown,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attendee {
    pub beneficiary_id: ID,
    pub presence: Presence,
}

/// An appointment owned locally and kept in line with its partner counterpart
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Appointment {
    pub id: ID,
    pub partner: PartnerLink,
    pub title: String,
    pub comment: Option<String>,
    pub location: Option<String>,
    pub modality: Option<String>,
    pub date: DateTime<Utc>,
    /// Duration in minutes
    pub duration: i64,
    pub attendees: Vec<Attendee>,
    pub advisor_present: bool,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
}

impl Appointment {
    /// Builds a new local appointment for the given beneficiary.
    /// Returns `None` when the partner date cannot be read.
    pub fn from_partner(
        detail: &PartnerAppointment,
        beneficiary: &Beneficiary,
        tz: &Tz,
        now: DateTime<Utc>,
    ) -> Option<Self> {
        let date = detail.start_date(tz)?;
        Some(Self {
            id: Default::default(),
            partner: PartnerLink {
                object_type: PartnerObjectType::Appointment,
                object_id: detail.id.clone(),
            },
            title: detail.title.clone(),
            comment: detail.comment.clone(),
            location: detail.location.clone(),
            modality: detail.modality.clone(),
            date,
            duration: detail.duration_minutes(tz),
            attendees: vec![Attendee {
                beneficiary_id: beneficiary.id,
                presence: Presence::from_partner_status(&detail.status),
            }],
            advisor_present: true,
            created: now,
            updated: now,
        })
    }

    /// Copy of this appointment carrying the partner's current fields.
    /// Returns `None` when the partner date cannot be read.
    pub fn merge_partner(
        &self,
        detail: &PartnerAppointment,
        tz: &Tz,
        now: DateTime<Utc>,
    ) -> Option<Self> {
        let date = detail.start_date(tz)?;
        let presence = Presence::from_partner_status(&detail.status);
        Some(Self {
            title: detail.title.clone(),
            comment: detail.comment.clone(),
            location: detail.location.clone(),
            modality: detail.modality.clone(),
            date,
            duration: detail.duration_minutes(tz),
            attendees: self
                .attendees
                .iter()
                .map(|attendee| Attendee {
                    beneficiary_id: attendee.beneficiary_id,
                    presence,
                })
                .collect(),
            updated: now,
            ..self.clone()
        })
    }

    /// Prefix shared by every reminder job of this appointment
    pub fn reminder_key(&self) -> String {
        format!("appointment:{}", self.id)
    }

    pub fn is_upcoming(&self, now: DateTime<Utc>) -> bool {
        self.date > now
    }
}

impl Entity for Appointment {
    fn id(&self) -> &ID {
        &self.id
    }
}
