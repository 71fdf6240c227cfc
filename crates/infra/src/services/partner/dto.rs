use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use partner_sync_domain::{
    parse_partner_date, EventAction, EventSubject, PartnerAppointment, PartnerEvent,
    PartnerSessionInstance,
};
use serde::Deserialize;
use std::fmt::Display;
use tracing::warn;

/// The partner sends ids either as numbers or as strings
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum PartnerId {
    Number(i64),
    Text(String),
}

impl Display for PartnerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Number(id) => write!(f, "{}", id),
            Self::Text(id) => write!(f, "{}", id),
        }
    }
}

/// Only the identifiant is required: an event missing anything else is still
/// delivered so that it can be acknowledged as unprocessable.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventDto {
    pub identifiant: PartnerId,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub action: Option<String>,
    #[serde(rename = "type", default)]
    pub object_type: Option<String>,
    #[serde(default)]
    pub id_type: Option<PartnerId>,
    #[serde(default)]
    pub id_dossier: Option<PartnerId>,
}

impl EventDto {
    /// `fallback_date` is used when the partner date cannot be read
    pub fn into_event(self, tz: &Tz, fallback_date: DateTime<Utc>) -> PartnerEvent {
        let occurred_at = self
            .date
            .as_deref()
            .and_then(|date| {
                DateTime::parse_from_rfc3339(date)
                    .map(|date| date.with_timezone(&Utc))
                    .ok()
                    .or_else(|| parse_partner_date(date, tz))
            })
            .unwrap_or(fallback_date);
        let action = match &self.id_dossier {
            Some(_) => EventAction::from_partner(self.action.as_deref().unwrap_or_default()),
            None => EventAction::Unprocessable,
        };
        PartnerEvent {
            id: self.identifiant.to_string(),
            beneficiary_partner_id: self
                .id_dossier
                .map(|id| id.to_string())
                .unwrap_or_default(),
            action,
            subject: EventSubject::from_partner(self.object_type.as_deref().unwrap_or_default()),
            subject_id: self.id_type.map(|id| id.to_string()),
            occurred_at,
        }
    }
}

/// Decodes a listing element by element. Elements without a readable
/// identifiant cannot be acknowledged and are dropped.
pub fn parse_events(
    items: Vec<serde_json::Value>,
    tz: &Tz,
    fallback_date: DateTime<Utc>,
) -> Vec<PartnerEvent> {
    items
        .into_iter()
        .filter_map(|item| match serde_json::from_value::<EventDto>(item.clone()) {
            Ok(dto) => Some(dto.into_event(tz, fallback_date)),
            Err(e) => {
                warn!(
                    "Skipping partner event that could not be read: {}. Error message: {:?}",
                    item, e
                );
                None
            }
        })
        .collect()
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppointmentDto {
    pub id: PartnerId,
    #[serde(default)]
    pub id_dossier: Option<PartnerId>,
    pub date_heure_debut: String,
    #[serde(default)]
    pub date_heure_fin: Option<String>,
    #[serde(default)]
    pub objet: Option<String>,
    #[serde(default)]
    pub commentaire: Option<String>,
    pub statut: String,
    #[serde(default)]
    pub lieu: Option<String>,
    #[serde(default)]
    pub modalite: Option<String>,
}

impl AppointmentDto {
    pub fn into_appointment(self, beneficiary_partner_id: &str) -> PartnerAppointment {
        PartnerAppointment {
            id: self.id.to_string(),
            beneficiary_partner_id: self
                .id_dossier
                .map(|id| id.to_string())
                .unwrap_or_else(|| beneficiary_partner_id.to_string()),
            starts_at: self.date_heure_debut,
            ends_at: self.date_heure_fin,
            title: self.objet.unwrap_or_default(),
            comment: self.commentaire,
            location: self.lieu,
            modality: self.modalite,
            status: self.statut,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionInstanceDto {
    pub id: PartnerId,
    pub id_session: PartnerId,
    pub id_dossier: PartnerId,
    pub date_heure_debut: String,
    #[serde(default)]
    pub date_heure_fin: Option<String>,
    #[serde(default)]
    pub nom: Option<String>,
    #[serde(default)]
    pub lieu: Option<String>,
    #[serde(default)]
    pub commentaire: Option<String>,
    pub statut: String,
}

impl From<SessionInstanceDto> for PartnerSessionInstance {
    fn from(dto: SessionInstanceDto) -> Self {
        Self {
            id: dto.id.to_string(),
            session_id: dto.id_session.to_string(),
            beneficiary_partner_id: dto.id_dossier.to_string(),
            starts_at: dto.date_heure_debut,
            ends_at: dto.date_heure_fin,
            name: dto.nom,
            location: dto.lieu,
            comment: dto.commentaire,
            status: dto.statut,
        }
    }
}
