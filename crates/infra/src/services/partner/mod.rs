mod dto;
mod http;
mod inmemory;

pub use http::PartnerHttpClient;
pub use inmemory::InMemoryPartner;
use partner_sync_domain::{PartnerAppointment, PartnerEvent, PartnerSessionInstance};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PartnerError {
    #[error("Partner request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("Partner responded with status {status}: {body}")]
    UnexpectedStatus { status: u16, body: String },
    #[error("Partner response could not be read: {0}")]
    Decode(String),
}

/// A partner object that no longer exists is an expected answer, not an error
#[derive(Debug, Clone, PartialEq)]
pub enum PartnerLookup<T> {
    Found(T),
    NotFound,
}

impl<T> PartnerLookup<T> {
    pub fn found(self) -> Option<T> {
        match self {
            Self::Found(value) => Some(value),
            Self::NotFound => None,
        }
    }
}

impl<T> From<Option<T>> for PartnerLookup<T> {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(value) => Self::Found(value),
            None => Self::NotFound,
        }
    }
}

/// The partner's queue of change events
#[async_trait::async_trait]
pub trait IPartnerEventSource: Send + Sync {
    async fn list_pending_events(&self) -> Result<Vec<PartnerEvent>, PartnerError>;
    /// Marks the event as seen so that the partner stops delivering it
    async fn acknowledge(&self, event: &PartnerEvent) -> Result<(), PartnerError>;
}

/// The partner's current view of its objects
#[async_trait::async_trait]
pub trait IPartnerDetailSource: Send + Sync {
    async fn get_appointment_detail(
        &self,
        beneficiary_partner_id: &str,
        object_id: &str,
    ) -> Result<PartnerLookup<PartnerAppointment>, PartnerError>;

    async fn get_session_instance_detail(
        &self,
        object_id: &str,
        beneficiary_partner_id: &str,
    ) -> Result<PartnerLookup<PartnerSessionInstance>, PartnerError>;
}
