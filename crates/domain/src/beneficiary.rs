use crate::shared::entity::{Entity, ID};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

/// A program participant known both locally and by the partner
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Beneficiary {
    pub id: ID,
    pub partner_id: String,
    pub first_name: String,
    pub last_name: String,
    pub timezone: Option<Tz>,
}

impl Beneficiary {
    pub fn new(partner_id: impl Into<String>) -> Self {
        Self {
            id: Default::default(),
            partner_id: partner_id.into(),
            first_name: Default::default(),
            last_name: Default::default(),
            timezone: None,
        }
    }

    pub fn timezone_or(&self, default: Tz) -> Tz {
        self.timezone.unwrap_or(default)
    }
}

impl Entity for Beneficiary {
    fn id(&self) -> &ID {
        &self.id
    }
}
