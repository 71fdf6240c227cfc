use crate::shared::entity::ID;
use serde::{Deserialize, Serialize};

/// What processing a single partner event led to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReconciliationOutcome {
    ActionUnprocessable,
    SubjectUnprocessable,
    EmptySubjectId,
    BeneficiaryNotFound,
    CreateUnknown,
    UpdateUnknown,
    DeleteUnknown,
    AppointmentAdded,
    AppointmentModified,
    AppointmentRemoved,
    SessionNotificationAdded,
    SessionNotificationModified,
    SessionNotificationRemoved,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reconciliation {
    pub outcome: ReconciliationOutcome,
    pub beneficiary_id: Option<ID>,
    pub object_id: Option<String>,
}

impl Reconciliation {
    pub fn new(outcome: ReconciliationOutcome) -> Self {
        Self {
            outcome,
            beneficiary_id: None,
            object_id: None,
        }
    }

    pub fn for_beneficiary(outcome: ReconciliationOutcome, beneficiary_id: &ID) -> Self {
        Self {
            outcome,
            beneficiary_id: Some(*beneficiary_id),
            object_id: None,
        }
    }

    pub fn with_object(mut self, object_id: impl Into<String>) -> Self {
        self.object_id = Some(object_id.into());
        self
    }
}
