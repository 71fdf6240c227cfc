use super::INotificationService;
use partner_sync_domain::{
    Appointment, AppointmentNotification, Beneficiary, SessionNotification, ID,
};
use std::sync::{Mutex, PoisonError};

#[derive(Debug, Clone, PartialEq)]
pub enum SentNotification {
    Appointment {
        appointment_id: ID,
        kind: AppointmentNotification,
    },
    Session {
        session_id: String,
        beneficiary_id: ID,
        kind: SessionNotification,
    },
}

/// Records every notification instead of sending it
pub struct InMemoryNotificationService {
    sent: Mutex<Vec<SentNotification>>,
}

impl InMemoryNotificationService {
    pub fn new() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
        }
    }

    pub fn sent(&self) -> Vec<SentNotification> {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn record(&self, notification: SentNotification) {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(notification);
    }
}

impl Default for InMemoryNotificationService {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl INotificationService for InMemoryNotificationService {
    async fn notify_appointment(
        &self,
        appointment: &Appointment,
        kind: AppointmentNotification,
    ) -> anyhow::Result<()> {
        self.record(SentNotification::Appointment {
            appointment_id: appointment.id,
            kind,
        });
        Ok(())
    }

    async fn notify_session(
        &self,
        session_id: &str,
        beneficiary: &Beneficiary,
        kind: SessionNotification,
    ) -> anyhow::Result<()> {
        self.record(SentNotification::Session {
            session_id: session_id.to_string(),
            beneficiary_id: beneficiary.id,
            kind,
        });
        Ok(())
    }
}
