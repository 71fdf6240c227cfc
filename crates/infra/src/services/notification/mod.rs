mod inmemory;
mod push_gateway;

pub use inmemory::{InMemoryNotificationService, SentNotification};
use partner_sync_domain::{Appointment, AppointmentNotification, Beneficiary, SessionNotification};
pub use push_gateway::PushGatewayNotificationService;

/// Pushes lifecycle changes to beneficiaries
#[async_trait::async_trait]
pub trait INotificationService: Send + Sync {
    /// Notifies every attendee of the appointment
    async fn notify_appointment(
        &self,
        appointment: &Appointment,
        kind: AppointmentNotification,
    ) -> anyhow::Result<()>;

    async fn notify_session(
        &self,
        session_id: &str,
        beneficiary: &Beneficiary,
        kind: SessionNotification,
    ) -> anyhow::Result<()>;
}
