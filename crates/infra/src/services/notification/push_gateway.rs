use super::INotificationService;
use crate::config::PushGatewayConfig;
use partner_sync_domain::{
    Appointment, AppointmentNotification, Beneficiary, SessionNotification, ID,
};
use reqwest::Client;
use serde::Serialize;
use tracing::{error, info};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase", tag = "object")]
enum PushMessage<'a> {
    #[serde(rename_all = "camelCase")]
    Appointment {
        appointment_id: &'a ID,
        recipients: Vec<&'a ID>,
        kind: AppointmentNotification,
    },
    #[serde(rename_all = "camelCase")]
    Session {
        session_id: &'a str,
        recipients: Vec<&'a ID>,
        kind: &'a SessionNotification,
    },
}

/// Forwards notifications to the push gateway, or only logs them when none is configured
pub struct PushGatewayNotificationService {
    client: Client,
    gateway: Option<PushGatewayConfig>,
}

impl PushGatewayNotificationService {
    pub fn new(gateway: Option<PushGatewayConfig>) -> Self {
        Self {
            client: Client::new(),
            gateway,
        }
    }

    async fn push(&self, message: &PushMessage<'_>) -> anyhow::Result<()> {
        let gateway = match &self.gateway {
            Some(gateway) => gateway,
            None => {
                info!("Push gateway not configured, skipping: {:?}", message);
                return Ok(());
            }
        };

        let res = self
            .client
            .post(&gateway.url)
            .header("partner-sync-push-key", &gateway.key)
            .json(message)
            .send()
            .await
            .map_err(|e| {
                error!("Error sending push notification: {:?}", e);
                anyhow::Error::new(e)
            })?;
        if !res.status().is_success() {
            anyhow::bail!("Push gateway responded with status {}", res.status());
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl INotificationService for PushGatewayNotificationService {
    async fn notify_appointment(
        &self,
        appointment: &Appointment,
        kind: AppointmentNotification,
    ) -> anyhow::Result<()> {
        self.push(&PushMessage::Appointment {
            appointment_id: &appointment.id,
            recipients: appointment
                .attendees
                .iter()
                .map(|attendee| &attendee.beneficiary_id)
                .collect(),
            kind,
        })
        .await
    }

    async fn notify_session(
        &self,
        session_id: &str,
        beneficiary: &Beneficiary,
        kind: SessionNotification,
    ) -> anyhow::Result<()> {
        self.push(&PushMessage::Session {
            session_id,
            recipients: vec![&beneficiary.id],
            kind: &kind,
        })
        .await
    }
}
