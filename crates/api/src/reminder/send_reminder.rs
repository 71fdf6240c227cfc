use crate::shared::usecase::UseCase;
use partner_sync_domain::{
    AppointmentNotification, PartnerObject, SessionNotification, SessionReminder, ID,
};
use partner_sync_infra::{PartnerError, PartnerSyncContext};
use serde::Serialize;

#[derive(Debug, Clone)]
pub enum Reminder {
    Appointment { appointment_id: ID },
    Session(SessionReminder),
}

/// Reminds a beneficiary of an upcoming appointment or session
#[derive(Debug)]
pub struct SendReminderUseCase {
    pub reminder: Reminder,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReminderOutcome {
    AppointmentNotFound,
    BeneficiaryNotFound,
    SessionNotNotifiable,
    ReminderSent,
}

#[derive(Debug)]
pub enum UseCaseError {
    PartnerUnavailable(PartnerError),
    StorageError(anyhow::Error),
    NotificationFailed(anyhow::Error),
}

impl SendReminderUseCase {
    async fn remind_appointment(
        &self,
        appointment_id: &ID,
        ctx: &PartnerSyncContext,
    ) -> Result<ReminderOutcome, UseCaseError> {
        let appointment = match ctx
            .repos
            .appointments
            .find(appointment_id)
            .await
            .map_err(UseCaseError::StorageError)?
        {
            Some(appointment) => appointment,
            None => return Ok(ReminderOutcome::AppointmentNotFound),
        };

        ctx.services
            .notifications
            .notify_appointment(&appointment, AppointmentNotification::Reminder)
            .await
            .map_err(UseCaseError::NotificationFailed)?;
        Ok(ReminderOutcome::ReminderSent)
    }

    async fn remind_session(
        &self,
        reminder: &SessionReminder,
        ctx: &PartnerSyncContext,
    ) -> Result<ReminderOutcome, UseCaseError> {
        let beneficiary = match ctx
            .repos
            .beneficiaries
            .find_by_partner_id(&reminder.beneficiary_partner_id)
            .await
            .map_err(UseCaseError::StorageError)?
        {
            Some(beneficiary) => beneficiary,
            None => return Ok(ReminderOutcome::BeneficiaryNotFound),
        };

        // The enrollment may have changed since the reminder was planned
        let instance = ctx
            .services
            .partner_details
            .get_session_instance_detail(&reminder.instance_id, &beneficiary.partner_id)
            .await
            .map_err(UseCaseError::PartnerUnavailable)?
            .found();
        let tz = beneficiary.timezone_or(ctx.config.default_timezone);
        match instance {
            Some(instance)
                if instance.is_status_notifiable() && instance.is_upcoming(&tz, ctx.sys.now()) =>
            {
                ctx.services
                    .notifications
                    .notify_session(
                        &instance.session_id,
                        &beneficiary,
                        SessionNotification::Reminder,
                    )
                    .await
                    .map_err(UseCaseError::NotificationFailed)?;
                Ok(ReminderOutcome::ReminderSent)
            }
            _ => Ok(ReminderOutcome::SessionNotNotifiable),
        }
    }
}

#[async_trait::async_trait(?Send)]
impl UseCase for SendReminderUseCase {
    type Response = ReminderOutcome;

    type Errors = UseCaseError;

    async fn execute(&mut self, ctx: &PartnerSyncContext) -> Result<Self::Response, Self::Errors> {
        match &self.reminder {
            Reminder::Appointment { appointment_id } => {
                self.remind_appointment(appointment_id, ctx).await
            }
            Reminder::Session(reminder) => self.remind_session(reminder, ctx).await,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::shared::usecase::execute;
    use chrono::{Duration, Utc};
    use partner_sync_domain::{
        session_status, Appointment, Beneficiary, PartnerAppointment, PartnerSessionInstance,
        PARTNER_DATE_FORMAT,
    };
    use partner_sync_infra::{InMemoryNotificationService, InMemoryPartner, SentNotification};
    use std::sync::Arc;

    struct TestContext {
        ctx: PartnerSyncContext,
        partner: Arc<InMemoryPartner>,
        notifications: Arc<InMemoryNotificationService>,
        beneficiary: Beneficiary,
    }

    async fn setup() -> TestContext {
        let partner = Arc::new(InMemoryPartner::new());
        let notifications = Arc::new(InMemoryNotificationService::new());
        let mut ctx = PartnerSyncContext::create_inmemory()
            .with_partner(partner.clone())
            .with_notifications(notifications.clone());
        ctx.config.default_timezone = chrono_tz::UTC;
        let beneficiary = Beneficiary::new("123456");
        ctx.repos.beneficiaries.insert(&beneficiary).await.unwrap();
        TestContext {
            ctx,
            partner,
            notifications,
            beneficiary,
        }
    }

    fn session_reminder() -> SessionReminder {
        SessionReminder {
            instance_id: "34".into(),
            beneficiary_partner_id: "123456".into(),
            session_id: "7".into(),
            starts_at: Utc::now() + Duration::days(1),
        }
    }

    fn instance(status: &str) -> PartnerSessionInstance {
        PartnerSessionInstance {
            id: "34".into(),
            session_id: "7".into(),
            beneficiary_partner_id: "123456".into(),
            starts_at: (Utc::now() + Duration::days(1))
                .format(PARTNER_DATE_FORMAT)
                .to_string(),
            ends_at: None,
            name: None,
            location: None,
            comment: None,
            status: status.into(),
        }
    }

    async fn remind(t: &TestContext, reminder: Reminder) -> ReminderOutcome {
        execute(SendReminderUseCase { reminder }, &t.ctx)
            .await
            .unwrap()
    }

    #[actix_web::test]
    async fn reminds_of_existing_appointments() {
        let t = setup().await;
        let detail = PartnerAppointment {
            id: "42".into(),
            beneficiary_partner_id: "123456".into(),
            starts_at: (Utc::now() + Duration::days(1))
                .format(PARTNER_DATE_FORMAT)
                .to_string(),
            ends_at: None,
            title: "Point mensuel".into(),
            comment: None,
            location: None,
            modality: None,
            status: "Planifié".into(),
        };
        let appointment =
            Appointment::from_partner(&detail, &t.beneficiary, &chrono_tz::UTC, Utc::now())
                .unwrap();
        t.ctx.repos.appointments.insert(&appointment).await.unwrap();

        let outcome = remind(
            &t,
            Reminder::Appointment {
                appointment_id: appointment.id,
            },
        )
        .await;

        assert_eq!(outcome, ReminderOutcome::ReminderSent);
        assert_eq!(
            t.notifications.sent(),
            vec![SentNotification::Appointment {
                appointment_id: appointment.id,
                kind: AppointmentNotification::Reminder,
            }]
        );
    }

    #[actix_web::test]
    async fn skips_deleted_appointments() {
        let t = setup().await;

        let outcome = remind(
            &t,
            Reminder::Appointment {
                appointment_id: ID::new(),
            },
        )
        .await;

        assert_eq!(outcome, ReminderOutcome::AppointmentNotFound);
        assert!(t.notifications.sent().is_empty());
    }

    #[actix_web::test]
    async fn reminds_of_prescribed_sessions() {
        let t = setup().await;
        t.partner
            .put_session_instance(instance(session_status::PRESCRIBED));

        let outcome = remind(&t, Reminder::Session(session_reminder())).await;

        assert_eq!(outcome, ReminderOutcome::ReminderSent);
        assert_eq!(
            t.notifications.sent(),
            vec![SentNotification::Session {
                session_id: "7".into(),
                beneficiary_id: t.beneficiary.id,
                kind: SessionNotification::Reminder,
            }]
        );
    }

    #[actix_web::test]
    async fn skips_sessions_that_are_no_longer_prescribed() {
        let t = setup().await;
        assert_eq!(
            remind(&t, Reminder::Session(session_reminder())).await,
            ReminderOutcome::SessionNotNotifiable
        );

        t.partner.put_session_instance(instance(session_status::DONE));
        assert_eq!(
            remind(&t, Reminder::Session(session_reminder())).await,
            ReminderOutcome::SessionNotNotifiable
        );

        let mut reminder = session_reminder();
        reminder.beneficiary_partner_id = "unknown".into();
        assert_eq!(
            remind(&t, Reminder::Session(reminder)).await,
            ReminderOutcome::BeneficiaryNotFound
        );
        assert!(t.notifications.sent().is_empty());
    }
}
