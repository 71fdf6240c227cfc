use crate::shared::usecase::UseCase;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use partner_sync_domain::{
    Appointment, AppointmentNotification, Beneficiary, EventAction, EventSubject,
    PartnerAppointment, PartnerEvent, PartnerObject, PartnerObjectType, PartnerSessionInstance,
    Reconciliation, ReconciliationOutcome, SessionNotification, SessionReminder,
};
use partner_sync_infra::{PartnerError, PartnerSyncContext};
use tracing::error;

/// Applies one partner event to the local state
#[derive(Debug)]
pub struct ReconcilePartnerEventUseCase {
    pub event: PartnerEvent,
}

#[derive(Debug)]
pub enum UseCaseError {
    PartnerUnavailable(PartnerError),
    StorageError(anyhow::Error),
}

#[async_trait::async_trait(?Send)]
impl UseCase for ReconcilePartnerEventUseCase {
    type Response = Reconciliation;

    type Errors = UseCaseError;

    async fn execute(&mut self, ctx: &PartnerSyncContext) -> Result<Self::Response, Self::Errors> {
        if self.event.action == EventAction::Unprocessable {
            return Ok(Reconciliation::new(
                ReconciliationOutcome::ActionUnprocessable,
            ));
        }
        if self.event.subject == EventSubject::Unprocessable {
            return Ok(Reconciliation::new(
                ReconciliationOutcome::SubjectUnprocessable,
            ));
        }
        let object_id = match self.event.subject_id() {
            Some(id) => id.to_string(),
            None => return Ok(Reconciliation::new(ReconciliationOutcome::EmptySubjectId)),
        };

        let beneficiary = match ctx
            .repos
            .beneficiaries
            .find_by_partner_id(&self.event.beneficiary_partner_id)
            .await
            .map_err(UseCaseError::StorageError)?
        {
            Some(beneficiary) => beneficiary,
            None => {
                return Ok(Reconciliation::new(
                    ReconciliationOutcome::BeneficiaryNotFound,
                ))
            }
        };

        let reconciler = Reconciler {
            ctx,
            tz: beneficiary.timezone_or(ctx.config.default_timezone),
            beneficiary,
            object_id,
            now: ctx.sys.now(),
        };

        match self.event.subject {
            EventSubject::Appointment => reconciler.appointment(self.event.action).await,
            _ => reconciler.session(self.event.action).await,
        }
    }
}

struct Reconciler<'a> {
    ctx: &'a PartnerSyncContext,
    beneficiary: Beneficiary,
    tz: Tz,
    object_id: String,
    now: DateTime<Utc>,
}

impl<'a> Reconciler<'a> {
    fn outcome(&self, outcome: ReconciliationOutcome) -> Reconciliation {
        Reconciliation::for_beneficiary(outcome, &self.beneficiary.id)
    }

    async fn appointment(&self, action: EventAction) -> Result<Reconciliation, UseCaseError> {
        let detail = self
            .ctx
            .services
            .partner_details
            .get_appointment_detail(&self.beneficiary.partner_id, &self.object_id)
            .await
            .map_err(UseCaseError::PartnerUnavailable)?
            .found();
        let existing = self
            .ctx
            .repos
            .appointments
            .find_by_partner(PartnerObjectType::Appointment, &self.object_id)
            .await
            .map_err(UseCaseError::StorageError)?;

        match (action, detail, existing) {
            (EventAction::Create, None, _) => {
                Ok(self.outcome(ReconciliationOutcome::CreateUnknown))
            }
            (EventAction::Update, None, _) => {
                Ok(self.outcome(ReconciliationOutcome::UpdateUnknown))
            }
            (EventAction::Create | EventAction::Update, Some(detail), None) => {
                self.create_appointment(&detail).await
            }
            // A second sighting of a known object never duplicates it
            (EventAction::Create | EventAction::Update, Some(detail), Some(existing)) => {
                self.update_appointment(&detail, existing).await
            }
            (EventAction::Delete, _, None) => {
                Ok(self.outcome(ReconciliationOutcome::DeleteUnknown))
            }
            (EventAction::Delete, detail, Some(existing)) => {
                self.delete_appointment(detail.as_ref(), existing).await
            }
            (EventAction::Unprocessable, _, _) => Ok(self.outcome(
                ReconciliationOutcome::ActionUnprocessable,
            )),
        }
    }

    async fn create_appointment(
        &self,
        detail: &PartnerAppointment,
    ) -> Result<Reconciliation, UseCaseError> {
        if !detail.is_recoverable(&self.tz, self.now) {
            return Ok(self.outcome(ReconciliationOutcome::CreateUnknown));
        }
        let appointment =
            match Appointment::from_partner(detail, &self.beneficiary, &self.tz, self.now) {
                Some(appointment) => appointment,
                None => return Ok(self.outcome(ReconciliationOutcome::CreateUnknown)),
            };

        self.ctx
            .repos
            .appointments
            .insert(&appointment)
            .await
            .map_err(UseCaseError::StorageError)?;
        self.schedule_appointment_reminders(&appointment).await;
        self.notify_appointment(detail, &appointment, AppointmentNotification::New)
            .await;

        Ok(self
            .outcome(ReconciliationOutcome::AppointmentAdded)
            .with_object(appointment.id.to_string()))
    }

    async fn update_appointment(
        &self,
        detail: &PartnerAppointment,
        existing: Appointment,
    ) -> Result<Reconciliation, UseCaseError> {
        if !detail.is_recoverable(&self.tz, self.now) {
            return self.delete_appointment(Some(detail), existing).await;
        }
        let appointment = match existing.merge_partner(detail, &self.tz, self.now) {
            Some(appointment) => appointment,
            None => return self.delete_appointment(Some(detail), existing).await,
        };

        self.ctx
            .repos
            .appointments
            .save(&appointment)
            .await
            .map_err(UseCaseError::StorageError)?;
        self.ctx
            .services
            .jobs
            .cancel_reminders_for(&appointment.reminder_key())
            .await
            .map_err(UseCaseError::StorageError)?;
        self.schedule_appointment_reminders(&appointment).await;
        self.notify_appointment(detail, &appointment, AppointmentNotification::Updated)
            .await;

        Ok(self
            .outcome(ReconciliationOutcome::AppointmentModified)
            .with_object(appointment.id.to_string()))
    }

    async fn delete_appointment(
        &self,
        detail: Option<&PartnerAppointment>,
        existing: Appointment,
    ) -> Result<Reconciliation, UseCaseError> {
        self.ctx
            .services
            .jobs
            .cancel_reminders_for(&existing.reminder_key())
            .await
            .map_err(UseCaseError::StorageError)?;
        self.ctx
            .repos
            .appointments
            .delete(&existing.id)
            .await
            .map_err(UseCaseError::StorageError)?;
        if let Some(detail) = detail {
            self.notify_appointment(detail, &existing, AppointmentNotification::Deleted)
                .await;
        }

        Ok(self
            .outcome(ReconciliationOutcome::AppointmentRemoved)
            .with_object(existing.id.to_string()))
    }

    async fn schedule_appointment_reminders(&self, appointment: &Appointment) {
        if let Err(e) = self
            .ctx
            .services
            .jobs
            .schedule_appointment_reminders(appointment)
            .await
        {
            error!(
                "Unable to schedule the reminders of appointment {}: {:?}",
                appointment.id, e
            );
        }
    }

    async fn notify_appointment(
        &self,
        detail: &PartnerAppointment,
        appointment: &Appointment,
        kind: AppointmentNotification,
    ) {
        if !self.ctx.config.notify_on_partner_events
            || !appointment.is_upcoming(self.now)
            || !detail.is_status_notifiable()
        {
            return;
        }
        if let Err(e) = self
            .ctx
            .services
            .notifications
            .notify_appointment(appointment, kind)
            .await
        {
            error!(
                "Unable to notify {:?} for appointment {}: {:?}",
                kind, appointment.id, e
            );
        }
    }

    async fn session(&self, action: EventAction) -> Result<Reconciliation, UseCaseError> {
        let instance = self
            .ctx
            .services
            .partner_details
            .get_session_instance_detail(&self.object_id, &self.beneficiary.partner_id)
            .await
            .map_err(UseCaseError::PartnerUnavailable)?
            .found();

        match (action, instance) {
            (EventAction::Create, Some(instance)) if instance.is_recoverable(&self.tz, self.now) => {
                if self.is_session_notifiable(&instance) {
                    self.notify_session(&instance, SessionNotification::Enrollment)
                        .await;
                    self.schedule_session_reminder(&instance).await;
                }
                Ok(self
                    .outcome(ReconciliationOutcome::SessionNotificationAdded)
                    .with_object(instance.id))
            }
            (EventAction::Create, _) => Ok(self.outcome(ReconciliationOutcome::CreateUnknown)),
            (EventAction::Update, None) => Ok(self.outcome(ReconciliationOutcome::UpdateUnknown)),
            (EventAction::Update, Some(instance))
                if instance.is_recoverable(&self.tz, self.now) =>
            {
                self.cancel_session_reminder().await?;
                if self.is_session_notifiable(&instance) {
                    self.notify_session(&instance, SessionNotification::Modification)
                        .await;
                    self.schedule_session_reminder(&instance).await;
                }
                Ok(self
                    .outcome(ReconciliationOutcome::SessionNotificationModified)
                    .with_object(instance.id))
            }
            (EventAction::Update | EventAction::Delete, instance) => {
                self.cancel_session_reminder().await?;
                match instance {
                    Some(instance) => {
                        self.withdraw_session(&instance).await;
                        Ok(self
                            .outcome(ReconciliationOutcome::SessionNotificationRemoved)
                            .with_object(instance.id))
                    }
                    None => Ok(self.outcome(ReconciliationOutcome::DeleteUnknown)),
                }
            }
            (EventAction::Unprocessable, _) => Ok(self.outcome(
                ReconciliationOutcome::ActionUnprocessable,
            )),
        }
    }

    fn is_session_notifiable(&self, instance: &PartnerSessionInstance) -> bool {
        instance.is_upcoming(&self.tz, self.now) && instance.is_status_notifiable()
    }

    async fn cancel_session_reminder(&self) -> Result<(), UseCaseError> {
        self.ctx
            .services
            .jobs
            .cancel_reminders_for(&SessionReminder::key_for(&self.object_id))
            .await
            .map_err(UseCaseError::StorageError)
    }

    async fn schedule_session_reminder(&self, instance: &PartnerSessionInstance) {
        let starts_at = match instance.start_date(&self.tz) {
            Some(starts_at) => starts_at,
            None => return,
        };
        let reminder = SessionReminder {
            instance_id: instance.id.clone(),
            beneficiary_partner_id: self.beneficiary.partner_id.clone(),
            session_id: instance.session_id.clone(),
            starts_at,
        };
        if let Err(e) = self
            .ctx
            .services
            .jobs
            .schedule_session_reminder(&reminder)
            .await
        {
            error!(
                "Unable to schedule the reminder of session instance {}: {:?}",
                instance.id, e
            );
        }
    }

    /// Withdrawals do not depend on the instance status
    async fn withdraw_session(&self, instance: &PartnerSessionInstance) {
        if !instance.is_upcoming(&self.tz, self.now) {
            return;
        }
        if let Some(starts_at) = instance.start_date(&self.tz) {
            self.notify_session(instance, SessionNotification::Withdrawal { starts_at })
                .await;
        }
    }

    async fn notify_session(&self, instance: &PartnerSessionInstance, kind: SessionNotification) {
        if !self.ctx.config.notify_on_partner_events {
            return;
        }
        if let Err(e) = self
            .ctx
            .services
            .notifications
            .notify_session(&instance.session_id, &self.beneficiary, kind)
            .await
        {
            error!(
                "Unable to notify beneficiary {} about session instance {}: {:?}",
                self.beneficiary.id, instance.id, e
            );
        }
    }
}
