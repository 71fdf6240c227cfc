mod appointment;
mod beneficiary;
mod job;
mod notification;
mod partner_event;
mod partner_object;
mod reconciliation;
mod shared;

pub use appointment::{Appointment, Attendee, PartnerLink, PartnerObjectType, Presence};
pub use beneficiary::Beneficiary;
pub use job::{
    plan_reminders, Job, JobPayload, JobRun, JobStatus, JobType, SessionReminder,
    REMINDER_DAYS_BEFORE,
};
pub use notification::{AppointmentNotification, SessionNotification};
pub use partner_event::{DedupKey, EventAction, EventSubject, PartnerEvent};
pub use partner_object::{
    appointment_status, is_within_recovery_window, parse_partner_date, session_status,
    PartnerAppointment, PartnerObject, PartnerSessionInstance, PARTNER_DATE_FORMAT,
};
pub use reconciliation::{Reconciliation, ReconciliationOutcome};
pub use shared::entity::{Entity, ID};
