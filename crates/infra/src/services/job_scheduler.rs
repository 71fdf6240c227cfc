use crate::{repos::IJobRepo, system::ISys};
use partner_sync_domain::{
    plan_reminders, Appointment, Job, JobPayload, JobType, PartnerEvent, SessionReminder,
};
use std::sync::Arc;
use tracing::info;

/// Turns pipeline decisions into persisted jobs
#[async_trait::async_trait]
pub trait IJobScheduler: Send + Sync {
    /// True when more than one job of this type is running, the caller's own job included
    async fn is_another_instance_running(&self, job_type: JobType) -> anyhow::Result<bool>;
    /// Enqueues the processing of an event, at most once per event id
    async fn enqueue_event_job(&self, event: &PartnerEvent) -> anyhow::Result<()>;
    async fn schedule_appointment_reminders(&self, appointment: &Appointment)
        -> anyhow::Result<()>;
    /// Removes every reminder grouped under `key`, doing nothing when there is none
    async fn cancel_reminders_for(&self, key: &str) -> anyhow::Result<()>;
    async fn schedule_session_reminder(&self, reminder: &SessionReminder) -> anyhow::Result<()>;
    async fn enqueue_poll(&self) -> anyhow::Result<()>;
}

pub struct JobScheduler {
    jobs: Arc<dyn IJobRepo>,
    sys: Arc<dyn ISys>,
}

impl JobScheduler {
    pub fn new(jobs: Arc<dyn IJobRepo>, sys: Arc<dyn ISys>) -> Self {
        Self { jobs, sys }
    }

    async fn schedule_reminders(
        &self,
        key: &str,
        starts_at: chrono::DateTime<chrono::Utc>,
        payload: JobPayload,
    ) -> anyhow::Result<()> {
        for (days, remind_at) in plan_reminders(starts_at, self.sys.now()) {
            let job = Job::new(format!("{}:{}", key, days), remind_at, payload.clone());
            self.jobs.upsert(&job).await?;
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl IJobScheduler for JobScheduler {
    async fn is_another_instance_running(&self, job_type: JobType) -> anyhow::Result<bool> {
        Ok(self.jobs.count_running(job_type).await? > 1)
    }

    async fn enqueue_event_job(&self, event: &PartnerEvent) -> anyhow::Result<()> {
        let job = Job::new(
            event.job_key(),
            self.sys.now(),
            JobPayload::ProcessPartnerEvent(event.clone()),
        );
        if !self.jobs.insert_if_absent(&job).await? {
            info!("A job already exists for partner event {}", event.id);
        }
        Ok(())
    }

    async fn schedule_appointment_reminders(
        &self,
        appointment: &Appointment,
    ) -> anyhow::Result<()> {
        self.schedule_reminders(
            &appointment.reminder_key(),
            appointment.date,
            JobPayload::AppointmentReminder {
                appointment_id: appointment.id,
            },
        )
        .await
    }

    async fn cancel_reminders_for(&self, key: &str) -> anyhow::Result<()> {
        self.jobs.delete_by_key_prefix(key).await?;
        Ok(())
    }

    async fn schedule_session_reminder(&self, reminder: &SessionReminder) -> anyhow::Result<()> {
        self.schedule_reminders(
            &reminder.reminder_key(),
            reminder.starts_at,
            JobPayload::SessionReminder(reminder.clone()),
        )
        .await
    }

    async fn enqueue_poll(&self) -> anyhow::Result<()> {
        let now = self.sys.now();
        let job = Job::new(
            format!("poll-partner-events:{}", now.timestamp_millis()),
            now,
            JobPayload::PollPartnerEvents,
        );
        self.jobs.insert_if_absent(&job).await?;
        Ok(())
    }
}
