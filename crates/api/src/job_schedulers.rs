use crate::{
    partner_event::{
        poll_partner_events::{PollPartnerEventsUseCase, PollSummary},
        reconcile_partner_event::ReconcilePartnerEventUseCase,
    },
    reminder::send_reminder::{Reminder, ReminderOutcome, SendReminderUseCase},
    shared::usecase::{execute, UseCase},
};
use actix_web::rt::time::interval;
use chrono::Duration;
use partner_sync_domain::{Job, JobPayload, JobRun, Reconciliation};
use partner_sync_infra::PartnerSyncContext;
use serde::Serialize;
use std::{
    fmt::Debug,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Instant,
};
use tracing::{error, info, warn};

/// Seconds added to the retry delay of a failed job for every attempt
const RETRY_BACKOFF_SECS: i64 = 30;

trait JobOutput: Serialize {
    fn error_count(&self) -> i32 {
        0
    }
}

impl JobOutput for PollSummary {
    fn error_count(&self) -> i32 {
        self.errors as i32
    }
}

impl JobOutput for Reconciliation {}

impl JobOutput for ReminderOutcome {}

pub fn retry_delay(attempts: i32) -> Duration {
    Duration::seconds(RETRY_BACKOFF_SECS * i64::from(attempts.max(1)))
}

async fn track<U>(
    usecase: U,
    ctx: &PartnerSyncContext,
) -> Result<(serde_json::Value, i32), String>
where
    U: UseCase,
    U::Response: JobOutput,
    U::Errors: Debug,
{
    let res = execute(usecase, ctx)
        .await
        .map_err(|e| format!("{:?}", e))?;
    let result = serde_json::to_value(&res).map_err(|e| e.to_string())?;
    Ok((result, res.error_count()))
}

/// Executes the use case behind a job
pub async fn run_job(job: &Job, ctx: &PartnerSyncContext) -> JobRun {
    let started_at = ctx.sys.now();
    let timer = Instant::now();

    let res = match &job.payload {
        JobPayload::PollPartnerEvents => track(PollPartnerEventsUseCase {}, ctx).await,
        JobPayload::ProcessPartnerEvent(event) => {
            track(
                ReconcilePartnerEventUseCase {
                    event: event.clone(),
                },
                ctx,
            )
            .await
        }
        JobPayload::AppointmentReminder { appointment_id } => {
            track(
                SendReminderUseCase {
                    reminder: Reminder::Appointment {
                        appointment_id: *appointment_id,
                    },
                },
                ctx,
            )
            .await
        }
        JobPayload::SessionReminder(reminder) => {
            track(
                SendReminderUseCase {
                    reminder: Reminder::Session(reminder.clone()),
                },
                ctx,
            )
            .await
        }
    };

    let execution_time_ms = timer.elapsed().as_millis() as i64;
    match res {
        Ok((result, error_count)) => JobRun {
            job_type: job.job_type(),
            started_at,
            succeeded: true,
            result,
            error_count,
            execution_time_ms,
            error: None,
        },
        Err(e) => JobRun {
            job_type: job.job_type(),
            started_at,
            succeeded: false,
            result: serde_json::Value::Null,
            error_count: 1,
            execution_time_ms,
            error: Some(e),
        },
    }
}

/// Runs a claimed job, records the run and settles the job
pub async fn process_job(job: Job, ctx: &PartnerSyncContext) -> JobRun {
    let run = run_job(&job, ctx).await;
    if run.succeeded {
        info!(
            "Job {} of type {} succeeded in {}ms: {}",
            job.key,
            run.job_type.as_str(),
            run.execution_time_ms,
            run.result
        );
    } else {
        error!(
            "Job {} of type {} failed on attempt {}: {:?}",
            job.key,
            run.job_type.as_str(),
            job.attempts,
            run.error
        );
    }

    if let Err(e) = ctx.repos.job_runs.insert(&run).await {
        error!("Unable to store the run of job {}: {:?}", job.key, e);
    }

    let now = ctx.sys.now();
    let settled = if run.succeeded {
        ctx.repos.jobs.complete(&job, now).await
    } else if job.attempts >= ctx.config.job_max_attempts {
        warn!("Giving up job {} after {} attempts", job.key, job.attempts);
        ctx.repos.jobs.complete(&job, now).await
    } else {
        ctx.repos
            .jobs
            .release(&job, now + retry_delay(job.attempts))
            .await
    };
    if let Err(e) = settled {
        error!("Unable to settle job {}: {:?}", job.key, e);
    }

    run
}

/// Claims every due job and runs them one after the other
pub async fn run_due_jobs(ctx: &PartnerSyncContext) -> anyhow::Result<Vec<JobRun>> {
    let jobs = ctx
        .repos
        .jobs
        .claim_due(ctx.sys.now(), ctx.config.job_worker_concurrency)
        .await?;

    let mut runs = Vec::with_capacity(jobs.len());
    for job in jobs {
        runs.push(process_job(job, ctx).await);
    }
    Ok(runs)
}

pub fn start_partner_events_poll_scheduler(ctx: PartnerSyncContext) {
    actix_web::rt::spawn(async move {
        let period = std::time::Duration::from_secs(ctx.config.poll_interval_secs.max(1));
        let mut interval = interval(period);
        loop {
            interval.tick().await;

            if let Err(e) = ctx.services.jobs.enqueue_poll().await {
                error!("Unable to enqueue a partner events poll: {:?}", e);
            }
        }
    });
}

async fn release_stale_jobs(ctx: &PartnerSyncContext) {
    let started_before = ctx.sys.now() - Duration::milliseconds(ctx.config.job_timeout_millis);
    match ctx.repos.jobs.release_stale(started_before).await {
        Ok(0) => {}
        Ok(released) => warn!("Released {} jobs that were running for too long", released),
        Err(e) => error!("Unable to release stale jobs: {:?}", e),
    }
}

pub fn start_job_worker(ctx: PartnerSyncContext) {
    actix_web::rt::spawn(async move {
        let in_flight = Arc::new(AtomicUsize::new(0));
        let mut interval = interval(std::time::Duration::from_secs(1));
        loop {
            interval.tick().await;

            release_stale_jobs(&ctx).await;

            let free_slots = ctx
                .config
                .job_worker_concurrency
                .saturating_sub(in_flight.load(Ordering::SeqCst));
            if free_slots == 0 {
                continue;
            }

            let jobs = match ctx.repos.jobs.claim_due(ctx.sys.now(), free_slots).await {
                Ok(jobs) => jobs,
                Err(e) => {
                    error!("Unable to claim due jobs: {:?}", e);
                    continue;
                }
            };

            for job in jobs {
                in_flight.fetch_add(1, Ordering::SeqCst);
                let context = ctx.clone();
                let in_flight = in_flight.clone();
                actix_web::rt::spawn(async move {
                    process_job(job, &context).await;
                    in_flight.fetch_sub(1, Ordering::SeqCst);
                });
            }
        }
    });
}

pub fn start_job_cleanup_scheduler(ctx: PartnerSyncContext) {
    actix_web::rt::spawn(async move {
        let mut hourly_interval = interval(std::time::Duration::from_secs(60 * 60));
        loop {
            hourly_interval.tick().await;

            let before = ctx.sys.now() - Duration::milliseconds(ctx.config.job_retention_millis);
            match ctx.repos.jobs.delete_done_before(before).await {
                Ok(deleted) => info!("Deleted {} finished jobs", deleted),
                Err(e) => error!("Unable to delete finished jobs: {:?}", e),
            }
        }
    });
}
