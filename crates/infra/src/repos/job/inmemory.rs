use super::IJobRepo;
use crate::repos::shared::inmemory_repo::*;
use chrono::{DateTime, Utc};
use partner_sync_domain::{Job, JobStatus, JobType};

pub struct InMemoryJobRepo {
    jobs: std::sync::Mutex<Vec<Job>>,
}

impl InMemoryJobRepo {
    pub fn new() -> Self {
        Self {
            jobs: std::sync::Mutex::new(Vec::new()),
        }
    }
}

fn is_same_run(stored: &Job, claimed: &Job) -> bool {
    stored.key == claimed.key
        && stored.status == JobStatus::Running
        && stored.started_at == claimed.started_at
        && stored.attempts == claimed.attempts
}

#[async_trait::async_trait]
impl IJobRepo for InMemoryJobRepo {
    async fn insert_if_absent(&self, job: &Job) -> anyhow::Result<bool> {
        let mut jobs = lock(&self.jobs);
        if jobs.iter().any(|j| j.key == job.key) {
            return Ok(false);
        }
        jobs.push(job.clone());
        Ok(true)
    }

    async fn upsert(&self, job: &Job) -> anyhow::Result<()> {
        let mut jobs = lock(&self.jobs);
        match jobs.iter_mut().find(|j| j.key == job.key) {
            Some(existing) => *existing = job.clone(),
            None => jobs.push(job.clone()),
        }
        Ok(())
    }

    async fn find(&self, key: &str) -> anyhow::Result<Option<Job>> {
        Ok(find_by(&self.jobs, |j| j.key == key).into_iter().next())
    }

    async fn delete_by_key_prefix(&self, prefix: &str) -> anyhow::Result<u64> {
        let deleted = find_and_delete_by(&self.jobs, |j| j.key_matches_prefix(prefix));
        Ok(deleted.len() as u64)
    }

    async fn count_running(&self, job_type: JobType) -> anyhow::Result<usize> {
        Ok(find_by(&self.jobs, |j| {
            j.status == JobStatus::Running && j.job_type() == job_type
        })
        .len())
    }

    async fn claim_due(&self, now: DateTime<Utc>, limit: usize) -> anyhow::Result<Vec<Job>> {
        let mut jobs = lock(&self.jobs);
        let mut due = jobs
            .iter_mut()
            .filter(|j| j.status == JobStatus::Pending && j.run_at <= now)
            .collect::<Vec<_>>();
        due.sort_by_key(|j| j.run_at);

        Ok(due
            .into_iter()
            .take(limit)
            .map(|job| {
                job.status = JobStatus::Running;
                job.started_at = Some(now);
                job.attempts += 1;
                job.updated = now;
                job.clone()
            })
            .collect())
    }

    async fn complete(&self, job: &Job, now: DateTime<Utc>) -> anyhow::Result<()> {
        update_many(
            &self.jobs,
            |j| is_same_run(j, job),
            |j| {
                j.status = JobStatus::Done;
                j.updated = now;
            },
        );
        Ok(())
    }

    async fn release(&self, job: &Job, retry_at: DateTime<Utc>) -> anyhow::Result<()> {
        update_many(
            &self.jobs,
            |j| is_same_run(j, job),
            |j| {
                j.status = JobStatus::Pending;
                j.run_at = retry_at;
                j.started_at = None;
            },
        );
        Ok(())
    }

    async fn release_stale(&self, started_before: DateTime<Utc>) -> anyhow::Result<u64> {
        let released = update_many(
            &self.jobs,
            |j| {
                j.status == JobStatus::Running
                    && j.started_at.map(|s| s < started_before).unwrap_or(true)
            },
            |j| {
                j.status = JobStatus::Pending;
                j.started_at = None;
            },
        );
        Ok(released.len() as u64)
    }

    async fn delete_done_before(&self, before: DateTime<Utc>) -> anyhow::Result<u64> {
        let deleted =
            find_and_delete_by(&self.jobs, |j| j.status == JobStatus::Done && j.updated < before);
        Ok(deleted.len() as u64)
    }
}
