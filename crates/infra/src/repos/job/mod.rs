mod inmemory;
mod postgres;

use chrono::{DateTime, Utc};
pub use inmemory::InMemoryJobRepo;
use partner_sync_domain::{Job, JobType};
pub use postgres::PostgresJobRepo;

#[async_trait::async_trait]
pub trait IJobRepo: Send + Sync {
    /// Returns `false` when a job with the same key already exists
    async fn insert_if_absent(&self, job: &Job) -> anyhow::Result<bool>;
    /// Inserts the job or resets the existing job with the same key
    async fn upsert(&self, job: &Job) -> anyhow::Result<()>;
    async fn find(&self, key: &str) -> anyhow::Result<Option<Job>>;
    /// Deletes the job keyed `prefix` and every job keyed `prefix:*`
    async fn delete_by_key_prefix(&self, prefix: &str) -> anyhow::Result<u64>;
    async fn count_running(&self, job_type: JobType) -> anyhow::Result<usize>;
    /// Marks at most `limit` due pending jobs as running and returns them
    async fn claim_due(&self, now: DateTime<Utc>, limit: usize) -> anyhow::Result<Vec<Job>>;
    /// Marks the claimed run of `job` as done. A job rescheduled or reclaimed
    /// since `job` was claimed is left untouched.
    async fn complete(&self, job: &Job, now: DateTime<Utc>) -> anyhow::Result<()>;
    /// Puts the claimed run of `job` back in the queue
    async fn release(&self, job: &Job, retry_at: DateTime<Utc>) -> anyhow::Result<()>;
    /// Puts back in the queue every job running since before `started_before`
    async fn release_stale(&self, started_before: DateTime<Utc>) -> anyhow::Result<u64>;
    async fn delete_done_before(&self, before: DateTime<Utc>) -> anyhow::Result<u64>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use partner_sync_domain::{JobPayload, JobStatus};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2023, 3, 1, 12, 0, 0).unwrap()
    }

    fn poll_job(key: &str, run_at: DateTime<Utc>) -> Job {
        Job::new(key, run_at, JobPayload::PollPartnerEvents)
    }

    #[tokio::test]
    async fn insert_if_absent_is_idempotent_by_key() {
        let repo = InMemoryJobRepo::new();
        assert!(repo.insert_if_absent(&poll_job("a", now())).await.unwrap());
        assert!(!repo.insert_if_absent(&poll_job("a", now())).await.unwrap());

        repo.upsert(&poll_job("a", now() + Duration::days(1)))
            .await
            .unwrap();
        let job = repo.find("a").await.unwrap().unwrap();
        assert_eq!(job.run_at, now() + Duration::days(1));
    }

    #[tokio::test]
    async fn deletes_by_key_prefix() {
        let repo = InMemoryJobRepo::new();
        for key in ["instance-session:34:7", "instance-session:34:1", "instance-session:340:1"] {
            repo.upsert(&poll_job(key, now())).await.unwrap();
        }

        assert_eq!(repo.delete_by_key_prefix("instance-session:34").await.unwrap(), 2);
        assert_eq!(repo.delete_by_key_prefix("instance-session:34").await.unwrap(), 0);
        assert!(repo.find("instance-session:340:1").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn claims_only_due_jobs_within_limit() {
        let repo = InMemoryJobRepo::new();
        repo.upsert(&poll_job("a", now() - Duration::minutes(2))).await.unwrap();
        repo.upsert(&poll_job("b", now() - Duration::minutes(1))).await.unwrap();
        repo.upsert(&poll_job("c", now() + Duration::minutes(1))).await.unwrap();

        let claimed = repo.claim_due(now(), 1).await.unwrap();
        assert_eq!(claimed.len(), 1);
        assert_eq!(claimed[0].key, "a");
        assert_eq!(claimed[0].status, JobStatus::Running);
        assert_eq!(claimed[0].attempts, 1);
        assert_eq!(
            repo.count_running(JobType::PollPartnerEvents).await.unwrap(),
            1
        );

        let claimed = repo.claim_due(now(), 10).await.unwrap();
        assert_eq!(claimed.len(), 1);
        assert_eq!(claimed[0].key, "b");
    }

    #[tokio::test]
    async fn completes_releases_and_cleans_up() {
        let repo = InMemoryJobRepo::new();
        repo.upsert(&poll_job("a", now())).await.unwrap();
        repo.upsert(&poll_job("b", now())).await.unwrap();
        let claimed = repo.claim_due(now(), 10).await.unwrap();

        repo.complete(&claimed[0], now()).await.unwrap();
        repo.release(&claimed[1], now() + Duration::seconds(30))
            .await
            .unwrap();
        assert_eq!(
            repo.count_running(JobType::PollPartnerEvents).await.unwrap(),
            0
        );
        assert!(repo.claim_due(now(), 10).await.unwrap().is_empty());
        assert_eq!(
            repo.claim_due(now() + Duration::seconds(30), 10)
                .await
                .unwrap()
                .len(),
            1
        );

        // Done jobs still guard against duplicates until cleaned up
        assert!(!repo.insert_if_absent(&poll_job("a", now())).await.unwrap());
        assert_eq!(
            repo.delete_done_before(now() + Duration::hours(1))
                .await
                .unwrap(),
            1
        );
        assert!(repo.insert_if_absent(&poll_job("a", now())).await.unwrap());
    }

    #[tokio::test]
    async fn settling_a_run_leaves_a_rescheduled_job_alone() {
        let repo = InMemoryJobRepo::new();
        repo.upsert(&poll_job("a", now())).await.unwrap();
        repo.upsert(&poll_job("b", now())).await.unwrap();
        let claimed = repo.claim_due(now(), 10).await.unwrap();

        repo.upsert(&poll_job("a", now() + Duration::days(1)))
            .await
            .unwrap();
        repo.upsert(&poll_job("b", now() + Duration::days(1)))
            .await
            .unwrap();
        repo.complete(&claimed[0], now()).await.unwrap();
        repo.release(&claimed[1], now() + Duration::seconds(30))
            .await
            .unwrap();

        for key in ["a", "b"] {
            let job = repo.find(key).await.unwrap().unwrap();
            assert_eq!(job.status, JobStatus::Pending);
            assert_eq!(job.run_at, now() + Duration::days(1));
            assert_eq!(job.attempts, 0);
        }
    }

    #[tokio::test]
    async fn settling_a_stale_run_leaves_the_new_run_alone() {
        let repo = InMemoryJobRepo::new();
        repo.upsert(&poll_job("a", now())).await.unwrap();
        let stale = repo.claim_due(now(), 10).await.unwrap().remove(0);
        repo.release_stale(now() + Duration::minutes(1)).await.unwrap();
        let current = repo
            .claim_due(now() + Duration::minutes(1), 10)
            .await
            .unwrap()
            .remove(0);

        repo.complete(&stale, now() + Duration::minutes(2))
            .await
            .unwrap();
        let job = repo.find("a").await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Running);
        assert_eq!(job.attempts, 2);

        repo.complete(&current, now() + Duration::minutes(2))
            .await
            .unwrap();
        let job = repo.find("a").await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Done);
    }

    #[tokio::test]
    async fn releases_stale_jobs() {
        let repo = InMemoryJobRepo::new();
        repo.upsert(&poll_job("a", now())).await.unwrap();
        repo.claim_due(now(), 10).await.unwrap();

        assert_eq!(repo.release_stale(now()).await.unwrap(), 0);
        assert_eq!(
            repo.release_stale(now() + Duration::minutes(1))
                .await
                .unwrap(),
            1
        );
        let job = repo.find("a").await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Pending);
        assert!(job.started_at.is_none());
    }
}
