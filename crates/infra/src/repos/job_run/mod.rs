mod inmemory;
mod postgres;

pub use inmemory::InMemoryJobRunRepo;
use partner_sync_domain::{JobRun, JobType};
pub use postgres::PostgresJobRunRepo;

#[async_trait::async_trait]
pub trait IJobRunRepo: Send + Sync {
    async fn insert(&self, run: &JobRun) -> anyhow::Result<()>;
    /// Most recent runs first
    async fn find_by_type(&self, job_type: JobType, limit: usize) -> anyhow::Result<Vec<JobRun>>;
}
