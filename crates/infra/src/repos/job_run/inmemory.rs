use super::IJobRunRepo;
use crate::repos::shared::inmemory_repo::*;
use partner_sync_domain::{JobRun, JobType};

pub struct InMemoryJobRunRepo {
    runs: std::sync::Mutex<Vec<JobRun>>,
}

impl InMemoryJobRunRepo {
    pub fn new() -> Self {
        Self {
            runs: std::sync::Mutex::new(Vec::new()),
        }
    }
}

#[async_trait::async_trait]
impl IJobRunRepo for InMemoryJobRunRepo {
    async fn insert(&self, run: &JobRun) -> anyhow::Result<()> {
        insert(run, &self.runs);
        Ok(())
    }

    async fn find_by_type(&self, job_type: JobType, limit: usize) -> anyhow::Result<Vec<JobRun>> {
        let mut runs = find_by(&self.runs, |r| r.job_type == job_type);
        runs.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        runs.truncate(limit);
        Ok(runs)
    }
}
