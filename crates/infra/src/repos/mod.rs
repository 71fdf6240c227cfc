mod appointment;
mod beneficiary;
mod job;
mod job_run;
mod shared;

pub use appointment::{IAppointmentRepo, InMemoryAppointmentRepo, PostgresAppointmentRepo};
pub use beneficiary::{IBeneficiaryRepo, InMemoryBeneficiaryRepo, PostgresBeneficiaryRepo};
pub use job::{IJobRepo, InMemoryJobRepo, PostgresJobRepo};
pub use job_run::{IJobRunRepo, InMemoryJobRunRepo, PostgresJobRunRepo};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tracing::info;

#[derive(Clone)]
pub struct Repos {
    pub beneficiaries: Arc<dyn IBeneficiaryRepo>,
    pub appointments: Arc<dyn IAppointmentRepo>,
    pub jobs: Arc<dyn IJobRepo>,
    pub job_runs: Arc<dyn IJobRunRepo>,
}

impl Repos {
    pub async fn create_postgres(connection_string: &str) -> anyhow::Result<Self> {
        info!("DB CHECKING CONNECTION ...");
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(connection_string)
            .await?;
        info!("DB CHECKING CONNECTION ... [done]");

        Ok(Self {
            beneficiaries: Arc::new(PostgresBeneficiaryRepo::new(pool.clone())),
            appointments: Arc::new(PostgresAppointmentRepo::new(pool.clone())),
            jobs: Arc::new(PostgresJobRepo::new(pool.clone())),
            job_runs: Arc::new(PostgresJobRunRepo::new(pool)),
        })
    }

    pub fn create_inmemory() -> Self {
        Self {
            beneficiaries: Arc::new(InMemoryBeneficiaryRepo::new()),
            appointments: Arc::new(InMemoryAppointmentRepo::new()),
            jobs: Arc::new(InMemoryJobRepo::new()),
            job_runs: Arc::new(InMemoryJobRunRepo::new()),
        }
    }
}
