use super::IJobRunRepo;
use chrono::{DateTime, Utc};
use partner_sync_domain::{JobRun, JobType};
use sqlx::{types::Json, types::Uuid, FromRow, PgPool};

pub struct PostgresJobRunRepo {
    pool: PgPool,
}

impl PostgresJobRunRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct JobRunRaw {
    job_type: String,
    started_at: DateTime<Utc>,
    succeeded: bool,
    result: Json<serde_json::Value>,
    error_count: i32,
    execution_time_ms: i64,
    error: Option<String>,
}

impl TryFrom<JobRunRaw> for JobRun {
    type Error = anyhow::Error;

    fn try_from(raw: JobRunRaw) -> anyhow::Result<Self> {
        let job_type = raw
            .job_type
            .parse::<JobType>()
            .map_err(|_| anyhow::anyhow!("Unknown job type: {}", raw.job_type))?;
        Ok(Self {
            job_type,
            started_at: raw.started_at,
            succeeded: raw.succeeded,
            result: raw.result.0,
            error_count: raw.error_count,
            execution_time_ms: raw.execution_time_ms,
            error: raw.error,
        })
    }
}

#[async_trait::async_trait]
impl IJobRunRepo for PostgresJobRunRepo {
    async fn insert(&self, run: &JobRun) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO job_runs
            (job_run_uid, job_type, started_at, succeeded, result, error_count, execution_time_ms, error)
            VALUES($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(run.job_type.as_str())
        .bind(run.started_at)
        .bind(run.succeeded)
        .bind(Json(&run.result))
        .bind(run.error_count)
        .bind(run.execution_time_ms)
        .bind(&run.error)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_by_type(&self, job_type: JobType, limit: usize) -> anyhow::Result<Vec<JobRun>> {
        sqlx::query_as::<_, JobRunRaw>(
            r#"
            SELECT job_type, started_at, succeeded, result, error_count, execution_time_ms, error
            FROM job_runs AS r
            WHERE r.job_type = $1
            ORDER BY r.started_at DESC
            LIMIT $2
            "#,
        )
        .bind(job_type.as_str())
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(JobRun::try_from)
        .collect()
    }
}
