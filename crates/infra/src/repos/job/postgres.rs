use super::IJobRepo;
use chrono::{DateTime, Utc};
use partner_sync_domain::{Job, JobPayload, JobStatus, JobType};
use sqlx::{types::Json, FromRow, PgPool};

pub struct PostgresJobRepo {
    pool: PgPool,
}

impl PostgresJobRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct JobRaw {
    job_key: String,
    run_at: DateTime<Utc>,
    payload: Json<JobPayload>,
    status: String,
    attempts: i32,
    started_at: Option<DateTime<Utc>>,
    updated: DateTime<Utc>,
}

impl TryFrom<JobRaw> for Job {
    type Error = anyhow::Error;

    fn try_from(raw: JobRaw) -> anyhow::Result<Self> {
        let status = raw
            .status
            .parse::<JobStatus>()
            .map_err(|_| anyhow::anyhow!("Unknown job status: {}", raw.status))?;
        Ok(Self {
            key: raw.job_key,
            run_at: raw.run_at,
            payload: raw.payload.0,
            status,
            attempts: raw.attempts,
            started_at: raw.started_at,
            updated: raw.updated,
        })
    }
}

/// Escapes `LIKE` wildcards so that the prefix is matched literally
fn like_prefix(prefix: &str) -> String {
    let escaped = prefix
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("{}:%", escaped)
}

#[async_trait::async_trait]
impl IJobRepo for PostgresJobRepo {
    async fn insert_if_absent(&self, job: &Job) -> anyhow::Result<bool> {
        let res = sqlx::query(
            r#"
            INSERT INTO scheduled_jobs
            (job_key, job_type, run_at, payload, status, attempts, started_at, updated)
            VALUES($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (job_key) DO NOTHING
            "#,
        )
        .bind(&job.key)
        .bind(job.job_type().as_str())
        .bind(job.run_at)
        .bind(Json(&job.payload))
        .bind(job.status.as_str())
        .bind(job.attempts)
        .bind(job.started_at)
        .bind(job.updated)
        .execute(&self.pool)
        .await?;
        Ok(res.rows_affected() == 1)
    }

    async fn upsert(&self, job: &Job) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO scheduled_jobs
            (job_key, job_type, run_at, payload, status, attempts, started_at, updated)
            VALUES($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (job_key) DO UPDATE SET
                job_type = EXCLUDED.job_type,
                run_at = EXCLUDED.run_at,
                payload = EXCLUDED.payload,
                status = EXCLUDED.status,
                attempts = EXCLUDED.attempts,
                started_at = EXCLUDED.started_at,
                updated = EXCLUDED.updated
            "#,
        )
        .bind(&job.key)
        .bind(job.job_type().as_str())
        .bind(job.run_at)
        .bind(Json(&job.payload))
        .bind(job.status.as_str())
        .bind(job.attempts)
        .bind(job.started_at)
        .bind(job.updated)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find(&self, key: &str) -> anyhow::Result<Option<Job>> {
        sqlx::query_as::<_, JobRaw>(
            r#"
            SELECT * FROM scheduled_jobs AS j
            WHERE j.job_key = $1
            "#,
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await?
        .map(Job::try_from)
        .transpose()
    }

    async fn delete_by_key_prefix(&self, prefix: &str) -> anyhow::Result<u64> {
        let res = sqlx::query(
            r#"
            DELETE FROM scheduled_jobs AS j
            WHERE j.job_key = $1 OR j.job_key LIKE $2
            "#,
        )
        .bind(prefix)
        .bind(like_prefix(prefix))
        .execute(&self.pool)
        .await?;
        Ok(res.rows_affected())
    }

    async fn count_running(&self, job_type: JobType) -> anyhow::Result<usize> {
        let (count,): (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(*) FROM scheduled_jobs AS j
            WHERE j.job_type = $1 AND j.status = $2
            "#,
        )
        .bind(job_type.as_str())
        .bind(JobStatus::Running.as_str())
        .fetch_one(&self.pool)
        .await?;
        Ok(count as usize)
    }

    async fn claim_due(&self, now: DateTime<Utc>, limit: usize) -> anyhow::Result<Vec<Job>> {
        sqlx::query_as::<_, JobRaw>(
            r#"
            UPDATE scheduled_jobs SET
                status = $2,
                started_at = $1,
                attempts = attempts + 1,
                updated = $1
            WHERE job_key IN (
                SELECT j.job_key FROM scheduled_jobs AS j
                WHERE j.status = $3 AND j.run_at <= $1
                ORDER BY j.run_at
                LIMIT $4
                FOR UPDATE SKIP LOCKED
            )
            RETURNING *
            "#,
        )
        .bind(now)
        .bind(JobStatus::Running.as_str())
        .bind(JobStatus::Pending.as_str())
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(Job::try_from)
        .collect()
    }

    async fn complete(&self, job: &Job, now: DateTime<Utc>) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            UPDATE scheduled_jobs SET
                status = $2,
                updated = $3
            WHERE job_key = $1 AND status = $4
                AND started_at IS NOT DISTINCT FROM $5 AND attempts = $6
            "#,
        )
        .bind(&job.key)
        .bind(JobStatus::Done.as_str())
        .bind(now)
        .bind(JobStatus::Running.as_str())
        .bind(job.started_at)
        .bind(job.attempts)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn release(&self, job: &Job, retry_at: DateTime<Utc>) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            UPDATE scheduled_jobs SET
                status = $2,
                run_at = $3,
                started_at = NULL
            WHERE job_key = $1 AND status = $4
                AND started_at IS NOT DISTINCT FROM $5 AND attempts = $6
            "#,
        )
        .bind(&job.key)
        .bind(JobStatus::Pending.as_str())
        .bind(retry_at)
        .bind(JobStatus::Running.as_str())
        .bind(job.started_at)
        .bind(job.attempts)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn release_stale(&self, started_before: DateTime<Utc>) -> anyhow::Result<u64> {
        let res = sqlx::query(
            r#"
            UPDATE scheduled_jobs SET
                status = $1,
                started_at = NULL
            WHERE status = $2 AND (started_at IS NULL OR started_at < $3)
            "#,
        )
        .bind(JobStatus::Pending.as_str())
        .bind(JobStatus::Running.as_str())
        .bind(started_before)
        .execute(&self.pool)
        .await?;
        Ok(res.rows_affected())
    }

    async fn delete_done_before(&self, before: DateTime<Utc>) -> anyhow::Result<u64> {
        let res = sqlx::query(
            r#"
            DELETE FROM scheduled_jobs AS j
            WHERE j.status = $1 AND j.updated < $2
            "#,
        )
        .bind(JobStatus::Done.as_str())
        .bind(before)
        .execute(&self.pool)
        .await?;
        Ok(res.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::like_prefix;

    #[test]
    fn escapes_like_wildcards() {
        assert_eq!(like_prefix("appointment:1"), "appointment:1:%");
        assert_eq!(like_prefix("a_b%c"), "a\\_b\\%c:%");
    }
}
