use crate::error::PartnerSyncError;
use actix_web::{web, HttpResponse};
use partner_sync_domain::{JobRun, JobType};
use partner_sync_infra::PartnerSyncContext;
use serde::{Deserialize, Serialize};
use tracing::error;

const DEFAULT_LIMIT: usize = 20;
const MAX_LIMIT: usize = 200;

#[derive(Deserialize)]
pub struct QueryParams {
    pub limit: Option<usize>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct APIResponse {
    pub job_runs: Vec<JobRun>,
}

/// Most recent runs of one kind of job
async fn get_job_runs(
    path: web::Path<String>,
    query: web::Query<QueryParams>,
    ctx: web::Data<PartnerSyncContext>,
) -> Result<HttpResponse, PartnerSyncError> {
    let job_type = path.parse::<JobType>().map_err(|_| {
        PartnerSyncError::BadClientData(format!("Unknown job type: {}", path.as_str()))
    })?;
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT).min(MAX_LIMIT);

    let job_runs = ctx
        .repos
        .job_runs
        .find_by_type(job_type, limit)
        .await
        .map_err(|e| {
            error!("Unable to read the {} job runs: {:?}", job_type.as_str(), e);
            PartnerSyncError::InternalError
        })?;

    Ok(HttpResponse::Ok().json(APIResponse { job_runs }))
}

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/jobs/{job_type}/runs", web::get().to(get_job_runs));
}
