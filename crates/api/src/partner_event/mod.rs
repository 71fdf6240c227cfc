pub mod poll_partner_events;
pub mod reconcile_partner_event;

use crate::error::PartnerSyncError;
use actix_web::{web, HttpResponse};
use partner_sync_infra::PartnerSyncContext;
use serde::Serialize;
use tracing::error;

#[derive(Serialize)]
struct APIResponse {
    message: String,
}

/// Asks the workers to poll the partner without waiting for the next tick
async fn trigger_poll(ctx: web::Data<PartnerSyncContext>) -> Result<HttpResponse, PartnerSyncError> {
    ctx.services.jobs.enqueue_poll().await.map_err(|e| {
        error!("Unable to enqueue a partner events poll: {:?}", e);
        PartnerSyncError::InternalError
    })?;

    Ok(HttpResponse::Accepted().json(APIResponse {
        message: "Partner events poll enqueued".into(),
    }))
}

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/partner-events/poll", web::post().to(trigger_poll));
}
