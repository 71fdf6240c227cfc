mod error;
mod job_run;
mod job_schedulers;
mod partner_event;
mod reminder;
mod shared;
mod status;

use actix_web::{dev::Server, middleware, web, App, HttpServer};
use job_schedulers::{
    start_job_cleanup_scheduler, start_job_worker, start_partner_events_poll_scheduler,
};
pub use job_schedulers::{process_job, run_due_jobs, run_job};
pub use partner_event::poll_partner_events::PollSummary;
pub use reminder::send_reminder::ReminderOutcome;
use partner_sync_infra::PartnerSyncContext;
use std::net::TcpListener;
use tracing_actix_web::TracingLogger;

pub fn configure_server_api(cfg: &mut web::ServiceConfig) {
    job_run::configure_routes(cfg);
    partner_event::configure_routes(cfg);
    status::configure_routes(cfg);
}

pub struct Application {
    server: Server,
    port: u16,
}

impl Application {
    pub async fn new(context: PartnerSyncContext) -> Result<Self, std::io::Error> {
        let (server, port) = Application::configure_server(context.clone()).await?;
        Application::start_job_schedulers(context);

        Ok(Self { server, port })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    fn start_job_schedulers(context: PartnerSyncContext) {
        start_partner_events_poll_scheduler(context.clone());
        start_job_worker(context.clone());
        start_job_cleanup_scheduler(context);
    }

    async fn configure_server(
        context: PartnerSyncContext,
    ) -> Result<(Server, u16), std::io::Error> {
        let port = context.config.port;
        let address = format!("0.0.0.0:{}", port);
        let listener = TcpListener::bind(&address)?;
        let port = listener.local_addr()?.port();

        let server = HttpServer::new(move || {
            let ctx = context.clone();

            App::new()
                .wrap(middleware::Compress::default())
                .wrap(TracingLogger::default())
                .app_data(web::Data::new(ctx))
                .service(web::scope("/api/v1").configure(configure_server_api))
        })
        .listen(listener)?
        .workers(4)
        .run();

        Ok((server, port))
    }

    pub async fn start(self) -> Result<(), std::io::Error> {
        self.server.await
    }
}
