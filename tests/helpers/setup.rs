use partner_sync_api::Application;
use partner_sync_infra::{Config, PartnerSyncContext};

pub struct TestApp {
    pub config: Config,
    pub address: String,
}

// Launch the application as a background task
pub async fn spawn_app() -> TestApp {
    let mut ctx = PartnerSyncContext::create_inmemory();
    ctx.config.port = 0; // Random port

    let config = ctx.config.clone();
    let application = Application::new(ctx)
        .await
        .expect("Failed to build application.");

    let address = format!("http://localhost:{}", application.port());
    let _ = actix_web::rt::spawn(async move {
        application
            .start()
            .await
            .expect("Expected application to start");
    });

    TestApp { config, address }
}
