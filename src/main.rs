mod telemetry;

use partner_sync_api::Application;
use partner_sync_infra::{run_migration, setup_context};
use telemetry::{get_subscriber, init_subscriber};

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    openssl_probe::init_ssl_cert_env_vars();

    let subscriber = get_subscriber("partner_sync".into(), "info".into());
    init_subscriber(subscriber)?;

    run_migration().await?;
    let context = setup_context().await?;

    let app = Application::new(context).await?;
    app.start().await?;
    Ok(())
}
