mod config;
mod repos;
mod services;
mod system;

pub use config::{Config, PartnerApiConfig, PushGatewayConfig, RateLimit, RateLimits};
pub use repos::{IAppointmentRepo, IBeneficiaryRepo, IJobRepo, IJobRunRepo, Repos};
pub use services::*;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
pub use system::{ISys, RealSys};

/// Collaborators the pipeline talks to
#[derive(Clone)]
pub struct Services {
    pub partner_events: Arc<dyn IPartnerEventSource>,
    pub partner_details: Arc<dyn IPartnerDetailSource>,
    pub notifications: Arc<dyn INotificationService>,
    pub jobs: Arc<dyn IJobScheduler>,
}

#[derive(Clone)]
pub struct PartnerSyncContext {
    pub repos: Repos,
    pub services: Services,
    pub config: Config,
    pub sys: Arc<dyn ISys>,
}

struct ContextParams {
    pub postgres_connection_string: String,
}

impl PartnerSyncContext {
    async fn create(params: ContextParams) -> anyhow::Result<Self> {
        let config = Config::new();
        let sys: Arc<dyn ISys> = Arc::new(RealSys {});
        let repos = Repos::create_postgres(&params.postgres_connection_string).await?;

        let rate_limiter = Arc::new(TokenBucketRateLimiter::new(config.rate_limits.clone()));
        let partner = Arc::new(PartnerHttpClient::new(
            config.partner.clone(),
            config.default_timezone,
            rate_limiter,
        )?);
        let services = Services {
            partner_events: partner.clone(),
            partner_details: partner,
            notifications: Arc::new(PushGatewayNotificationService::new(
                config.push_gateway.clone(),
            )),
            jobs: Arc::new(JobScheduler::new(repos.jobs.clone(), sys.clone())),
        };

        Ok(Self {
            repos,
            services,
            config,
            sys,
        })
    }

    /// Context backed by in-memory storage and a fake partner
    pub fn create_inmemory() -> Self {
        let repos = Repos::create_inmemory();
        let sys: Arc<dyn ISys> = Arc::new(RealSys {});
        let partner = Arc::new(InMemoryPartner::new());
        let services = Services {
            partner_events: partner.clone(),
            partner_details: partner,
            notifications: Arc::new(InMemoryNotificationService::new()),
            jobs: Arc::new(JobScheduler::new(repos.jobs.clone(), sys.clone())),
        };
        Self {
            repos,
            services,
            config: Config::new(),
            sys,
        }
    }

    pub fn with_sys(mut self, sys: Arc<dyn ISys>) -> Self {
        self.services.jobs = Arc::new(JobScheduler::new(self.repos.jobs.clone(), sys.clone()));
        self.sys = sys;
        self
    }

    pub fn with_partner(mut self, partner: Arc<InMemoryPartner>) -> Self {
        self.services.partner_events = partner.clone();
        self.services.partner_details = partner;
        self
    }

    pub fn with_notifications(mut self, notifications: Arc<dyn INotificationService>) -> Self {
        self.services.notifications = notifications;
        self
    }
}

/// Will setup the infrastructure context given the environment
pub async fn setup_context() -> anyhow::Result<PartnerSyncContext> {
    PartnerSyncContext::create(ContextParams {
        postgres_connection_string: get_psql_connection_string()?,
    })
    .await
}

fn get_psql_connection_string() -> anyhow::Result<String> {
    const PSQL_CONNECTION_STRING: &str = "DATABASE_URL";

    std::env::var(PSQL_CONNECTION_STRING)
        .map_err(|_| anyhow::anyhow!("{} env var to be present.", PSQL_CONNECTION_STRING))
}

pub async fn run_migration() -> anyhow::Result<()> {
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&get_psql_connection_string()?)
        .await?;

    sqlx::migrate!().run(&pool).await?;
    Ok(())
}
