use crate::services::RateLimitBucket;
use chrono_tz::Tz;
use std::{fmt::Display, str::FromStr};
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct PartnerApiConfig {
    /// Base url of the partner api
    pub url: String,
    /// Key sent to list and acknowledge events
    pub api_key_events: String,
    /// Key sent to read appointment and session details
    pub api_key_details: String,
    /// Operator name sent to the detail endpoints
    pub operator: String,
    pub request_timeout_millis: u64,
}

/// `limit` tokens are granted every `interval_millis`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimit {
    pub limit: u32,
    pub interval_millis: u64,
}

#[derive(Debug, Clone)]
pub struct RateLimits {
    pub event_listing: RateLimit,
    pub event_ack: RateLimit,
    pub appointment_detail: RateLimit,
    pub session_detail: RateLimit,
}

impl RateLimits {
    pub fn for_bucket(&self, bucket: RateLimitBucket) -> RateLimit {
        match bucket {
            RateLimitBucket::EventListing => self.event_listing,
            RateLimitBucket::EventAck => self.event_ack,
            RateLimitBucket::AppointmentDetail => self.appointment_detail,
            RateLimitBucket::SessionDetail => self.session_detail,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PushGatewayConfig {
    pub url: String,
    pub key: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    /// Port for the application to run on
    pub port: usize,
    pub partner: PartnerApiConfig,
    /// Whether partner changes are pushed to beneficiaries
    pub notify_on_partner_events: bool,
    /// Maximum number of events a single poller run handles
    pub max_events_per_run: usize,
    pub poll_interval_secs: u64,
    /// Zone used for beneficiaries without one
    pub default_timezone: Tz,
    pub rate_limits: RateLimits,
    /// Notifications are only logged when this is not set
    pub push_gateway: Option<PushGatewayConfig>,
    /// Maximum number of jobs running at the same time in this process
    pub job_worker_concurrency: usize,
    /// A failed job is given up after this many attempts
    pub job_max_attempts: i32,
    /// A job running for longer than this is considered lost and queued again
    pub job_timeout_millis: i64,
    /// How long finished jobs are kept. Finished jobs still prevent a job with
    /// the same key from being enqueued again.
    pub job_retention_millis: i64,
}

fn env_or<T>(name: &str, default: T) -> T
where
    T: FromStr + Display,
{
    match std::env::var(name) {
        Ok(value) => match value.parse::<T>() {
            Ok(value) => value,
            Err(_) => {
                warn!(
                    "The given {}: {} is not valid, falling back to the default value: {}.",
                    name, value, default
                );
                default
            }
        },
        Err(_) => default,
    }
}

fn string_env_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| {
        info!(
            "Did not find {} environment variable. Going to use: {}",
            name, default
        );
        default.to_string()
    })
}

fn rate_limit_env(bucket: &str) -> RateLimit {
    RateLimit {
        limit: env_or(&format!("RATE_LIMIT_{}_LIMIT", bucket), 100),
        interval_millis: env_or(&format!("RATE_LIMIT_{}_INTERVAL_MS", bucket), 1000),
    }
}

impl Config {
    pub fn new() -> Self {
        let port = env_or("PORT", 5000);

        let partner = PartnerApiConfig {
            url: string_env_or("PARTNER_API_URL", "http://localhost:8081"),
            api_key_events: std::env::var("PARTNER_API_KEY_EVENTS").unwrap_or_default(),
            api_key_details: std::env::var("PARTNER_API_KEY_DETAILS").unwrap_or_default(),
            operator: string_env_or("PARTNER_OPERATOR", "applicationcej"),
            request_timeout_millis: env_or("PARTNER_REQUEST_TIMEOUT_MS", 10_000),
        };

        let push_gateway = match (
            std::env::var("PUSH_GATEWAY_URL"),
            std::env::var("PUSH_GATEWAY_KEY"),
        ) {
            (Ok(url), Ok(key)) => Some(PushGatewayConfig { url, key }),
            (Ok(url), Err(_)) => Some(PushGatewayConfig {
                url,
                key: Default::default(),
            }),
            _ => {
                info!("Did not find PUSH_GATEWAY_URL environment variable. Notifications will only be logged.");
                None
            }
        };

        Self {
            port,
            partner,
            notify_on_partner_events: env_or("NOTIFY_ON_PARTNER_EVENTS", false),
            max_events_per_run: env_or("PARTNER_EVENTS_MAX_PER_RUN", 1000),
            poll_interval_secs: env_or("PARTNER_EVENTS_POLL_INTERVAL_SECS", 60),
            default_timezone: env_or("DEFAULT_TIMEZONE", chrono_tz::Europe::Paris),
            rate_limits: RateLimits {
                event_listing: rate_limit_env("EVENT_LISTING"),
                event_ack: rate_limit_env("EVENT_ACK"),
                appointment_detail: rate_limit_env("APPOINTMENT_DETAIL"),
                session_detail: rate_limit_env("SESSION_DETAIL"),
            },
            push_gateway,
            job_worker_concurrency: env_or("JOB_WORKER_CONCURRENCY", 10),
            job_max_attempts: env_or("JOB_MAX_ATTEMPTS", 3),
            job_timeout_millis: 1000 * env_or("JOB_TIMEOUT_SECS", 10 * 60),
            job_retention_millis: 1000 * 60 * 60 * env_or("JOB_RETENTION_HOURS", 48),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}
