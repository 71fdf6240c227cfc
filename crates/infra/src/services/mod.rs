mod job_scheduler;
mod notification;
mod partner;
mod rate_limiter;

pub use job_scheduler::{IJobScheduler, JobScheduler};
pub use notification::{
    INotificationService, InMemoryNotificationService, PushGatewayNotificationService,
    SentNotification,
};
pub use partner::{
    IPartnerDetailSource, IPartnerEventSource, InMemoryPartner, PartnerError,
    PartnerHttpClient, PartnerLookup,
};
pub use rate_limiter::{IRateLimiter, RateLimitBucket, TokenBucketRateLimiter};
