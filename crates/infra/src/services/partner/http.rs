use super::{
    dto::{parse_events, AppointmentDto, SessionInstanceDto},
    IPartnerDetailSource, IPartnerEventSource, PartnerError, PartnerLookup,
};
use crate::{
    config::PartnerApiConfig,
    services::rate_limiter::{IRateLimiter, RateLimitBucket},
};
use chrono::Utc;
use chrono_tz::Tz;
use partner_sync_domain::{PartnerAppointment, PartnerEvent, PartnerSessionInstance};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::{sync::Arc, time::Duration};
use tracing::{error, info};

const API_KEY_HEADER: &str = "X-Gravitee-Api-Key";
const OPERATOR_HEADER: &str = "operateur";

/// Client of the partner api. Every call first takes a token from its rate limit bucket.
pub struct PartnerHttpClient {
    client: Client,
    config: PartnerApiConfig,
    default_timezone: Tz,
    rate_limiter: Arc<dyn IRateLimiter>,
}

impl PartnerHttpClient {
    pub fn new(
        config: PartnerApiConfig,
        default_timezone: Tz,
        rate_limiter: Arc<dyn IRateLimiter>,
    ) -> Result<Self, PartnerError> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_millis))
            .build()?;
        Ok(Self {
            client,
            config,
            default_timezone,
            rate_limiter,
        })
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, PartnerError> {
        request.send().await.map_err(|e| {
            error!("[Network Error] Partner API error. Error message: {:?}", e);
            PartnerError::from(e)
        })
    }

    async fn ensure_success(res: Response) -> Result<Response, PartnerError> {
        let status = res.status();
        if status.is_success() {
            return Ok(res);
        }
        let body = res.text().await.unwrap_or_default();
        error!(
            "[Unexpected Response] Partner API responded with status {}: {}",
            status, body
        );
        Err(PartnerError::UnexpectedStatus {
            status: status.as_u16(),
            body,
        })
    }

    async fn read_json<T: DeserializeOwned>(res: Response) -> Result<T, PartnerError> {
        res.json::<T>().await.map_err(|e| {
            error!(
                "[Unexpected Response] Partner API body could not be read. Error message: {:?}",
                e
            );
            PartnerError::Decode(e.to_string())
        })
    }

    async fn get_detail<T: DeserializeOwned>(
        &self,
        bucket: RateLimitBucket,
        path: String,
    ) -> Result<PartnerLookup<T>, PartnerError> {
        self.rate_limiter.acquire(bucket, 1).await;
        let request = self
            .client
            .get(format!("{}{}", self.config.url, path))
            .header(API_KEY_HEADER, &self.config.api_key_details)
            .header(OPERATOR_HEADER, &self.config.operator);
        let res = self.send(request).await?;
        if res.status() == StatusCode::NOT_FOUND {
            return Ok(PartnerLookup::NotFound);
        }
        let res = Self::ensure_success(res).await?;
        Self::read_json::<T>(res).await.map(PartnerLookup::Found)
    }
}

#[async_trait::async_trait]
impl IPartnerEventSource for PartnerHttpClient {
    async fn list_pending_events(&self) -> Result<Vec<PartnerEvent>, PartnerError> {
        self.rate_limiter
            .acquire(RateLimitBucket::EventListing, 1)
            .await;
        info!("Listing pending partner events");
        let request = self
            .client
            .get(format!("{}/operateurs/events", self.config.url))
            .header(API_KEY_HEADER, &self.config.api_key_events);
        let res = Self::ensure_success(self.send(request).await?).await?;
        let received_at = Utc::now();
        let items = Self::read_json::<Vec<serde_json::Value>>(res).await?;
        Ok(parse_events(items, &self.default_timezone, received_at))
    }

    async fn acknowledge(&self, event: &PartnerEvent) -> Result<(), PartnerError> {
        self.rate_limiter.acquire(RateLimitBucket::EventAck, 1).await;
        let request = self
            .client
            .post(format!(
                "{}/operateurs/events/{}/ack",
                self.config.url, event.id
            ))
            .header(API_KEY_HEADER, &self.config.api_key_events);
        Self::ensure_success(self.send(request).await?).await?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl IPartnerDetailSource for PartnerHttpClient {
    async fn get_appointment_detail(
        &self,
        beneficiary_partner_id: &str,
        object_id: &str,
    ) -> Result<PartnerLookup<PartnerAppointment>, PartnerError> {
        let lookup = self
            .get_detail::<AppointmentDto>(
                RateLimitBucket::AppointmentDetail,
                format!(
                    "/operateurs/dossiers/{}/rdv/{}",
                    beneficiary_partner_id, object_id
                ),
            )
            .await?;
        Ok(match lookup {
            PartnerLookup::Found(dto) => {
                PartnerLookup::Found(dto.into_appointment(beneficiary_partner_id))
            }
            PartnerLookup::NotFound => PartnerLookup::NotFound,
        })
    }

    async fn get_session_instance_detail(
        &self,
        object_id: &str,
        beneficiary_partner_id: &str,
    ) -> Result<PartnerLookup<PartnerSessionInstance>, PartnerError> {
        let lookup = self
            .get_detail::<SessionInstanceDto>(
                RateLimitBucket::SessionDetail,
                format!(
                    "/operateurs/dossiers/{}/sessions/{}",
                    beneficiary_partner_id, object_id
                ),
            )
            .await?;
        Ok(match lookup {
            PartnerLookup::Found(dto) => PartnerLookup::Found(dto.into()),
            PartnerLookup::NotFound => PartnerLookup::NotFound,
        })
    }
}
