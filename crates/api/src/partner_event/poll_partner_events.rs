use crate::shared::usecase::UseCase;
use partner_sync_domain::{EventSubject, JobType, PartnerEvent};
use partner_sync_infra::{PartnerError, PartnerSyncContext};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use tracing::{error, warn};

/// Drains the partner's pending events into processing jobs
#[derive(Debug)]
pub struct PollPartnerEventsUseCase {}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PollSummary {
    pub events_processed: usize,
    pub events_remaining_cap: usize,
    pub queue_depth_at_stop: usize,
    pub errors: usize,
}

#[derive(Debug)]
pub enum UseCaseError {
    PartnerUnavailable(PartnerError),
    StorageError(anyhow::Error),
}

/// Keeps one session event per dedup key, the latest one, and every other event.
/// Ties on the occurrence date keep the first event seen.
fn deduplicate(batch: &[PartnerEvent]) -> Vec<&PartnerEvent> {
    let mut latest = HashMap::new();
    for (index, event) in batch.iter().enumerate() {
        if event.subject != EventSubject::Session {
            continue;
        }
        latest
            .entry(event.dedup_key())
            .and_modify(|kept: &mut usize| {
                if event.occurred_at > batch[*kept].occurred_at {
                    *kept = index;
                }
            })
            .or_insert(index);
    }

    batch
        .iter()
        .enumerate()
        .filter(|(index, event)| {
            event.subject != EventSubject::Session
                || latest.get(&event.dedup_key()) == Some(index)
        })
        .map(|(_, event)| event)
        .collect()
}

impl PollPartnerEventsUseCase {
    async fn schedule(&self, batch: &[PartnerEvent], ctx: &PartnerSyncContext) -> usize {
        let mut errors = 0;
        for event in deduplicate(batch) {
            if let Err(e) = ctx.services.jobs.enqueue_event_job(event).await {
                error!("Unable to enqueue partner event {}: {:?}", event.id, e);
                errors += 1;
            }
        }
        errors
    }

    async fn acknowledge(&self, batch: &[PartnerEvent], ctx: &PartnerSyncContext) -> usize {
        let mut errors = 0;
        for event in batch {
            if let Err(e) = ctx.services.partner_events.acknowledge(event).await {
                error!("Unable to acknowledge partner event {}: {:?}", event.id, e);
                errors += 1;
            }
        }
        errors
    }

    async fn peek_queue_depth(&self, ctx: &PartnerSyncContext) -> usize {
        match ctx.services.partner_events.list_pending_events().await {
            Ok(events) => events.len(),
            Err(e) => {
                warn!("Unable to read the remaining partner queue depth: {:?}", e);
                0
            }
        }
    }
}

#[async_trait::async_trait(?Send)]
impl UseCase for PollPartnerEventsUseCase {
    type Response = PollSummary;

    type Errors = UseCaseError;

    async fn execute(&mut self, ctx: &PartnerSyncContext) -> Result<Self::Response, Self::Errors> {
        let budget = ctx.config.max_events_per_run;
        let mut summary = PollSummary {
            events_processed: 0,
            events_remaining_cap: budget,
            queue_depth_at_stop: 0,
            errors: 0,
        };

        let another_run_active = ctx
            .services
            .jobs
            .is_another_instance_running(JobType::PollPartnerEvents)
            .await
            .map_err(UseCaseError::StorageError)?;
        if another_run_active {
            warn!("Another partner events poll is running, skipping this one");
            return Ok(summary);
        }

        // Events already handled during this run are listed again when their ack failed
        let mut seen = HashSet::new();
        while summary.events_remaining_cap > 0 {
            let listed = ctx
                .services
                .partner_events
                .list_pending_events()
                .await
                .map_err(UseCaseError::PartnerUnavailable)?;
            let listed_count = listed.len();
            let mut batch = listed
                .into_iter()
                .filter(|event| seen.insert(event.id.clone()))
                .collect::<Vec<_>>();
            if batch.is_empty() {
                if listed_count > 0 {
                    warn!(
                        "{} partner events are still pending after being handled in this poll",
                        listed_count
                    );
                }
                summary.queue_depth_at_stop = listed_count;
                break;
            }

            let overflow = batch.len().saturating_sub(summary.events_remaining_cap);
            batch.truncate(summary.events_remaining_cap);

            summary.errors += self.schedule(&batch, ctx).await;
            summary.errors += self.acknowledge(&batch, ctx).await;

            summary.events_processed += batch.len();
            summary.events_remaining_cap -= batch.len();

            if summary.events_remaining_cap == 0 {
                summary.queue_depth_at_stop = if overflow > 0 {
                    overflow
                } else {
                    self.peek_queue_depth(ctx).await
                };
            }
        }

        Ok(summary)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::shared::usecase::execute;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use partner_sync_domain::{EventAction, Job, JobPayload};
    use partner_sync_infra::{IPartnerEventSource, InMemoryPartner};
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2023, 3, 1, 12, 0, 0).unwrap()
    }

    fn event(id: &str, subject: EventSubject, subject_id: &str, minutes: i64) -> PartnerEvent {
        PartnerEvent {
            id: id.into(),
            beneficiary_partner_id: "123456".into(),
            action: EventAction::Update,
            subject,
            subject_id: Some(subject_id.into()),
            occurred_at: now() + Duration::minutes(minutes),
        }
    }

    fn setup(partner: Arc<InMemoryPartner>) -> PartnerSyncContext {
        PartnerSyncContext::create_inmemory().with_partner(partner)
    }

    async fn scheduled_event(ctx: &PartnerSyncContext, event_id: &str) -> Option<Job> {
        ctx.repos
            .jobs
            .find(&format!("partner-event:{}", event_id))
            .await
            .unwrap()
    }

    /// Feed that never runs dry
    struct EndlessFeed {
        page_size: usize,
        listed: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl IPartnerEventSource for EndlessFeed {
        async fn list_pending_events(&self) -> Result<Vec<PartnerEvent>, PartnerError> {
            let page = self.listed.fetch_add(1, Ordering::SeqCst);
            Ok((0..self.page_size)
                .map(|i| {
                    let id = format!("{}-{}", page, i);
                    event(&id, EventSubject::Appointment, &id, 0)
                })
                .collect())
        }

        async fn acknowledge(&self, _event: &PartnerEvent) -> Result<(), PartnerError> {
            Ok(())
        }
    }

    #[actix_web::test]
    async fn keeps_only_the_latest_session_event_per_key() {
        let partner = Arc::new(InMemoryPartner::new());
        partner.push_event(event("1", EventSubject::Session, "34", 0));
        partner.push_event(event("2", EventSubject::Session, "34", 10));
        partner.push_event(event("3", EventSubject::Session, "34", 5));
        let ctx = setup(partner.clone());

        let res = execute(PollPartnerEventsUseCase {}, &ctx).await.unwrap();

        assert_eq!(res.events_processed, 3);
        assert_eq!(res.errors, 0);
        assert!(scheduled_event(&ctx, "1").await.is_none());
        assert!(scheduled_event(&ctx, "2").await.is_some());
        assert!(scheduled_event(&ctx, "3").await.is_none());
        assert_eq!(partner.acknowledged(), vec!["1", "2", "3"]);
        assert_eq!(partner.pending_count(), 0);
    }

    #[actix_web::test]
    async fn never_deduplicates_appointment_events() {
        let partner = Arc::new(InMemoryPartner::new());
        partner.push_event(event("1", EventSubject::Appointment, "42", 0));
        partner.push_event(event("2", EventSubject::Appointment, "42", 10));
        let ctx = setup(partner.clone());

        let res = execute(PollPartnerEventsUseCase {}, &ctx).await.unwrap();

        assert_eq!(res.events_processed, 2);
        assert!(scheduled_event(&ctx, "1").await.is_some());
        assert!(scheduled_event(&ctx, "2").await.is_some());
    }

    #[actix_web::test]
    async fn drains_the_feed_page_by_page() {
        let partner = Arc::new(InMemoryPartner::with_page_size(2));
        for i in 0..5 {
            let id = i.to_string();
            partner.push_event(event(&id, EventSubject::Appointment, &id, 0));
        }
        let ctx = setup(partner.clone());

        let res = execute(PollPartnerEventsUseCase {}, &ctx).await.unwrap();

        assert_eq!(
            res,
            PollSummary {
                events_processed: 5,
                events_remaining_cap: ctx.config.max_events_per_run - 5,
                queue_depth_at_stop: 0,
                errors: 0,
            }
        );
        // Three pages and the empty one
        assert_eq!(partner.list_calls(), 4);
    }

    #[actix_web::test]
    async fn stops_once_the_budget_is_consumed() {
        let feed = Arc::new(EndlessFeed {
            page_size: 4,
            listed: AtomicUsize::new(0),
        });
        let mut ctx = PartnerSyncContext::create_inmemory();
        ctx.services.partner_events = feed.clone();
        ctx.config.max_events_per_run = 10;

        let res = execute(PollPartnerEventsUseCase {}, &ctx).await.unwrap();

        assert_eq!(res.events_processed, 10);
        assert_eq!(res.events_remaining_cap, 0);
        assert!(res.queue_depth_at_stop > 0);
        assert_eq!(feed.listed.load(Ordering::SeqCst), 3);
    }

    #[actix_web::test]
    async fn peeks_at_the_queue_when_the_budget_ends_on_a_page_boundary() {
        let feed = Arc::new(EndlessFeed {
            page_size: 5,
            listed: AtomicUsize::new(0),
        });
        let mut ctx = PartnerSyncContext::create_inmemory();
        ctx.services.partner_events = feed.clone();
        ctx.config.max_events_per_run = 10;

        let res = execute(PollPartnerEventsUseCase {}, &ctx).await.unwrap();

        assert_eq!(res.events_processed, 10);
        assert_eq!(res.queue_depth_at_stop, 5);
        assert_eq!(feed.listed.load(Ordering::SeqCst), 3);
    }

    #[actix_web::test]
    async fn does_nothing_when_another_poll_is_running() {
        let partner = Arc::new(InMemoryPartner::new());
        partner.push_event(event("1", EventSubject::Appointment, "42", 0));
        let ctx = setup(partner.clone());
        for key in ["poll-partner-events:1", "poll-partner-events:2"] {
            ctx.repos
                .jobs
                .upsert(&Job::new(key, now(), JobPayload::PollPartnerEvents))
                .await
                .unwrap();
        }
        ctx.repos.jobs.claim_due(Utc::now(), 10).await.unwrap();

        let res = execute(PollPartnerEventsUseCase {}, &ctx).await.unwrap();

        assert_eq!(res.events_processed, 0);
        assert_eq!(partner.list_calls(), 0);
        assert_eq!(partner.pending_count(), 1);
    }

    #[actix_web::test]
    async fn keeps_acknowledging_after_a_failure() {
        let partner = Arc::new(InMemoryPartner::new());
        partner.push_event(event("1", EventSubject::Appointment, "42", 0));
        partner.push_event(event("2", EventSubject::Appointment, "43", 0));
        partner.fail_ack_for("1");
        let mut ctx = setup(partner.clone());
        ctx.config.max_events_per_run = 2;

        let res = execute(PollPartnerEventsUseCase {}, &ctx).await.unwrap();

        assert_eq!(res.errors, 1);
        assert_eq!(partner.acknowledged(), vec!["2"]);
        assert!(scheduled_event(&ctx, "1").await.is_some());
        assert!(scheduled_event(&ctx, "2").await.is_some());
    }

    #[actix_web::test]
    async fn stops_when_only_handled_events_are_left() {
        let partner = Arc::new(InMemoryPartner::new());
        partner.push_event(event("1", EventSubject::Appointment, "42", 0));
        partner.push_event(event("2", EventSubject::Appointment, "43", 0));
        partner.fail_ack_for("1");
        let ctx = setup(partner.clone());

        let res = execute(PollPartnerEventsUseCase {}, &ctx).await.unwrap();

        assert_eq!(
            res,
            PollSummary {
                events_processed: 2,
                events_remaining_cap: ctx.config.max_events_per_run - 2,
                queue_depth_at_stop: 1,
                errors: 1,
            }
        );
        assert_eq!(partner.list_calls(), 2);
        assert_eq!(partner.pending_count(), 1);
        assert_eq!(partner.acknowledged(), vec!["2"]);
    }
}
