use chrono::{DateTime, Duration, TimeZone, Utc};
use partner_sync_api::run_due_jobs;
use partner_sync_domain::{
    AppointmentNotification, Beneficiary, EventAction, EventSubject, JobType, PartnerAppointment,
    PartnerEvent, PartnerObjectType, PartnerSessionInstance, SessionNotification,
    PARTNER_DATE_FORMAT,
};
use partner_sync_infra::{
    ISys, InMemoryNotificationService, InMemoryPartner, PartnerSyncContext, SentNotification,
};
use std::sync::{
    atomic::{AtomicI64, Ordering},
    Arc,
};

struct TestClock(AtomicI64);

impl TestClock {
    fn set(&self, now: DateTime<Utc>) {
        self.0.store(now.timestamp_millis(), Ordering::SeqCst);
    }
}

impl ISys for TestClock {
    fn get_timestamp_millis(&self) -> i64 {
        self.0.load(Ordering::SeqCst)
    }
}

struct Pipeline {
    ctx: PartnerSyncContext,
    clock: Arc<TestClock>,
    partner: Arc<InMemoryPartner>,
    notifications: Arc<InMemoryNotificationService>,
    beneficiary: Beneficiary,
}

fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2023, 3, 1, 9, 0, 0).unwrap()
}

fn partner_date(date: DateTime<Utc>) -> String {
    date.with_timezone(&chrono_tz::Europe::Paris)
        .format(PARTNER_DATE_FORMAT)
        .to_string()
}

async fn setup() -> Pipeline {
    let clock = Arc::new(TestClock(AtomicI64::new(start().timestamp_millis())));
    let partner = Arc::new(InMemoryPartner::new());
    let notifications = Arc::new(InMemoryNotificationService::new());
    let mut ctx = PartnerSyncContext::create_inmemory()
        .with_sys(clock.clone())
        .with_partner(partner.clone())
        .with_notifications(notifications.clone());
    ctx.config.notify_on_partner_events = true;
    ctx.config.default_timezone = chrono_tz::Europe::Paris;

    let beneficiary = Beneficiary::new("123456");
    ctx.repos.beneficiaries.insert(&beneficiary).await.unwrap();

    Pipeline {
        ctx,
        clock,
        partner,
        notifications,
        beneficiary,
    }
}

fn event(id: &str, subject: EventSubject, action: EventAction, subject_id: &str) -> PartnerEvent {
    PartnerEvent {
        id: id.into(),
        beneficiary_partner_id: "123456".into(),
        action,
        subject,
        subject_id: Some(subject_id.into()),
        occurred_at: start() + Duration::seconds(id.parse().unwrap_or(0)),
    }
}

async fn poll(p: &Pipeline) -> serde_json::Value {
    p.ctx.services.jobs.enqueue_poll().await.unwrap();
    let runs = run_due_jobs(&p.ctx).await.unwrap();
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].job_type, JobType::PollPartnerEvents);
    runs[0].result.clone()
}

#[actix_web::test]
async fn partner_events_flow_into_appointments_and_reminders() {
    let p = setup().await;
    let appointment_starts_at = start() + Duration::days(10);
    let session_starts_at = start() + Duration::days(8);
    p.partner.put_appointment(PartnerAppointment {
        id: "42".into(),
        beneficiary_partner_id: "123456".into(),
        starts_at: partner_date(appointment_starts_at),
        ends_at: Some(partner_date(appointment_starts_at + Duration::hours(1))),
        title: "Point mensuel".into(),
        comment: None,
        location: None,
        modality: Some("en agence".into()),
        status: "Planifié".into(),
    });
    p.partner.put_session_instance(PartnerSessionInstance {
        id: "34".into(),
        session_id: "7".into(),
        beneficiary_partner_id: "123456".into(),
        starts_at: partner_date(session_starts_at),
        ends_at: None,
        name: Some("Atelier CV".into()),
        location: None,
        comment: None,
        status: "Prescrit".into(),
    });
    p.partner.push_event(event(
        "1",
        EventSubject::Appointment,
        EventAction::Create,
        "42",
    ));
    p.partner
        .push_event(event("2", EventSubject::Session, EventAction::Update, "34"));
    p.partner
        .push_event(event("3", EventSubject::Session, EventAction::Update, "34"));

    let summary = poll(&p).await;
    assert_eq!(summary["eventsProcessed"], 3);
    assert_eq!(summary["errors"], 0);
    assert_eq!(p.partner.pending_count(), 0);

    let runs = run_due_jobs(&p.ctx).await.unwrap();
    let outcomes = runs
        .iter()
        .map(|run| run.result["outcome"].clone())
        .collect::<Vec<_>>();
    assert_eq!(
        outcomes,
        vec!["APPOINTMENT_ADDED", "SESSION_NOTIFICATION_MODIFIED"]
    );

    let appointment = p
        .ctx
        .repos
        .appointments
        .find_by_partner(PartnerObjectType::Appointment, "42")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(appointment.date, appointment_starts_at);
    assert_eq!(appointment.duration, 60);

    // A week before both objects start
    p.clock.set(start() + Duration::days(3) + Duration::minutes(1));
    let runs = run_due_jobs(&p.ctx).await.unwrap();
    assert_eq!(runs.len(), 2);
    assert!(runs
        .iter()
        .all(|run| run.succeeded && run.result == "REMINDER_SENT"));

    assert_eq!(
        p.notifications.sent(),
        vec![
            SentNotification::Appointment {
                appointment_id: appointment.id,
                kind: AppointmentNotification::New,
            },
            SentNotification::Session {
                session_id: "7".into(),
                beneficiary_id: p.beneficiary.id,
                kind: SessionNotification::Modification,
            },
            SentNotification::Session {
                session_id: "7".into(),
                beneficiary_id: p.beneficiary.id,
                kind: SessionNotification::Reminder,
            },
            SentNotification::Appointment {
                appointment_id: appointment.id,
                kind: AppointmentNotification::Reminder,
            },
        ]
    );
}

#[actix_web::test]
async fn redelivered_events_are_processed_once() {
    let p = setup().await;
    p.partner.push_event(event(
        "1",
        EventSubject::Appointment,
        EventAction::Delete,
        "42",
    ));

    poll(&p).await;
    let runs = run_due_jobs(&p.ctx).await.unwrap();
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].result["outcome"], "DELETE_UNKNOWN");

    p.clock.set(start() + Duration::minutes(1));
    p.partner.push_event(event(
        "1",
        EventSubject::Appointment,
        EventAction::Delete,
        "42",
    ));
    let summary = poll(&p).await;
    assert_eq!(summary["eventsProcessed"], 1);
    assert!(run_due_jobs(&p.ctx).await.unwrap().is_empty());
    assert_eq!(p.partner.acknowledged(), vec!["1", "1"]);
}
