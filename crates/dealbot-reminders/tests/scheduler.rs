use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{Duration, TimeZone, Utc};
use dealbot_core::{Category, Deal, ManualClock, Reminder, ReminderStatus, REMINDER_TTL};
use dealbot_reminders::{
    MemoryReminderStore, ReminderError, ReminderScheduler, ReminderSink, ReminderStore,
};

#[derive(Default)]
struct RecordingSink {
    fail: AtomicBool,
    /// Users the sink can never reach.
    unreachable: Vec<String>,
    tokens: Mutex<Vec<String>>,
}

#[async_trait]
impl ReminderSink for RecordingSink {
    async fn deliver(&self, reminder: &Reminder, idempotency_token: &str) -> Result<(), ReminderError> {
        if self.unreachable.contains(&reminder.user_id) {
            return Err(ReminderError::Delivery {
                message: format!("no bot can reach user {}", reminder.user_id),
                transient: false,
            });
        }
        if self.fail.load(Ordering::SeqCst) {
            return Err(ReminderError::Delivery {
                message: "transport down".to_string(),
                transient: true,
            });
        }
        self.tokens.lock().unwrap().push(idempotency_token.to_string());
        Ok(())
    }
}

fn deal(name: &str) -> Deal {
    Deal::new(
        "google_cse",
        Category::Food,
        name,
        "1-for-1 coffee",
        "530349",
        Utc.with_ymd_and_hms(2026, 10, 1, 0, 0, 0).unwrap(),
    )
}

fn setup() -> (Arc<MemoryReminderStore>, ManualClock, ReminderScheduler) {
    let store = Arc::new(MemoryReminderStore::new());
    let clock = ManualClock::new(Utc.with_ymd_and_hms(2026, 10, 1, 2, 0, 0).unwrap());
    let scheduler = ReminderScheduler::new(store.clone()).with_clock(Arc::new(clock.clone()));
    (store, clock, scheduler)
}

#[tokio::test]
async fn reminder_fires_exactly_once_after_its_delay() {
    let (store, clock, scheduler) = setup();
    let d = deal("Toast Box");
    let id = scheduler.schedule("6591234567", &d, Duration::hours(1)).await.unwrap();

    assert!(scheduler.sweep().await.unwrap().is_empty(), "not due yet");

    clock.advance(Duration::hours(1));
    let due = scheduler.sweep().await.unwrap();
    assert_eq!(due.len(), 1);
    assert_eq!(due[0].reminder_id, id);
    assert_eq!(due[0].deal_snapshot, d);

    let sink = RecordingSink::default();
    let report = scheduler.dispatch_due(&sink).await.unwrap();
    assert_eq!(report.delivered, 1);
    assert_eq!(report.failed, 0);
    assert!(!report.deferred);
    assert_eq!(*sink.tokens.lock().unwrap(), vec![id.to_string()]);
    assert_eq!(store.get(id).await.unwrap().unwrap().status, ReminderStatus::Sent);

    assert!(scheduler.sweep().await.unwrap().is_empty());
}

#[tokio::test]
async fn failed_delivery_leaves_reminder_pending() {
    let (store, clock, scheduler) = setup();
    let id = scheduler
        .schedule("6591234567", &deal("Ya Kun"), Duration::minutes(30))
        .await
        .unwrap();
    clock.advance(Duration::minutes(30));

    let sink = RecordingSink::default();
    sink.fail.store(true, Ordering::SeqCst);
    let report = scheduler.dispatch_due(&sink).await.unwrap();
    assert_eq!(report.delivered, 0);
    assert_eq!(report.failed, 1);
    assert_eq!(store.get(id).await.unwrap().unwrap().status, ReminderStatus::Pending);

    sink.fail.store(false, Ordering::SeqCst);
    let report = scheduler.dispatch_due(&sink).await.unwrap();
    assert_eq!(report.delivered, 1);
    assert_eq!(store.get(id).await.unwrap().unwrap().status, ReminderStatus::Sent);
}

#[tokio::test]
async fn schedule_rejects_out_of_range_delays() {
    let (store, _clock, scheduler) = setup();
    let d = deal("Old Chang Kee");
    for delay in [Duration::zero(), Duration::minutes(-5), Duration::hours(25)] {
        let err = scheduler.schedule("u", &d, delay).await.unwrap_err();
        assert!(matches!(err, ReminderError::Rejected { .. }), "{delay:?}");
    }
    assert!(scheduler.schedule("u", &d, Duration::hours(24)).await.is_ok());
    assert_eq!(store.list_for_user("u").await.unwrap().len(), 1);
}

#[tokio::test]
async fn ttl_is_two_days_after_creation() {
    let (store, clock, scheduler) = setup();
    let created = scheduler.now();
    let id = scheduler
        .schedule("u", &deal("Kopitiam"), Duration::hours(2))
        .await
        .unwrap();
    let reminder = store.get(id).await.unwrap().unwrap();
    assert_eq!(reminder.ttl, (created + REMINDER_TTL).timestamp());
    assert!(reminder.reminder_time - reminder.created_at <= Duration::hours(24));

    clock.advance(Duration::hours(47));
    assert_eq!(scheduler.purge_expired().await.unwrap(), 0);
    clock.advance(Duration::hours(1));
    assert_eq!(scheduler.purge_expired().await.unwrap(), 1);
    assert!(store.get(id).await.unwrap().is_none());
}

#[tokio::test]
async fn cancelled_reminder_is_never_swept() {
    let (_store, clock, scheduler) = setup();
    let id = scheduler
        .schedule("u", &deal("Fun Toast"), Duration::hours(1))
        .await
        .unwrap();
    assert!(scheduler.cancel(id).await.unwrap());
    assert!(!scheduler.cancel(id).await.unwrap(), "second cancel is a no-op");

    clock.advance(Duration::hours(2));
    assert!(scheduler.sweep().await.unwrap().is_empty());

    let unknown = uuid::Uuid::new_v4();
    assert!(matches!(
        scheduler.cancel(unknown).await,
        Err(ReminderError::NotFound(id)) if id == unknown
    ));
}

#[tokio::test]
async fn overflow_is_deferred_to_the_next_tick() {
    let (_store, clock, scheduler) = setup();
    let scheduler = scheduler.with_batch_size(2);
    for i in 0..3 {
        scheduler
            .schedule("u", &deal(&format!("Stall {i}")), Duration::minutes(10 + i))
            .await
            .unwrap();
    }
    clock.advance(Duration::hours(1));

    let sink = RecordingSink::default();
    let first = scheduler.dispatch_due(&sink).await.unwrap();
    assert_eq!(first.delivered, 2);
    assert!(first.deferred);

    let second = scheduler.dispatch_due(&sink).await.unwrap();
    assert_eq!(second.delivered, 1);
    assert!(!second.deferred);
    assert_eq!(sink.tokens.lock().unwrap().len(), 3);
}

#[tokio::test]
async fn undeliverable_reminders_do_not_starve_the_batch() {
    let (store, clock, scheduler) = setup();
    let scheduler = scheduler.with_batch_size(2);
    let mut ghosts = Vec::new();
    for user in ["ghost-1", "ghost-2"] {
        ghosts.push(
            scheduler
                .schedule(user, &deal("Ah Ma Kitchen"), Duration::minutes(5))
                .await
                .unwrap(),
        );
    }
    let alice = scheduler
        .schedule("alice", &deal("Toast Box"), Duration::minutes(10))
        .await
        .unwrap();
    clock.advance(Duration::minutes(10));

    let sink = RecordingSink {
        unreachable: vec!["ghost-1".to_string(), "ghost-2".to_string()],
        ..RecordingSink::default()
    };
    let first = scheduler.dispatch_due(&sink).await.unwrap();
    assert_eq!(first.abandoned, 2);
    assert_eq!(first.failed, 0);
    assert!(first.deferred);

    clock.advance(Duration::minutes(1));
    let second = scheduler.dispatch_due(&sink).await.unwrap();
    assert_eq!(second.delivered, 1);
    assert_eq!(*sink.tokens.lock().unwrap(), vec![alice.to_string()]);

    for id in ghosts {
        assert_eq!(store.get(id).await.unwrap().unwrap().status, ReminderStatus::Failed);
    }
    assert_eq!(store.get(alice).await.unwrap().unwrap().status, ReminderStatus::Sent);
}

#[tokio::test]
async fn schedule_via_records_the_bot_number() {
    let (store, _clock, scheduler) = setup();
    let at = scheduler.now() + Duration::hours(1);
    let id = scheduler
        .schedule_via("pnid-b", "u", &deal("Kopitiam"), at)
        .await
        .unwrap();
    let stored = store.get(id).await.unwrap().unwrap();
    assert_eq!(stored.phone_number_id.as_deref(), Some("pnid-b"));
    assert_eq!(stored.reminder_time, at);

    let unrouted = scheduler.schedule_at("u", &deal("Kopitiam"), at).await.unwrap();
    assert!(store.get(unrouted).await.unwrap().unwrap().phone_number_id.is_none());

    let late = scheduler.now() + Duration::hours(25);
    assert!(matches!(
        scheduler.schedule_via("pnid-b", "u", &deal("Kopitiam"), late).await,
        Err(ReminderError::Rejected { .. })
    ));
}

#[tokio::test]
async fn parse_uses_the_scheduler_clock() {
    let (_store, _clock, scheduler) = setup();
    let at = scheduler.parse("in 90 minutes").unwrap();
    assert_eq!(at, scheduler.now() + Duration::minutes(90));
    assert!(matches!(
        scheduler.parse("in 25 hours"),
        Err(ReminderError::Rejected { .. })
    ));
}
