use calert_core::{AlertState, AttendeeStatus, Trigger, TriggerKind};
use calert_engine::notify::{Notification, NotificationSink};
use calert_engine::policy::{FixedRingerMode, RingerMode};
use calert_engine::rescue::AlarmScheduler;
use calert_engine::AlertWorker;
use calert_storage::{AlertStore, NewAlert, PrefStore};
use chrono::{DateTime, Duration, TimeZone, Utc};
use std::sync::{Arc, Mutex};
use tempfile::NamedTempFile;

#[derive(Debug, Clone, PartialEq)]
enum SinkOp {
    Notify(u32),
    Cancel(u32),
    CancelAll,
}

#[derive(Default, Clone)]
struct SharedSink {
    ops: Arc<Mutex<Vec<SinkOp>>>,
}

impl SharedSink {
    fn ops(&self) -> Vec<SinkOp> {
        self.ops.lock().expect("sink lock").clone()
    }
}

impl NotificationSink for SharedSink {
    fn notify(&self, id: u32, _notification: &Notification) {
        self.ops.lock().expect("sink lock").push(SinkOp::Notify(id));
    }

    fn cancel(&self, id: u32) {
        self.ops.lock().expect("sink lock").push(SinkOp::Cancel(id));
    }

    fn cancel_all(&self) {
        self.ops.lock().expect("sink lock").push(SinkOp::CancelAll);
    }
}

#[derive(Default, Clone)]
struct SharedScheduler {
    wakeups: Arc<Mutex<Vec<DateTime<Utc>>>>,
}

impl AlarmScheduler for SharedScheduler {
    fn schedule_wakeup(&self, at: DateTime<Utc>) {
        self.wakeups.lock().expect("scheduler lock").push(at);
    }
}

fn base_ts() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0)
        .single()
        .expect("valid timestamp")
}

fn due_alert(event_id: i64) -> NewAlert {
    // Begins shortly before the wall clock the worker will observe, runs
    // long enough to still be current.
    let begin = Utc::now() - Duration::minutes(5);
    NewAlert {
        event_id,
        alarm_time: begin - Duration::minutes(10),
        begin_time: begin,
        end_time: begin + Duration::hours(2),
        minutes: 10,
        title: Some(format!("event-{event_id}")),
        location: None,
        description: None,
        self_attendee_status: AttendeeStatus::Accepted,
        all_day: false,
    }
}

fn spawn_worker(
    db: &NamedTempFile,
    sink: &SharedSink,
    scheduler: &SharedScheduler,
) -> calert_engine::WorkerHandle {
    let store = AlertStore::open(db.path()).expect("alert store");
    let prefs = PrefStore::open(db.path()).expect("pref store");
    AlertWorker::new(
        store,
        prefs,
        Box::new(sink.clone()),
        Box::new(scheduler.clone()),
        Box::new(FixedRingerMode(RingerMode::Normal)),
    )
    .spawn()
    .expect("spawn worker")
}

#[test]
fn triggers_complete_in_fifo_order() {
    let db = NamedTempFile::new().expect("temp db");
    let seed = AlertStore::open(db.path()).expect("seed store");
    let id = seed.insert_alert(&due_alert(1)).expect("insert");
    drop(seed);

    let sink = SharedSink::default();
    let scheduler = SharedScheduler::default();
    let handle = spawn_worker(&db, &sink, &scheduler);

    let first = handle.dispatch(Trigger::new(TriggerKind::EventReminderFired));
    let second = handle.dispatch(Trigger::from_action("provider-sync"));
    let third = handle.dispatch(Trigger::with_quiet(TriggerKind::EventReminderFired, true));

    // Each completion signal fires only after its message fully processed,
    // in arrival order.
    assert!(first.blocking_recv().expect("first completion"));
    assert!(!second.blocking_recv().expect("second completion"));
    assert!(third.blocking_recv().expect("third completion"));

    handle.shutdown();

    // Two reconciliation passes posted, the unknown action posted nothing.
    assert_eq!(sink.ops().len(), 2);

    let store = AlertStore::open(db.path()).expect("verify store");
    let alert = store.alert(id).expect("query").expect("row");
    assert_eq!(alert.state, AlertState::Fired);
    assert!(alert.received_time.is_some());
    assert!(alert.notify_time.is_some());
}

#[test]
fn boot_trigger_runs_recovery_before_reconciliation() {
    let db = NamedTempFile::new().expect("temp db");
    let seed = AlertStore::open(db.path()).expect("seed store");
    // Overdue alarm for an event that has not started yet.
    let begin = Utc::now() + Duration::minutes(30);
    seed.insert_alert(&NewAlert {
        event_id: 1,
        alarm_time: Utc::now() - Duration::minutes(40),
        begin_time: begin,
        end_time: begin + Duration::hours(1),
        minutes: 10,
        title: Some("overdue".to_string()),
        location: None,
        description: None,
        self_attendee_status: AttendeeStatus::Accepted,
        all_day: false,
    })
    .expect("insert");
    drop(seed);

    let sink = SharedSink::default();
    let scheduler = SharedScheduler::default();
    let handle = spawn_worker(&db, &sink, &scheduler);

    let done = handle.dispatch(Trigger::new(TriggerKind::BootCompleted));
    assert!(done.blocking_recv().expect("completion"));
    handle.shutdown();

    assert_eq!(scheduler.wakeups.lock().expect("scheduler lock").len(), 1);
    // The alert fired during the reconciliation half and was posted.
    assert!(matches!(sink.ops()[0], SinkOp::Notify(_)));
}

#[test]
fn global_disable_short_circuits_to_cancel_all() {
    let db = NamedTempFile::new().expect("temp db");
    let seed = AlertStore::open(db.path()).expect("seed store");
    let id = seed.insert_alert(&due_alert(1)).expect("insert");
    drop(seed);
    let prefs = PrefStore::open(db.path()).expect("prefs");
    prefs
        .set(calert_storage::pref_keys::ALERTS_ENABLED, "false")
        .expect("set");
    drop(prefs);

    let sink = SharedSink::default();
    let scheduler = SharedScheduler::default();
    let handle = spawn_worker(&db, &sink, &scheduler);

    let done = handle.dispatch(Trigger::new(TriggerKind::EventReminderFired));
    assert!(done.blocking_recv().expect("completion"));
    handle.shutdown();

    assert_eq!(sink.ops(), vec![SinkOp::CancelAll]);
    let store = AlertStore::open(db.path()).expect("verify store");
    assert_eq!(
        store.alert(id).expect("query").expect("row").state,
        AlertState::Scheduled
    );
}

#[test]
fn dispatch_after_shutdown_resolves_false() {
    let db = NamedTempFile::new().expect("temp db");
    let sink = SharedSink::default();
    let scheduler = SharedScheduler::default();
    let handle = spawn_worker(&db, &sink, &scheduler);

    let sender = handle.sender();
    handle.shutdown();

    let done = sender.dispatch(Trigger::new(TriggerKind::LocaleChanged));
    assert!(!done.blocking_recv().expect("completion"));
}

#[test]
fn stale_dismissal_clears_ended_alerts_across_restart() {
    let db = NamedTempFile::new().expect("temp db");
    let seed = AlertStore::open(db.path()).expect("seed store");
    let begin = base_ts() - Duration::days(2);
    let id = seed
        .insert_alert(&NewAlert {
            event_id: 1,
            alarm_time: begin - Duration::minutes(10),
            begin_time: begin,
            end_time: begin + Duration::hours(1),
            minutes: 10,
            title: Some("long gone".to_string()),
            location: None,
            description: None,
            self_attendee_status: AttendeeStatus::Accepted,
            all_day: false,
        })
        .expect("insert");
    drop(seed);

    let sink = SharedSink::default();
    let scheduler = SharedScheduler::default();
    let handle = spawn_worker(&db, &sink, &scheduler);
    let done = handle.dispatch(Trigger::new(TriggerKind::DismissStaleAlerts));
    // No surviving notifications: the pass reports no-op.
    assert!(!done.blocking_recv().expect("completion"));
    handle.shutdown();

    let store = AlertStore::open(db.path()).expect("verify store");
    assert_eq!(
        store.alert(id).expect("query").expect("row").state,
        AlertState::Dismissed
    );
}
