use crate::notify::{refresh_alert_notifications, NotificationSink};
use crate::policy::RingerModeSource;
use crate::rescue::{reschedule_missed_alarms, AlarmScheduler};
use crate::EngineError;
use calert_core::{Trigger, TriggerKind};
use calert_storage::{AlertStore, PrefStore};
use chrono::{DateTime, Utc};
use std::sync::mpsc;
use std::thread::{self, JoinHandle};
use tokio::sync::oneshot;
use tracing::{error, info, warn};

/// One queued trigger plus an optional completion signal. The signal fires
/// after the message is fully processed, so a caller holding a wake-lock-like
/// resource can release it safely.
pub struct TriggerMessage {
    pub trigger: Trigger,
    pub done: Option<oneshot::Sender<bool>>,
}

enum WorkerMessage {
    Trigger(TriggerMessage),
    Shutdown,
}

/// Cloneable producer side of the worker queue.
#[derive(Clone)]
pub struct TriggerSender {
    tx: mpsc::Sender<WorkerMessage>,
}

impl TriggerSender {
    /// Enqueues a trigger and returns a receiver that resolves with the
    /// success/no-op outcome once processing finishes. If the worker is gone
    /// the receiver resolves to false immediately.
    pub fn dispatch(&self, trigger: Trigger) -> oneshot::Receiver<bool> {
        let (done_tx, done_rx) = oneshot::channel();
        let message = TriggerMessage {
            trigger,
            done: Some(done_tx),
        };
        if let Err(mpsc::SendError(WorkerMessage::Trigger(message))) =
            self.tx.send(WorkerMessage::Trigger(message))
        {
            warn!(
                action = %message.trigger.action,
                "worker is gone, dropping trigger"
            );
            if let Some(done) = message.done {
                let _ = done.send(false);
            }
        }
        done_rx
    }

    /// Fire-and-forget dispatch for callers with nothing to release.
    pub fn dispatch_detached(&self, trigger: Trigger) {
        let message = TriggerMessage {
            trigger,
            done: None,
        };
        if let Err(mpsc::SendError(WorkerMessage::Trigger(message))) =
            self.tx.send(WorkerMessage::Trigger(message))
        {
            warn!(
                action = %message.trigger.action,
                "worker is gone, dropping trigger"
            );
        }
    }
}

/// Owns the worker thread. Triggers already enqueued ahead of a shutdown
/// request are drained before the thread exits.
pub struct WorkerHandle {
    sender: TriggerSender,
    join: JoinHandle<()>,
}

impl WorkerHandle {
    pub fn sender(&self) -> TriggerSender {
        self.sender.clone()
    }

    pub fn dispatch(&self, trigger: Trigger) -> oneshot::Receiver<bool> {
        self.sender.dispatch(trigger)
    }

    /// Asks the worker to stop after the messages it already accepted and
    /// waits for it. Later dispatches resolve to false.
    pub fn shutdown(self) {
        let WorkerHandle { sender, join } = self;
        let _ = sender.tx.send(WorkerMessage::Shutdown);
        if join.join().is_err() {
            error!("alert worker thread panicked");
        }
    }
}

/// The single serial processor of alert triggers. It is the only entity that
/// mutates alert state or posts notifications, so no locking is needed on
/// the pipeline's own state.
pub struct AlertWorker {
    store: AlertStore,
    prefs: PrefStore,
    sink: Box<dyn NotificationSink>,
    scheduler: Box<dyn AlarmScheduler>,
    ringer: Box<dyn RingerModeSource>,
}

impl AlertWorker {
    pub fn new(
        store: AlertStore,
        prefs: PrefStore,
        sink: Box<dyn NotificationSink>,
        scheduler: Box<dyn AlarmScheduler>,
        ringer: Box<dyn RingerModeSource>,
    ) -> Self {
        Self {
            store,
            prefs,
            sink,
            scheduler,
            ringer,
        }
    }

    pub fn store(&self) -> &AlertStore {
        &self.store
    }

    /// Moves the worker onto its own thread and returns the handle feeding
    /// it. Messages are processed strictly in arrival order, one at a time.
    pub fn spawn(self) -> std::io::Result<WorkerHandle> {
        let (tx, rx) = mpsc::channel::<WorkerMessage>();
        let join = thread::Builder::new()
            .name("calert-worker".to_string())
            .spawn(move || self.run(rx))?;
        Ok(WorkerHandle {
            sender: TriggerSender { tx },
            join,
        })
    }

    fn run(mut self, rx: mpsc::Receiver<WorkerMessage>) {
        info!("alert worker started");
        while let Ok(message) = rx.recv() {
            let message = match message {
                WorkerMessage::Shutdown => break,
                WorkerMessage::Trigger(message) => message,
            };
            let outcome = self.process_trigger(&message.trigger, Utc::now());
            if let Some(done) = message.done {
                let _ = done.send(outcome);
            }
        }
        info!("alert worker stopped");
    }

    /// Processes one trigger to completion. Returns the success/no-op
    /// outcome; there is no separate fatal path, and redelivery of the same
    /// trigger is always safe.
    pub fn process_trigger(&mut self, trigger: &Trigger, now: DateTime<Utc>) -> bool {
        let Some(kind) = trigger.kind() else {
            warn!(action = %trigger.action, "invalid trigger action, discarding");
            return false;
        };
        match self.dispatch_kind(kind, trigger, now) {
            Ok(outcome) => outcome,
            Err(err) => {
                error!(kind = %kind, error = %err, "trigger processing failed");
                false
            }
        }
    }

    fn dispatch_kind(
        &mut self,
        kind: TriggerKind,
        trigger: &Trigger,
        now: DateTime<Utc>,
    ) -> Result<bool, EngineError> {
        match kind {
            TriggerKind::BootCompleted | TriggerKind::TimeChanged => {
                reschedule_missed_alarms(&self.store, self.scheduler.as_ref(), now)?;
                self.refresh(false, now)
            }
            TriggerKind::DismissStaleAlerts => {
                let dismissed = self.store.dismiss_stale(now)?;
                info!(dismissed, "dismissed stale alerts");
                self.refresh(false, now)
            }
            TriggerKind::EventReminderFired => self.refresh(trigger.quiet(), now),
            TriggerKind::LocaleChanged => self.refresh(false, now),
        }
    }

    fn refresh(&mut self, quiet: bool, now: DateTime<Utc>) -> Result<bool, EngineError> {
        refresh_alert_notifications(
            &self.store,
            &self.prefs,
            self.sink.as_ref(),
            self.ringer.as_ref(),
            quiet,
            now,
        )
    }
}
