pub mod classify;
pub mod notify;
pub mod policy;
pub mod rescue;
pub mod worker;

use calert_storage::StorageError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

pub use classify::{classify_active_alerts, ClassifiedAlerts};
pub use notify::{
    refresh_alert_notifications, Notification, NotificationKind, NotificationPriority,
    NotificationSink,
};
pub use policy::{should_use_default_vibrate, RingerMode, RingerModeSource};
pub use rescue::{reschedule_missed_alarms, AlarmScheduler};
pub use worker::{AlertWorker, TriggerMessage, TriggerSender, WorkerHandle};
