use crate::EngineError;
use calert_storage::AlertStore;
use chrono::{DateTime, Utc};
use tracing::{debug, warn};

/// Wake-up arrangement seam. The host must eventually deliver an
/// `EventReminderFired` trigger at or after the requested instant.
pub trait AlarmScheduler: Send {
    fn schedule_wakeup(&self, at: DateTime<Utc>);
}

/// Finds Scheduled alarms that should already have fired but did not
/// (registrations lost to a reboot, or a clock jump made them due) and
/// re-arranges their wake-ups. Alerts older than a day or whose event
/// already ended are left alone. Returns the number of wake-ups requested.
pub fn reschedule_missed_alarms(
    store: &AlertStore,
    scheduler: &dyn AlarmScheduler,
    now: DateTime<Utc>,
) -> Result<usize, EngineError> {
    let times = store.missed_alarm_times(now)?;
    debug!(count = times.len(), "missed alarms found");

    let mut rescheduled = 0;
    let mut last: Option<DateTime<Utc>> = None;
    for alarm_time in times {
        // The scan is alarm-time ascending, so equal times arrive in runs
        // and one wake-up covers the whole run.
        if last == Some(alarm_time) {
            continue;
        }
        warn!(%alarm_time, "rescheduling missed alarm");
        scheduler.schedule_wakeup(alarm_time);
        last = Some(alarm_time);
        rescheduled += 1;
    }
    Ok(rescheduled)
}
