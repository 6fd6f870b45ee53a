use crate::EngineError;
use calert_core::{AlertState, NotificationInfo};
use calert_storage::{AlertStore, AlertUpdate};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tracing::{debug, warn};

/// Output of one reconciliation pass over the active alerts.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ClassifiedAlerts {
    /// Events that have not started yet, in query order (begin descending).
    pub future: Vec<NotificationInfo>,
    /// Events currently in progress, in query order.
    pub current: Vec<NotificationInfo>,
    /// Events already over, in begin-ascending order.
    pub expired: Vec<NotificationInfo>,
    /// Alerts transitioned Scheduled -> Fired during this pass.
    pub num_fired: usize,
    /// Titles of expired events joined by ", ", begin-ascending.
    pub expired_digest_title: Option<String>,
}

impl ClassifiedAlerts {
    pub fn total(&self) -> usize {
        self.future.len() + self.current.len() + self.expired.len()
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }
}

/// Runs the state-transition and bucketing half of a reconciliation pass.
///
/// Declined alerts are dismissed and dropped. Due Scheduled alerts fire and
/// get a `received_time`; every Fired alert gets a fresh `notify_time`. One
/// NotificationInfo is produced per event id; the query order (begin
/// descending) makes the most recent occurrence the winner. Row update
/// failures are logged and do not fail the pass.
pub fn classify_active_alerts(
    store: &AlertStore,
    now: DateTime<Utc>,
) -> Result<ClassifiedAlerts, EngineError> {
    let alerts = store.active_alerts(now)?;
    debug!(count = alerts.len(), "active alerts");

    // Per-pass dedup map; intentionally not carried across passes.
    let mut seen_events: HashMap<i64, DateTime<Utc>> = HashMap::new();
    let mut classified = ClassifiedAlerts::default();

    for alert in alerts {
        let mut update = AlertUpdate::default();
        let mut state = alert.state;

        if alert.self_attendee_status.is_declined() {
            update.state = Some(AlertState::Dismissed);
            state = AlertState::Dismissed;
        } else if state == AlertState::Scheduled {
            update.state = Some(AlertState::Fired);
            update.received_time = Some(now);
            state = AlertState::Fired;
            classified.num_fired += 1;
        }

        if state == AlertState::Fired {
            update.notify_time = Some(now);
        }

        if !update.is_empty() {
            // Bookkeeping persistence is best-effort: the in-memory
            // classification still stands for this pass.
            if let Err(err) = store.update_alert(alert.alert_id, &update) {
                warn!(
                    alert_id = alert.alert_id,
                    error = %err,
                    "failed to persist alert state change"
                );
            }
        }

        if state != AlertState::Fired {
            continue;
        }

        if seen_events
            .insert(alert.event_id, alert.begin_time)
            .is_some()
        {
            // Duplicate alert for an event already represented this pass.
            continue;
        }

        let info = NotificationInfo::from_alert(&alert);
        if alert.begin_time <= now && now <= alert.end_time {
            classified.current.push(info);
        } else if alert.begin_time > now {
            classified.future.push(info);
        } else {
            // Query order is begin descending, so prepending leaves the
            // expired list begin-ascending.
            classified.expired.insert(0, info);
            if let Some(title) = alert.title.as_deref().filter(|title| !title.is_empty()) {
                classified.expired_digest_title =
                    Some(match classified.expired_digest_title.take() {
                        None => title.to_string(),
                        Some(rest) => format!("{title}, {rest}"),
                    });
            }
        }
    }

    Ok(classified)
}
