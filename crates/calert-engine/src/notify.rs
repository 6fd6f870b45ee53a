use crate::classify::{classify_active_alerts, ClassifiedAlerts};
use crate::policy::{reminder_ringtone, should_use_default_vibrate, RingerModeSource};
use crate::EngineError;
use calert_core::{NotificationInfo, EXPIRED_DIGEST_NOTIFICATION_ID};
use calert_storage::{pref_keys, AlertStore, PrefStore};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::{debug, info};

/// How long a started event keeps its elevated list position.
const HIGH_PRIORITY_WINDOW_MINUTES: i64 = 15;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "kebab-case")]
pub enum NotificationPriority {
    Low,
    Default,
    High,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum NotificationKind {
    Event { event_id: i64 },
    ExpiredDigest { count: usize },
}

/// Concrete payload handed to the rendering surface. All decisions are made
/// here; the sink only draws.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Notification {
    pub title: Option<String>,
    pub summary: String,
    pub description: Option<String>,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub all_day: bool,
    pub notification_kind: NotificationKind,
    pub priority: NotificationPriority,
    pub popup: bool,
    pub default_lights: bool,
    pub ticker: Option<String>,
    pub vibrate: bool,
    pub sound: Option<String>,
}

/// Rendering surface seam. `notify` with an id that is already posted
/// replaces the prior notification.
pub trait NotificationSink: Send {
    fn notify(&self, id: u32, notification: &Notification);
    fn cancel(&self, id: u32);
    fn cancel_all(&self);
}

#[derive(Debug, Clone, Default)]
struct RenderOptions {
    quiet: bool,
    popup_allowed: bool,
    vibrate: bool,
    ringtone: Option<String>,
}

fn ticker_text(event_name: Option<&str>, location: Option<&str>) -> Option<String> {
    let name = event_name.filter(|name| !name.is_empty())?;
    match location.filter(|location| !location.is_empty()) {
        Some(location) => Some(format!("{name} - {location}")),
        None => Some(name.to_string()),
    }
}

/// Short "when, where" line under the title. Locale-aware formatting is the
/// rendering surface's concern; this stays deliberately plain.
fn format_time_location(start: DateTime<Utc>, all_day: bool, location: Option<&str>) -> String {
    let when = if all_day {
        start.format("%a, %b %e").to_string()
    } else {
        start.format("%H:%M").to_string()
    };
    match location.filter(|location| !location.is_empty()) {
        Some(location) => format!("{when}, {location}"),
        None => when,
    }
}

fn event_notification(
    info: &NotificationInfo,
    priority: NotificationPriority,
    popup: bool,
    with_ticker: bool,
    options: &RenderOptions,
) -> Notification {
    let ticker = if options.quiet || !with_ticker {
        None
    } else {
        ticker_text(info.event_name.as_deref(), info.location.as_deref())
    };
    Notification {
        title: info.event_name.clone(),
        summary: format_time_location(info.start, info.all_day, info.location.as_deref()),
        description: info.description.clone(),
        start: info.start,
        end: info.end,
        all_day: info.all_day,
        notification_kind: NotificationKind::Event {
            event_id: info.event_id,
        },
        priority,
        popup,
        default_lights: true,
        ticker,
        vibrate: !options.quiet && options.vibrate,
        sound: if options.quiet {
            None
        } else {
            options.ringtone.clone()
        },
    }
}

fn digest_notification(
    expired: &[NotificationInfo],
    digest_title: Option<&str>,
    options: &RenderOptions,
) -> Notification {
    let first = &expired[0];
    let last = &expired[expired.len() - 1];
    Notification {
        title: digest_title.map(str::to_string),
        summary: format!("{} expired reminders", expired.len()),
        description: None,
        start: first.start,
        end: last.end,
        all_day: false,
        notification_kind: NotificationKind::ExpiredDigest {
            count: expired.len(),
        },
        priority: NotificationPriority::Low,
        popup: false,
        default_lights: true,
        ticker: None,
        vibrate: !options.quiet && options.vibrate,
        sound: if options.quiet {
            None
        } else {
            options.ringtone.clone()
        },
    }
}

fn render_notifications(
    sink: &dyn NotificationSink,
    classified: &ClassifiedAlerts,
    options: &RenderOptions,
    now: DateTime<Utc>,
) {
    // Future events: individual, never a pop-up.
    for info in &classified.future {
        let notification =
            event_notification(info, NotificationPriority::Default, false, true, options);
        sink.notify(info.notification_id, &notification);
        debug!(
            event_id = info.event_id,
            notification_id = info.notification_id,
            "posted upcoming notification"
        );
    }

    // Current events: elevated while recently started, then demoted in place.
    for info in &classified.current {
        let recent = now < info.start + Duration::minutes(HIGH_PRIORITY_WINDOW_MINUTES);
        let priority = if recent {
            NotificationPriority::High
        } else {
            NotificationPriority::Default
        };
        let popup = options.popup_allowed && recent;
        let notification = event_notification(info, priority, popup, true, options);
        sink.notify(info.notification_id, &notification);
        debug!(
            event_id = info.event_id,
            notification_id = info.notification_id,
            popup,
            "posted current notification"
        );
    }

    // Expired events collapse into the reserved digest slot. The individual
    // ids must be cancelled first so a demoted alert does not linger twice.
    if !classified.expired.is_empty() {
        let notification = if classified.expired.len() == 1 {
            event_notification(
                &classified.expired[0],
                NotificationPriority::Low,
                false,
                false,
                options,
            )
        } else {
            digest_notification(
                &classified.expired,
                classified.expired_digest_title.as_deref(),
                options,
            )
        };
        for info in &classified.expired {
            sink.cancel(info.notification_id);
        }
        sink.notify(EXPIRED_DIGEST_NOTIFICATION_ID, &notification);
        debug!(
            count = classified.expired.len(),
            quiet = options.quiet,
            "posted expired digest notification"
        );
    }
}

/// Runs one full reconciliation pass: master switch, classification, policy
/// resolution, rendering. Returns false for the no-op case of no active
/// alerts.
pub fn refresh_alert_notifications(
    store: &AlertStore,
    prefs: &PrefStore,
    sink: &dyn NotificationSink,
    ringer: &dyn RingerModeSource,
    quiet: bool,
    now: DateTime<Utc>,
) -> Result<bool, EngineError> {
    if !prefs.get_bool(pref_keys::ALERTS_ENABLED, true)? {
        info!("alerts are disabled, clearing notifications");
        sink.cancel_all();
        return Ok(true);
    }

    let classified = classify_active_alerts(store, now)?;
    if classified.is_empty() {
        debug!("no fired or scheduled alerts");
        sink.cancel_all();
        return Ok(false);
    }

    // Nothing newly fired means nothing to interrupt the user about, even
    // when the trigger did not ask for quiet.
    let quiet = quiet || classified.num_fired == 0;
    let options = RenderOptions {
        quiet,
        popup_allowed: classified.num_fired > 0
            && prefs.get_bool(pref_keys::POPUP_ENABLED, false)?,
        vibrate: should_use_default_vibrate(prefs, ringer.ringer_mode())?,
        ringtone: reminder_ringtone(prefs, quiet)?,
    };

    render_notifications(sink, &classified, &options, now);
    Ok(true)
}
