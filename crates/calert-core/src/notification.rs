use crate::alert::Alert;
use chrono::{DateTime, Utc};

/// Identifier reserved for the combined expired-alert notification.
pub const EXPIRED_DIGEST_NOTIFICATION_ID: u32 = 0;

/// Fallback identifier for the one alert id whose fold collides with the
/// digest id.
pub const DIGEST_COLLISION_FALLBACK_ID: u32 = u32::MAX;

/// Derives the notification identifier for an alert row.
///
/// The same alert must map to the same identifier on every pass so that
/// re-posting replaces rather than duplicates, and the result must never
/// equal [`EXPIRED_DIGEST_NOTIFICATION_ID`]. The 64->32 bit xor fold keeps
/// both halves of the row id in play without a length limit on the id space.
pub fn notification_id_for_alert(alert_id: i64) -> u32 {
    let folded = ((alert_id as u64) ^ ((alert_id as u64) >> 32)) as u32;
    if folded == EXPIRED_DIGEST_NOTIFICATION_ID {
        DIGEST_COLLISION_FALLBACK_ID
    } else {
        folded
    }
}

/// Per-pass view of one alert that survived classification. Never persisted;
/// rebuilt from the store on every reconciliation pass.
#[derive(Debug, Clone, PartialEq)]
pub struct NotificationInfo {
    pub event_name: Option<String>,
    pub location: Option<String>,
    pub description: Option<String>,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub event_id: i64,
    pub all_day: bool,
    pub notification_id: u32,
}

impl NotificationInfo {
    pub fn from_alert(alert: &Alert) -> Self {
        Self {
            event_name: alert.title.clone(),
            location: alert.location.clone(),
            description: alert.description.clone(),
            start: alert.begin_time,
            end: alert.end_time,
            event_id: alert.event_id,
            all_day: alert.all_day,
            notification_id: notification_id_for_alert(alert.alert_id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_is_stable_across_calls() {
        assert_eq!(
            notification_id_for_alert(12345),
            notification_id_for_alert(12345)
        );
    }

    #[test]
    fn id_folds_both_halves() {
        // Differs only in the high 32 bits, so a plain truncation would
        // collide.
        let low = notification_id_for_alert(42);
        let high = notification_id_for_alert(42 | (1 << 40));
        assert_ne!(low, high);
    }

    #[test]
    fn digest_collision_is_remapped() {
        // alert_id 0 folds to 0, the reserved digest id.
        assert_eq!(notification_id_for_alert(0), DIGEST_COLLISION_FALLBACK_ID);
        // A fold that cancels out: high half equals low half.
        let self_cancelling = (7_i64 << 32) | 7;
        assert_eq!(
            notification_id_for_alert(self_cancelling),
            DIGEST_COLLISION_FALLBACK_ID
        );
        assert_ne!(notification_id_for_alert(7), EXPIRED_DIGEST_NOTIFICATION_ID);
    }
}
