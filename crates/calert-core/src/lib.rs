pub mod alert;
pub mod notification;
pub mod trigger;

pub use alert::{Alert, AlertState, AttendeeStatus};
pub use notification::{
    notification_id_for_alert, NotificationInfo, DIGEST_COLLISION_FALLBACK_ID,
    EXPIRED_DIGEST_NOTIFICATION_ID,
};
pub use trigger::{Trigger, TriggerKind, QUIET_ATTR};
