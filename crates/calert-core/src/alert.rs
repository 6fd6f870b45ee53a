use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lifecycle state of a persisted alert. `Dismissed` is terminal; the only
/// forward transition this system drives is `Scheduled` -> `Fired`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum AlertState {
    Scheduled,
    Fired,
    Dismissed,
}

impl AlertState {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertState::Scheduled => "scheduled",
            AlertState::Fired => "fired",
            AlertState::Dismissed => "dismissed",
        }
    }

    /// Numeric code used by the alert store.
    pub fn code(&self) -> i64 {
        match self {
            AlertState::Scheduled => 0,
            AlertState::Fired => 1,
            AlertState::Dismissed => 2,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(AlertState::Scheduled),
            1 => Some(AlertState::Fired),
            2 => Some(AlertState::Dismissed),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, AlertState::Dismissed)
    }
}

impl fmt::Display for AlertState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AlertState {
    type Err = String;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        match input.trim().to_lowercase().as_str() {
            "scheduled" => Ok(AlertState::Scheduled),
            "fired" => Ok(AlertState::Fired),
            "dismissed" => Ok(AlertState::Dismissed),
            other => Err(format!("Unknown alert state: {other}")),
        }
    }
}

/// The calendar owner's own attendance response on the underlying event.
/// Codes follow the upstream attendee constants.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum AttendeeStatus {
    None,
    Accepted,
    Declined,
    Invited,
    Tentative,
}

impl AttendeeStatus {
    pub fn code(&self) -> i64 {
        match self {
            AttendeeStatus::None => 0,
            AttendeeStatus::Accepted => 1,
            AttendeeStatus::Declined => 2,
            AttendeeStatus::Invited => 3,
            AttendeeStatus::Tentative => 4,
        }
    }

    /// Unknown codes degrade to `None` rather than failing the row.
    pub fn from_code(code: i64) -> Self {
        match code {
            1 => AttendeeStatus::Accepted,
            2 => AttendeeStatus::Declined,
            3 => AttendeeStatus::Invited,
            4 => AttendeeStatus::Tentative,
            _ => AttendeeStatus::None,
        }
    }

    pub fn is_declined(&self) -> bool {
        matches!(self, AttendeeStatus::Declined)
    }
}

impl Default for AttendeeStatus {
    fn default() -> Self {
        Self::None
    }
}

/// One row of the alert store. `received_time` and `notify_time` are
/// diagnostics written when the alert fires and each time it is notified.
#[derive(Debug, Clone, PartialEq)]
pub struct Alert {
    pub alert_id: i64,
    pub event_id: i64,
    pub state: AlertState,
    pub alarm_time: DateTime<Utc>,
    pub begin_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub minutes: i64,
    pub title: Option<String>,
    pub location: Option<String>,
    pub description: Option<String>,
    pub self_attendee_status: AttendeeStatus,
    pub all_day: bool,
    pub received_time: Option<DateTime<Utc>>,
    pub notify_time: Option<DateTime<Utc>>,
}
