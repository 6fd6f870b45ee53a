use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Attribute key for the quiet-update flag, meaningful only on
/// `EventReminderFired` triggers.
pub const QUIET_ATTR: &str = "quiet";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum TriggerKind {
    BootCompleted,
    TimeChanged,
    EventReminderFired,
    LocaleChanged,
    DismissStaleAlerts,
}

impl TriggerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TriggerKind::BootCompleted => "boot-completed",
            TriggerKind::TimeChanged => "time-changed",
            TriggerKind::EventReminderFired => "event-reminder-fired",
            TriggerKind::LocaleChanged => "locale-changed",
            TriggerKind::DismissStaleAlerts => "dismiss-stale-alerts",
        }
    }
}

impl fmt::Display for TriggerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TriggerKind {
    type Err = String;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        match input.trim().to_lowercase().as_str() {
            "boot-completed" => Ok(TriggerKind::BootCompleted),
            "time-changed" => Ok(TriggerKind::TimeChanged),
            "event-reminder-fired" => Ok(TriggerKind::EventReminderFired),
            "locale-changed" => Ok(TriggerKind::LocaleChanged),
            "dismiss-stale-alerts" => Ok(TriggerKind::DismissStaleAlerts),
            other => Err(format!("Unknown trigger kind: {other}")),
        }
    }
}

/// One message delivered to the alert worker. The action string is kept
/// as-is so unknown kinds can be logged and discarded instead of being
/// unrepresentable.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Trigger {
    pub action: String,
    #[serde(default)]
    pub attrs: HashMap<String, Value>,
}

impl Trigger {
    pub fn new(kind: TriggerKind) -> Self {
        Self {
            action: kind.as_str().to_string(),
            attrs: HashMap::new(),
        }
    }

    pub fn from_action(action: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            attrs: HashMap::new(),
        }
    }

    pub fn with_quiet(kind: TriggerKind, quiet: bool) -> Self {
        let mut trigger = Self::new(kind);
        trigger
            .attrs
            .insert(QUIET_ATTR.to_string(), Value::Bool(quiet));
        trigger
    }

    /// Parsed kind; `None` for unknown action strings.
    pub fn kind(&self) -> Option<TriggerKind> {
        self.action.parse().ok()
    }

    /// The quiet flag is opt-in: absent or non-boolean means loud.
    pub fn quiet(&self) -> bool {
        self.attrs
            .get(QUIET_ATTR)
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }
}
