use crate::EngineError;
use calert_storage::{pref_keys, PrefStore};

/// Device ringer state at the time of a pass, supplied by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RingerMode {
    Normal,
    Silent,
    Vibrate,
}

pub trait RingerModeSource: Send {
    fn ringer_mode(&self) -> RingerMode;
}

/// Host with no audio hardware integration: a fixed mode.
#[derive(Debug, Clone, Copy)]
pub struct FixedRingerMode(pub RingerMode);

impl RingerModeSource for FixedRingerMode {
    fn ringer_mode(&self) -> RingerMode {
        self.0
    }
}

pub const VIBRATE_WHEN_ALWAYS: &str = "always";
pub const VIBRATE_WHEN_SILENT: &str = "silent";
pub const VIBRATE_WHEN_NEVER: &str = "never";

/// Resolves the vibrate decision for one pass.
///
/// The tri-state `vibrate-when` preference wins when present. Otherwise a
/// legacy boolean `vibrate` preference is translated (true -> always,
/// false -> never). With neither set the decision falls through to never.
pub fn should_use_default_vibrate(
    prefs: &PrefStore,
    ringer_mode: RingerMode,
) -> Result<bool, EngineError> {
    let vibrate_when = match prefs.get(pref_keys::VIBRATE_WHEN)? {
        Some(value) => value,
        None => {
            if prefs.contains(pref_keys::LEGACY_VIBRATE)? {
                if prefs.get_bool(pref_keys::LEGACY_VIBRATE, false)? {
                    VIBRATE_WHEN_ALWAYS.to_string()
                } else {
                    VIBRATE_WHEN_NEVER.to_string()
                }
            } else {
                VIBRATE_WHEN_NEVER.to_string()
            }
        }
    };

    if vibrate_when == VIBRATE_WHEN_ALWAYS {
        return Ok(true);
    }
    if vibrate_when != VIBRATE_WHEN_SILENT {
        return Ok(false);
    }
    Ok(ringer_mode == RingerMode::Vibrate)
}

/// The ringtone to attach to a loud notification. Quiet passes and an
/// empty/absent preference both mean silence.
pub fn reminder_ringtone(prefs: &PrefStore, quiet: bool) -> Result<Option<String>, EngineError> {
    if quiet {
        return Ok(None);
    }
    Ok(prefs
        .get(pref_keys::RINGTONE)?
        .filter(|uri| !uri.is_empty()))
}
