use calert_core::{Alert, AlertState, AttendeeStatus};
use chrono::{DateTime, TimeZone, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use thiserror::Error;

pub const ALERTS_SCHEMA_VERSION: i64 = 1;

/// Preference keys understood by the notification pipeline.
pub mod pref_keys {
    pub const ALERTS_ENABLED: &str = "alerts-enabled";
    pub const POPUP_ENABLED: &str = "popup-enabled";
    pub const VIBRATE_WHEN: &str = "vibrate-when";
    pub const LEGACY_VIBRATE: &str = "vibrate";
    pub const RINGTONE: &str = "ringtone";
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("timestamp out of range: {0}")]
    Timestamp(i64),
    #[error("unknown alert state code: {0}")]
    State(i64),
    #[error("unsupported schema version {found}, max supported {supported}")]
    UnsupportedSchemaVersion { found: i64, supported: i64 },
}

fn to_millis(ts: DateTime<Utc>) -> i64 {
    ts.timestamp_millis()
}

fn from_millis(ms: i64) -> Result<DateTime<Utc>, StorageError> {
    Utc.timestamp_millis_opt(ms)
        .single()
        .ok_or(StorageError::Timestamp(ms))
}

fn from_millis_opt(ms: Option<i64>) -> Result<Option<DateTime<Utc>>, StorageError> {
    ms.map(from_millis).transpose()
}

fn schema_version(conn: &Connection) -> Result<i64, StorageError> {
    Ok(conn.query_row("PRAGMA user_version", [], |row| row.get(0))?)
}

fn migrate(conn: &Connection) -> Result<(), StorageError> {
    let current = schema_version(conn)?;
    if current > ALERTS_SCHEMA_VERSION {
        return Err(StorageError::UnsupportedSchemaVersion {
            found: current,
            supported: ALERTS_SCHEMA_VERSION,
        });
    }

    if current < 1 {
        let sql = include_str!("../migrations/0001_alerts_schema.sql");
        conn.execute_batch(sql)?;
        conn.execute("PRAGMA user_version = 1", []).map(|_| ())?;
    }

    Ok(())
}

/// Field-level update applied to one alert row. `None` fields keep their
/// stored value.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct AlertUpdate {
    pub state: Option<AlertState>,
    pub received_time: Option<DateTime<Utc>>,
    pub notify_time: Option<DateTime<Utc>>,
}

impl AlertUpdate {
    pub fn is_empty(&self) -> bool {
        self.state.is_none() && self.received_time.is_none() && self.notify_time.is_none()
    }
}

/// Alert row as supplied by the calendar side. State starts Scheduled and
/// the diagnostic timestamps start unset.
#[derive(Debug, Clone, PartialEq)]
pub struct NewAlert {
    pub event_id: i64,
    pub alarm_time: DateTime<Utc>,
    pub begin_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub minutes: i64,
    pub title: Option<String>,
    pub location: Option<String>,
    pub description: Option<String>,
    pub self_attendee_status: AttendeeStatus,
    pub all_day: bool,
}

struct AlertRow {
    alert_id: i64,
    event_id: i64,
    state: i64,
    alarm_time: i64,
    begin_time: i64,
    end_time: i64,
    minutes: i64,
    title: Option<String>,
    location: Option<String>,
    description: Option<String>,
    self_attendee_status: i64,
    all_day: i64,
    received_time: Option<i64>,
    notify_time: Option<i64>,
}

impl AlertRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            alert_id: row.get(0)?,
            event_id: row.get(1)?,
            state: row.get(2)?,
            alarm_time: row.get(3)?,
            begin_time: row.get(4)?,
            end_time: row.get(5)?,
            minutes: row.get(6)?,
            title: row.get(7)?,
            location: row.get(8)?,
            description: row.get(9)?,
            self_attendee_status: row.get(10)?,
            all_day: row.get(11)?,
            received_time: row.get(12)?,
            notify_time: row.get(13)?,
        })
    }

    fn into_alert(self) -> Result<Alert, StorageError> {
        Ok(Alert {
            alert_id: self.alert_id,
            event_id: self.event_id,
            state: AlertState::from_code(self.state).ok_or(StorageError::State(self.state))?,
            alarm_time: from_millis(self.alarm_time)?,
            begin_time: from_millis(self.begin_time)?,
            end_time: from_millis(self.end_time)?,
            minutes: self.minutes,
            title: self.title,
            location: self.location,
            description: self.description,
            self_attendee_status: AttendeeStatus::from_code(self.self_attendee_status),
            all_day: self.all_day != 0,
            received_time: from_millis_opt(self.received_time)?,
            notify_time: from_millis_opt(self.notify_time)?,
        })
    }
}

const ALERT_COLUMNS: &str = "
    alert_id, event_id, state, alarm_time, begin_time, end_time, minutes,
    title, location, description, self_attendee_status, all_day,
    received_time, notify_time
";

/// Adapter over the durable alert table. All calls are synchronous; the
/// worker thread is the only caller.
pub struct AlertStore {
    conn: Connection,
}

impl AlertStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let conn = Connection::open(path)?;
        migrate(&conn)?;
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory()?;
        migrate(&conn)?;
        Ok(Self { conn })
    }

    pub fn schema_version(&self) -> Result<i64, StorageError> {
        schema_version(&self.conn)
    }

    pub fn insert_alert(&self, alert: &NewAlert) -> Result<i64, StorageError> {
        self.conn.execute(
            "
            INSERT INTO alerts (
                event_id, state, alarm_time, begin_time, end_time, minutes,
                title, location, description, self_attendee_status, all_day
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            ",
            params![
                alert.event_id,
                AlertState::Scheduled.code(),
                to_millis(alert.alarm_time),
                to_millis(alert.begin_time),
                to_millis(alert.end_time),
                alert.minutes,
                alert.title,
                alert.location,
                alert.description,
                alert.self_attendee_status.code(),
                alert.all_day as i64,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn alert(&self, alert_id: i64) -> Result<Option<Alert>, StorageError> {
        let row = self
            .conn
            .query_row(
                &format!("SELECT {ALERT_COLUMNS} FROM alerts WHERE alert_id = ?1"),
                [alert_id],
                AlertRow::from_row,
            )
            .optional()?;
        row.map(AlertRow::into_alert).transpose()
    }

    /// All alerts a reconciliation pass must look at: Scheduled or Fired with
    /// an alarm time at or before `now`, most recent occurrences first.
    pub fn active_alerts(&self, now: DateTime<Utc>) -> Result<Vec<Alert>, StorageError> {
        let mut stmt = self.conn.prepare(&format!(
            "
            SELECT {ALERT_COLUMNS} FROM alerts
            WHERE state IN (?1, ?2) AND alarm_time <= ?3
            ORDER BY begin_time DESC, end_time DESC
            "
        ))?;
        let rows = stmt.query_map(
            params![
                AlertState::Scheduled.code(),
                AlertState::Fired.code(),
                to_millis(now),
            ],
            AlertRow::from_row,
        )?;

        let mut alerts = Vec::new();
        for row in rows {
            alerts.push(row?.into_alert()?);
        }
        Ok(alerts)
    }

    pub fn update_alert(&self, alert_id: i64, update: &AlertUpdate) -> Result<bool, StorageError> {
        if update.is_empty() {
            return Ok(false);
        }
        let changes = self.conn.execute(
            "
            UPDATE alerts SET
                state = COALESCE(?2, state),
                received_time = COALESCE(?3, received_time),
                notify_time = COALESCE(?4, notify_time)
            WHERE alert_id = ?1
            ",
            params![
                alert_id,
                update.state.map(|state| state.code()),
                update.received_time.map(to_millis),
                update.notify_time.map(to_millis),
            ],
        )?;
        Ok(changes > 0)
    }

    /// Bulk-dismisses Scheduled alerts whose event already ended. Returns the
    /// number of rows dismissed.
    pub fn dismiss_stale(&self, now: DateTime<Utc>) -> Result<usize, StorageError> {
        let changes = self.conn.execute(
            "UPDATE alerts SET state = ?1 WHERE end_time < ?2 AND state = ?3",
            params![
                AlertState::Dismissed.code(),
                to_millis(now),
                AlertState::Scheduled.code(),
            ],
        )?;
        Ok(changes)
    }

    /// Alarm times of Scheduled alerts that are overdue but less than a day
    /// old and whose event has not ended, ascending. Duplicate times are
    /// returned as-is; the caller collapses runs.
    pub fn missed_alarm_times(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<DateTime<Utc>>, StorageError> {
        let ancient = now - chrono::Duration::days(1);
        let mut stmt = self.conn.prepare(
            "
            SELECT alarm_time FROM alerts
            WHERE state = ?1 AND alarm_time < ?2 AND alarm_time > ?3 AND end_time >= ?2
            ORDER BY alarm_time ASC
            ",
        )?;
        let rows = stmt.query_map(
            params![
                AlertState::Scheduled.code(),
                to_millis(now),
                to_millis(ancient),
            ],
            |row| row.get::<_, i64>(0),
        )?;

        let mut times = Vec::new();
        for row in rows {
            times.push(from_millis(row?)?);
        }
        Ok(times)
    }
}

/// Key/value preference access backed by the same sqlite database.
pub struct PrefStore {
    conn: Connection,
}

impl PrefStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let conn = Connection::open(path)?;
        migrate(&conn)?;
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory()?;
        migrate(&conn)?;
        Ok(Self { conn })
    }

    pub fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self
            .conn
            .query_row("SELECT value FROM prefs WHERE key = ?1", [key], |row| {
                row.get(0)
            })
            .optional()?)
    }

    pub fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.conn.execute(
            "
            INSERT INTO prefs (key, value) VALUES (?1, ?2)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value
            ",
            params![key, value],
        )?;
        Ok(())
    }

    pub fn remove(&self, key: &str) -> Result<bool, StorageError> {
        let changes = self
            .conn
            .execute("DELETE FROM prefs WHERE key = ?1", [key])?;
        Ok(changes > 0)
    }

    pub fn contains(&self, key: &str) -> Result<bool, StorageError> {
        Ok(self.get(key)?.is_some())
    }

    /// Boolean preferences accept "true"/"false"/"1"/"0"; anything else falls
    /// back to the default.
    pub fn get_bool(&self, key: &str, default: bool) -> Result<bool, StorageError> {
        Ok(match self.get(key)?.as_deref() {
            Some("true") | Some("1") => true,
            Some("false") | Some("0") => false,
            _ => default,
        })
    }
}
