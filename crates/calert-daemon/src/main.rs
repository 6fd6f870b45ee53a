use anyhow::Context;
use calert_core::{Trigger, TriggerKind};
use calert_engine::notify::{Notification, NotificationSink};
use calert_engine::policy::{FixedRingerMode, RingerMode};
use calert_engine::rescue::AlarmScheduler;
use calert_engine::{AlertWorker, TriggerSender};
use calert_storage::{AlertStore, PrefStore};
use chrono::{DateTime, Utc};
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "calert-daemon")]
struct Args {
    /// Path to the sqlite database holding alerts and preferences.
    #[arg(long, default_value = "calert.db")]
    db: PathBuf,
    /// Minutes between stale-alert sweeps; 0 disables the sweep.
    #[arg(long, default_value_t = 60)]
    stale_sweep_minutes: u64,
    /// Ringer mode reported to the vibrate policy.
    #[arg(long, value_enum, default_value_t = RingerModeArg::Normal)]
    ringer_mode: RingerModeArg,
    #[arg(long, default_value_t = false)]
    debug: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum RingerModeArg {
    Normal,
    Silent,
    Vibrate,
}

impl From<RingerModeArg> for RingerMode {
    fn from(mode: RingerModeArg) -> Self {
        match mode {
            RingerModeArg::Normal => RingerMode::Normal,
            RingerModeArg::Silent => RingerMode::Silent,
            RingerModeArg::Vibrate => RingerMode::Vibrate,
        }
    }
}

/// Stand-in rendering surface: payloads go to the log instead of a
/// notification bar.
struct LogNotificationSink;

impl NotificationSink for LogNotificationSink {
    fn notify(&self, id: u32, notification: &Notification) {
        match serde_json::to_string(notification) {
            Ok(payload) => info!(id, %payload, "notify"),
            Err(err) => warn!(id, error = %err, "failed to serialize notification"),
        }
    }

    fn cancel(&self, id: u32) {
        info!(id, "cancel notification");
    }

    fn cancel_all(&self) {
        info!("cancel all notifications");
    }
}

/// The worker owns its scheduler before the trigger queue exists, so the
/// sender slot is filled right after spawn. Wake-ups are only requested
/// while processing a trigger, which cannot happen before then.
#[derive(Clone, Default)]
struct SenderSlot(Arc<Mutex<Option<TriggerSender>>>);

impl SenderSlot {
    fn set(&self, sender: TriggerSender) {
        if let Ok(mut slot) = self.0.lock() {
            *slot = Some(sender);
        }
    }

    fn get(&self) -> Option<TriggerSender> {
        self.0.lock().ok().and_then(|slot| slot.clone())
    }
}

/// Arranges wake-ups as tokio sleeps that feed reminder triggers back into
/// the worker queue.
struct TokioAlarmScheduler {
    sender: SenderSlot,
    runtime: tokio::runtime::Handle,
}

impl AlarmScheduler for TokioAlarmScheduler {
    fn schedule_wakeup(&self, at: DateTime<Utc>) {
        let Some(sender) = self.sender.get() else {
            warn!(%at, "no trigger sender yet, dropping wake-up");
            return;
        };
        self.runtime.spawn(async move {
            let delay = (at - Utc::now()).to_std().unwrap_or_default();
            tokio::time::sleep(delay).await;
            sender.dispatch_detached(Trigger::new(TriggerKind::EventReminderFired));
        });
    }
}

fn init_tracing(debug: bool) {
    let default_filter = if debug { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(args.debug);

    let store = AlertStore::open(&args.db)
        .with_context(|| format!("open alert store at {}", args.db.display()))?;
    let prefs = PrefStore::open(&args.db)
        .with_context(|| format!("open preference store at {}", args.db.display()))?;

    let sender_slot = SenderSlot::default();
    let scheduler = TokioAlarmScheduler {
        sender: sender_slot.clone(),
        runtime: tokio::runtime::Handle::current(),
    };
    let worker = AlertWorker::new(
        store,
        prefs,
        Box::new(LogNotificationSink),
        Box::new(scheduler),
        Box::new(FixedRingerMode(args.ringer_mode.into())),
    );
    let handle = worker.spawn().context("spawn alert worker")?;
    sender_slot.set(handle.sender());

    info!(db = %args.db.display(), "calert daemon started");
    let booted = handle.dispatch(Trigger::new(TriggerKind::BootCompleted));
    if !booted.await.unwrap_or(false) {
        info!("no active alerts at startup");
    }

    let mut sweep = (args.stale_sweep_minutes > 0)
        .then(|| tokio::time::interval(Duration::from_secs(args.stale_sweep_minutes * 60)));
    if let Some(interval) = sweep.as_mut() {
        // The first tick resolves immediately; the boot pass already covered
        // startup.
        interval.tick().await;
    }

    loop {
        match sweep.as_mut() {
            Some(interval) => tokio::select! {
                _ = interval.tick() => {
                    handle
                        .sender()
                        .dispatch_detached(Trigger::new(TriggerKind::DismissStaleAlerts));
                }
                result = tokio::signal::ctrl_c() => {
                    result.context("listen for ctrl-c")?;
                    break;
                }
            },
            None => {
                tokio::signal::ctrl_c()
                    .await
                    .context("listen for ctrl-c")?;
                break;
            }
        }
    }

    info!("shutting down");
    tokio::task::spawn_blocking(move || handle.shutdown())
        .await
        .context("join alert worker")?;
    Ok(())
}
