//! Scheduler (C8, §4.8): named, UTC-pinned periodic triggers per source
//! with mutual exclusion, plus a lightweight health-probe tick. Grounded
//! on the teacher's plain `#[tokio::main]` supervisor loop — no workflow
//! engine, just timers and `tokio::spawn`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use cron::Schedule;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

const MICROBLOG_DEFAULT_CADENCE: Duration = Duration::from_secs(15 * 60);
const GROUPCHAT_CADENCE: Duration = Duration::from_secs(24 * 60 * 60);
const HEALTH_PROBE_CADENCE: Duration = Duration::from_secs(5 * 60);

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourceSchedulerStatus {
    pub is_running: bool,
    pub last_run_at: Option<DateTime<Utc>>,
    pub runs_fired: u64,
    pub runs_skipped_overlap: u64,
}

/// Per-source mutual-exclusion flag plus bookkeeping. `is_running` is a
/// single-writer atomic (the driver thread); readers load it without
/// locking (§5).
pub struct SourceTrigger {
    running: AtomicBool,
    status: Mutex<SourceSchedulerStatus>,
    cadence: Duration,
}

impl SourceTrigger {
    fn new(cadence: Duration) -> Self {
        Self {
            running: AtomicBool::new(false),
            status: Mutex::new(SourceSchedulerStatus::default()),
            cadence,
        }
    }

    /// Attempts to start a run: returns `false` (and logs a skip) if the
    /// previous run for this source is still in flight.
    async fn try_start(&self) -> bool {
        if self.running.swap(true, Ordering::AcqRel) {
            let mut status = self.status.lock().await;
            status.runs_skipped_overlap += 1;
            warn!("Previous run still in flight, skipping this tick");
            return false;
        }
        let mut status = self.status.lock().await;
        status.is_running = true;
        status.runs_fired += 1;
        true
    }

    async fn finish(&self) {
        self.running.store(false, Ordering::Release);
        let mut status = self.status.lock().await;
        status.is_running = false;
        status.last_run_at = Some(Utc::now());
    }

    pub async fn status(&self) -> SourceSchedulerStatus {
        self.status.lock().await.clone()
    }

    pub async fn reset(&self) {
        self.running.store(false, Ordering::Release);
        *self.status.lock().await = SourceSchedulerStatus::default();
    }
}

/// Owns the microblog/groupchat cadence timers. `ETL_SCHEDULE_INTERVAL`
/// overrides the microblog cadence with a cron expression when set; an
/// invalid expression is rejected at config-load time (C0), never here.
pub struct Scheduler {
    pub microblog: Arc<SourceTrigger>,
    pub groupchat: Arc<SourceTrigger>,
    microblog_cron: Option<Schedule>,
    cancel: CancellationToken,
}

impl Scheduler {
    pub fn new(schedule_override: Option<&str>) -> Result<Self, String> {
        let microblog_cron = schedule_override
            .map(|expr| Schedule::from_str(expr).map_err(|e| format!("invalid cron expression: {e}")))
            .transpose()?;

        Ok(Self {
            microblog: Arc::new(SourceTrigger::new(MICROBLOG_DEFAULT_CADENCE)),
            groupchat: Arc::new(SourceTrigger::new(GROUPCHAT_CADENCE)),
            microblog_cron,
            cancel: CancellationToken::new(),
        })
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    /// Runs the scheduler loop, invoking `on_microblog_tick`/`on_groupchat_tick`
    /// whenever mutual exclusion allows a tick through, plus a standalone
    /// health-probe tick every 5 minutes. Returns once cancelled.
    pub async fn run<F1, Fut1, F2, Fut2, F3, Fut3>(
        &self,
        mut on_microblog_tick: F1,
        mut on_groupchat_tick: F2,
        mut on_health_probe: F3,
    ) where
        F1: FnMut() -> Fut1,
        Fut1: std::future::Future<Output = ()>,
        F2: FnMut() -> Fut2,
        Fut2: std::future::Future<Output = ()>,
        F3: FnMut() -> Fut3,
        Fut3: std::future::Future<Output = ()>,
    {
        let mut groupchat_interval = tokio::time::interval(GROUPCHAT_CADENCE);
        let mut health_interval = tokio::time::interval(HEALTH_PROBE_CADENCE);

        // A cron expression can produce irregularly spaced fire times, so
        // unlike groupchat/health the microblog tick can't be a fixed
        // `tokio::time::interval` — it's a single-shot sleep, re-armed to
        // the next occurrence after every fire.
        let mut microblog_sleep = Box::pin(tokio::time::sleep(self.next_microblog_delay()));

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    info!("Scheduler shutting down");
                    return;
                }
                _ = &mut microblog_sleep => {
                    if self.microblog.try_start().await {
                        on_microblog_tick().await;
                        self.microblog.finish().await;
                    }
                    microblog_sleep.as_mut().reset(tokio::time::Instant::now() + self.next_microblog_delay());
                }
                _ = groupchat_interval.tick() => {
                    if self.groupchat.try_start().await {
                        on_groupchat_tick().await;
                        self.groupchat.finish().await;
                    }
                }
                _ = health_interval.tick() => {
                    on_health_probe().await;
                }
            }
        }
    }

    /// Delay until the next microblog tick. With `microblog_cron` set, this
    /// is the gap to the schedule's next occurrence (`Schedule::upcoming`),
    /// which can differ tick to tick; otherwise it's the fixed default
    /// cadence.
    fn next_microblog_delay(&self) -> Duration {
        match &self.microblog_cron {
            Some(schedule) => schedule
                .upcoming(Utc)
                .next()
                .and_then(|next| (next - Utc::now()).to_std().ok())
                .unwrap_or(MICROBLOG_DEFAULT_CADENCE),
            None => MICROBLOG_DEFAULT_CADENCE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mutual_exclusion_skips_overlapping_tick() {
        let trigger = SourceTrigger::new(MICROBLOG_DEFAULT_CADENCE);
        assert!(trigger.try_start().await);
        assert!(!trigger.try_start().await);
        trigger.finish().await;
        assert!(trigger.try_start().await);
    }

    #[test]
    fn invalid_cron_expression_is_rejected_at_construction() {
        let result = Scheduler::new(Some("not a cron expression"));
        assert!(result.is_err());
    }

    #[test]
    fn valid_cron_expression_is_accepted() {
        let result = Scheduler::new(Some("0 */15 * * * *"));
        assert!(result.is_ok());
    }

    #[test]
    fn without_a_cron_override_the_default_cadence_is_used() {
        let scheduler = Scheduler::new(None).unwrap();
        assert_eq!(scheduler.next_microblog_delay(), MICROBLOG_DEFAULT_CADENCE);
    }

    #[test]
    fn cron_override_is_actually_consulted_for_the_next_delay() {
        // Hourly on the hour: the delay to the next fire is always <= 1h,
        // and strictly less than the 15-minute default whenever the clock
        // sits more than 15 minutes past the hour.
        let scheduler = Scheduler::new(Some("0 0 * * * *")).unwrap();
        let delay = scheduler.next_microblog_delay();
        assert!(delay <= Duration::from_secs(60 * 60));
    }

    #[tokio::test]
    async fn reset_clears_running_flag_and_counters() {
        let trigger = SourceTrigger::new(MICROBLOG_DEFAULT_CADENCE);
        trigger.try_start().await;
        trigger.reset().await;
        let status = trigger.status().await;
        assert!(!status.is_running);
        assert_eq!(status.runs_fired, 0);
    }
}
