//! Task scheduler wrapping `tokio-cron-scheduler`.
//!
//! Provides:
//! - Cron, fixed-interval and one-time triggers
//! - Human-readable trigger parsing ("every 5 minutes", "in 2 hours", ...)
//! - An in-memory directory of job metadata for introspection
//!
//! Jobs are not persisted; they disappear on shutdown.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, FixedOffset, Utc};
use futures_util::future::BoxFuture;
use parking_lot::RwLock;
use serde::Serialize;
use tokio::sync::{Mutex, RwLock as TokioRwLock};
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{Error, Result};

/// Work run when a trigger fires.
pub type JobAction = Arc<dyn Fn() -> BoxFuture<'static, ()> + Send + Sync>;

// ─────────────────────────────────────────────────────────────────
// Triggers
// ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Trigger {
    /// 6-field cron expression (seconds first).
    Cron { expression: String },
    /// Fixed period.
    Interval { seconds: u64 },
    /// Single run at an instant.
    OneTime { run_at: DateTime<Utc> },
}

impl Trigger {
    /// Parse a trigger expression.
    ///
    /// Supported forms (case-insensitive):
    /// - RFC 3339 timestamp, optionally prefixed with "at "
    /// - "in N seconds|minutes|hours|days"
    /// - "every N seconds|minutes|hours|days|weeks"
    /// - "every minute", "every hour", "every day", "hourly", "daily"
    /// - "every day at HH:MM", "daily at HH:MM"
    /// - 5-field cron (a zero seconds field is prepended) or 6-field cron
    pub fn parse(when: &str, now: DateTime<Utc>) -> Result<Self> {
        let trimmed = when.trim();
        let lower = trimmed.to_lowercase();
        let invalid = |message: &str| Error::invalid_schedule(when, message);

        if trimmed.is_empty() {
            return Err(invalid("schedule is empty"));
        }

        let timestamp = trimmed
            .strip_prefix("at ")
            .or_else(|| trimmed.strip_prefix("AT "))
            .unwrap_or(trimmed);
        if let Ok(at) = DateTime::parse_from_rfc3339(timestamp.trim()) {
            return Ok(Trigger::OneTime {
                run_at: at.with_timezone(&Utc),
            });
        }

        if let Some(rest) = lower.strip_prefix("in ") {
            let seconds = parse_quantity(rest).ok_or_else(|| invalid("expected 'in N <unit>'"))?;
            let run_at = offset_from(now, seconds).ok_or_else(|| invalid("delay out of range"))?;
            return Ok(Trigger::OneTime { run_at });
        }

        match lower.as_str() {
            "every minute" | "minutely" => return Ok(Trigger::Interval { seconds: 60 }),
            "every hour" | "hourly" => return Ok(Trigger::Interval { seconds: 3_600 }),
            "every day" | "daily" => return Ok(Trigger::Interval { seconds: 86_400 }),
            _ => {}
        }

        if let Some(at) = lower
            .strip_prefix("every day at ")
            .or_else(|| lower.strip_prefix("daily at "))
        {
            let (hour, minute) = parse_clock(at).ok_or_else(|| invalid("expected HH:MM"))?;
            return Ok(Trigger::Cron {
                expression: format!("0 {} {} * * *", minute, hour),
            });
        }

        if let Some(rest) = lower.strip_prefix("every ") {
            let seconds =
                parse_quantity(rest).ok_or_else(|| invalid("expected 'every N <unit>'"))?;
            offset_from(now, seconds).ok_or_else(|| invalid("interval out of range"))?;
            return Ok(Trigger::Interval { seconds });
        }

        let fields = trimmed.split_whitespace().count();
        match fields {
            5 => Ok(Trigger::Cron {
                expression: format!("0 {}", trimmed),
            }),
            6 | 7 => Ok(Trigger::Cron {
                expression: trimmed.to_string(),
            }),
            _ => Err(invalid("unrecognized schedule format")),
        }
    }
}

/// "N unit" to a positive number of seconds
fn parse_quantity(input: &str) -> Option<u64> {
    let mut words = input.split_whitespace();
    let n: u64 = words.next()?.parse().ok()?;
    let unit = words.next()?;
    if words.next().is_some() || n == 0 {
        return None;
    }

    let multiplier = match unit.trim_end_matches('s') {
        "second" | "sec" => 1,
        "minute" | "min" => 60,
        "hour" | "hr" => 3_600,
        "day" => 86_400,
        "week" => 604_800,
        _ => return None,
    };
    n.checked_mul(multiplier)
}

/// `now + seconds`, or None when it leaves chrono's representable range
fn offset_from(now: DateTime<Utc>, seconds: u64) -> Option<DateTime<Utc>> {
    let seconds = i64::try_from(seconds).ok()?;
    now.checked_add_signed(chrono::Duration::try_seconds(seconds)?)
}

fn parse_clock(input: &str) -> Option<(u32, u32)> {
    let (h, m) = input.trim().split_once(':')?;
    let hour: u32 = h.trim().parse().ok()?;
    let minute: u32 = m.trim().parse().ok()?;
    (hour < 24 && minute < 60).then_some((hour, minute))
}

// ─────────────────────────────────────────────────────────────────
// Job metadata
// ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct JobInfo {
    pub id: String,
    #[serde(flatten)]
    pub trigger: Trigger,
    pub description: String,
    pub created: DateTime<Utc>,
}

/// Listing returned by `status`.
#[derive(Debug, Clone, Serialize)]
pub struct SchedulerStatus {
    pub scheduler_running: bool,
    pub jobs_count: usize,
    pub active_tasks: Vec<JobInfo>,
}

struct ScheduledJob {
    guid: Uuid,
    info: JobInfo,
}

// ─────────────────────────────────────────────────────────────────
// TaskScheduler
// ─────────────────────────────────────────────────────────────────

pub struct TaskScheduler {
    inner: Arc<TokioRwLock<Option<JobScheduler>>>,
    jobs: Arc<RwLock<HashMap<String, ScheduledJob>>>,
    running: AtomicBool,
    timezone: FixedOffset,
    /// Serializes schedule/cancel so replacing an id is atomic
    registry_lock: Mutex<()>,
}

impl TaskScheduler {
    /// Create a scheduler (not yet started). Cron jobs fire in `timezone`.
    pub fn new(timezone: FixedOffset) -> Self {
        Self {
            inner: Arc::new(TokioRwLock::new(None)),
            jobs: Arc::new(RwLock::new(HashMap::new())),
            running: AtomicBool::new(false),
            timezone,
            registry_lock: Mutex::new(()),
        }
    }

    /// Start the scheduler; a second call is a no-op.
    pub async fn start(&self) -> Result<()> {
        let mut inner = self.inner.write().await;
        if inner.is_some() {
            return Ok(());
        }

        let scheduler = JobScheduler::new()
            .await
            .map_err(|e| Error::Scheduler(e.to_string()))?;
        scheduler
            .start()
            .await
            .map_err(|e| Error::Scheduler(e.to_string()))?;

        *inner = Some(scheduler);
        self.running.store(true, Ordering::SeqCst);
        info!(timezone = %self.timezone, "Task scheduler started");
        Ok(())
    }

    /// Stop the scheduler and forget every job.
    pub async fn shutdown(&self) -> Result<()> {
        let mut inner = self.inner.write().await;
        if let Some(mut scheduler) = inner.take() {
            scheduler
                .shutdown()
                .await
                .map_err(|e| Error::Scheduler(e.to_string()))?;
            info!("Task scheduler stopped");
        }
        self.jobs.write().clear();
        self.running.store(false, Ordering::SeqCst);
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Register a job, replacing any job with the same id.
    pub async fn schedule(
        &self,
        id: &str,
        trigger: Trigger,
        description: &str,
        action: JobAction,
    ) -> Result<JobInfo> {
        let _registry = self.registry_lock.lock().await;
        let inner = self.inner.read().await;
        let scheduler = inner.as_ref().ok_or(Error::SchedulerNotRunning)?;

        let job = self.build_job(id, &trigger, action)?;
        let guid = job.guid();

        // The new job goes in first; a failed add leaves the old one untouched
        scheduler
            .add(job)
            .await
            .map_err(|e| Error::Scheduler(e.to_string()))?;

        let info = JobInfo {
            id: id.to_string(),
            trigger,
            description: description.to_string(),
            created: Utc::now(),
        };
        let previous = self.jobs.write().insert(
            id.to_string(),
            ScheduledJob {
                guid,
                info: info.clone(),
            },
        );

        if let Some(previous) = previous {
            debug!(id, "Replacing existing job");
            if let Err(e) = scheduler.remove(&previous.guid).await {
                warn!(id, error = %e, "Failed to remove replaced job");
            }
        }

        info!(id, trigger = ?info.trigger, "Job scheduled");
        Ok(info)
    }

    fn build_job(&self, id: &str, trigger: &Trigger, action: JobAction) -> Result<Job> {
        let job = match trigger {
            Trigger::Cron { expression } => {
                Job::new_async_tz(expression.as_str(), self.timezone, move |_uuid, _lock| {
                    let action = action.clone();
                    Box::pin(async move { action().await })
                })
                .map_err(|e| Error::invalid_schedule(expression, e.to_string()))?
            }
            Trigger::Interval { seconds } => {
                if *seconds == 0 {
                    return Err(Error::invalid_schedule(id, "interval must be > 0"));
                }
                if offset_from(Utc::now(), *seconds).is_none() {
                    return Err(Error::invalid_schedule(id, "interval out of range"));
                }
                Job::new_repeated_async(Duration::from_secs(*seconds), move |_uuid, _lock| {
                    let action = action.clone();
                    Box::pin(async move { action().await })
                })
                .map_err(|e| Error::Scheduler(e.to_string()))?
            }
            Trigger::OneTime { run_at } => {
                let delay = (*run_at - Utc::now())
                    .to_std()
                    .map_err(|_| Error::invalid_schedule(run_at.to_rfc3339(), "run time is in the past"))?;

                let jobs = self.jobs.clone();
                let job_id = id.to_string();
                Job::new_one_shot_async(delay, move |uuid, _lock| {
                    let action = action.clone();
                    let jobs = jobs.clone();
                    let job_id = job_id.clone();
                    Box::pin(async move {
                        action().await;
                        let mut jobs = jobs.write();
                        if jobs.get(&job_id).is_some_and(|j| j.guid == uuid) {
                            jobs.remove(&job_id);
                        }
                    })
                })
                .map_err(|e| Error::Scheduler(e.to_string()))?
            }
        };
        Ok(job)
    }

    /// Remove a job. Returns whether it existed.
    pub async fn cancel(&self, id: &str) -> Result<bool> {
        let _registry = self.registry_lock.lock().await;
        let Some(entry) = self.jobs.write().remove(id) else {
            return Ok(false);
        };

        let inner = self.inner.read().await;
        if let Some(scheduler) = inner.as_ref() {
            scheduler
                .remove(&entry.guid)
                .await
                .map_err(|e| Error::Scheduler(e.to_string()))?;
        }

        info!(id, "Job cancelled");
        Ok(true)
    }

    /// Registered jobs ordered by id.
    pub fn jobs(&self) -> Vec<JobInfo> {
        let mut jobs: Vec<JobInfo> = self.jobs.read().values().map(|j| j.info.clone()).collect();
        jobs.sort_by(|a, b| a.id.cmp(&b.id));
        jobs
    }

    pub fn status(&self) -> SchedulerStatus {
        let active_tasks = self.jobs();
        SchedulerStatus {
            scheduler_running: self.is_running(),
            jobs_count: active_tasks.len(),
            active_tasks,
        }
    }
}

// ─────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn noop() -> JobAction {
        Arc::new(|| Box::pin(async {}))
    }

    fn utc() -> FixedOffset {
        FixedOffset::east_opt(0).unwrap()
    }

    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2025-01-01T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn test_parse_intervals() {
        assert_eq!(
            Trigger::parse("every 5 minutes", now()).unwrap(),
            Trigger::Interval { seconds: 300 }
        );
        assert_eq!(
            Trigger::parse("Every 2 Hours", now()).unwrap(),
            Trigger::Interval { seconds: 7_200 }
        );
        assert_eq!(
            Trigger::parse("hourly", now()).unwrap(),
            Trigger::Interval { seconds: 3_600 }
        );
    }

    #[test]
    fn test_parse_daily_at() {
        assert_eq!(
            Trigger::parse("every day at 09:30", now()).unwrap(),
            Trigger::Cron {
                expression: "0 30 9 * * *".to_string()
            }
        );
        assert!(Trigger::parse("daily at 25:00", now()).is_err());
    }

    #[test]
    fn test_parse_cron_fields() {
        assert_eq!(
            Trigger::parse("0 9 * * 1-5", now()).unwrap(),
            Trigger::Cron {
                expression: "0 0 9 * * 1-5".to_string()
            }
        );
        assert_eq!(
            Trigger::parse("*/10 * * * * *", now()).unwrap(),
            Trigger::Cron {
                expression: "*/10 * * * * *".to_string()
            }
        );
    }

    #[test]
    fn test_parse_one_time() {
        assert_eq!(
            Trigger::parse("in 30 minutes", now()).unwrap(),
            Trigger::OneTime {
                run_at: now() + chrono::Duration::minutes(30)
            }
        );
        let at = Trigger::parse("at 2030-06-01T08:00:00+02:00", now()).unwrap();
        assert_eq!(
            at,
            Trigger::OneTime {
                run_at: DateTime::parse_from_rfc3339("2030-06-01T06:00:00Z")
                    .unwrap()
                    .with_timezone(&Utc)
            }
        );
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(Trigger::parse("", now()).is_err());
        assert!(Trigger::parse("whenever", now()).is_err());
        assert!(Trigger::parse("every 0 minutes", now()).is_err());
        assert!(Trigger::parse("every 3 fortnights", now()).is_err());
    }

    #[test]
    fn test_parse_rejects_out_of_range_delay() {
        for when in [
            "in 9000000000000000 seconds",
            "in 18446744073709551615 seconds",
            "in 100000000000000 weeks",
            "every 9000000000000000 seconds",
        ] {
            let result = Trigger::parse(when, now());
            assert!(
                matches!(result, Err(Error::InvalidSchedule { .. })),
                "{when} should be rejected"
            );
        }
        assert!(Trigger::parse("in 520 weeks", now()).is_ok());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_schedule_requires_start() {
        let scheduler = TaskScheduler::new(utc());
        let result = scheduler
            .schedule("x", Trigger::Interval { seconds: 60 }, "", noop())
            .await;
        assert!(matches!(result, Err(Error::SchedulerNotRunning)));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_schedule_cancel_round_trip() {
        let scheduler = TaskScheduler::new(utc());
        scheduler.start().await.unwrap();

        scheduler
            .schedule("X", Trigger::Interval { seconds: 3_600 }, "first", noop())
            .await
            .unwrap();
        assert_eq!(scheduler.jobs().len(), 1);

        assert!(scheduler.cancel("X").await.unwrap());
        assert!(scheduler.jobs().is_empty());
        assert!(!scheduler.cancel("X").await.unwrap());

        scheduler.shutdown().await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_reschedule_replaces_entry() {
        let scheduler = TaskScheduler::new(utc());
        scheduler.start().await.unwrap();

        scheduler
            .schedule("X", Trigger::Interval { seconds: 3_600 }, "first", noop())
            .await
            .unwrap();
        scheduler
            .schedule(
                "X",
                Trigger::Cron {
                    expression: "0 0 9 * * *".to_string(),
                },
                "second",
                noop(),
            )
            .await
            .unwrap();

        let jobs = scheduler.jobs();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].description, "second");
        assert!(matches!(jobs[0].trigger, Trigger::Cron { .. }));

        scheduler.shutdown().await.unwrap();
        assert_eq!(scheduler.jobs().len(), 0);
        assert!(!scheduler.is_running());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_concurrent_reschedule_keeps_single_entry() {
        let scheduler = Arc::new(TaskScheduler::new(utc()));
        scheduler.start().await.unwrap();

        let tasks: Vec<_> = (0..8)
            .map(|i| {
                let scheduler = scheduler.clone();
                tokio::spawn(async move {
                    scheduler
                        .schedule(
                            "same",
                            Trigger::Interval { seconds: 3_600 },
                            &format!("run {i}"),
                            noop(),
                        )
                        .await
                })
            })
            .collect();
        for task in tasks {
            task.await.unwrap().unwrap();
        }
        assert_eq!(scheduler.jobs().len(), 1);

        assert!(scheduler.cancel("same").await.unwrap());
        assert!(scheduler.jobs().is_empty());
        assert!(!scheduler.cancel("same").await.unwrap());

        scheduler.shutdown().await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_failed_reschedule_keeps_previous_job() {
        let scheduler = TaskScheduler::new(utc());
        scheduler.start().await.unwrap();

        scheduler
            .schedule("keep", Trigger::Interval { seconds: 60 }, "original", noop())
            .await
            .unwrap();
        let bad = Trigger::Interval { seconds: u64::MAX };
        assert!(scheduler.schedule("keep", bad, "broken", noop()).await.is_err());

        let jobs = scheduler.jobs();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].description, "original");

        scheduler.shutdown().await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_past_one_time_rejected() {
        let scheduler = TaskScheduler::new(utc());
        scheduler.start().await.unwrap();

        let past = Trigger::OneTime {
            run_at: Utc::now() - chrono::Duration::minutes(1),
        };
        let result = scheduler.schedule("late", past, "", noop()).await;
        assert!(matches!(result, Err(Error::InvalidSchedule { .. })));
        assert_eq!(scheduler.jobs().len(), 0);

        scheduler.shutdown().await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_invalid_cron_rejected() {
        let scheduler = TaskScheduler::new(utc());
        scheduler.start().await.unwrap();

        let bad = Trigger::Cron {
            expression: "not a cron at all".to_string(),
        };
        assert!(scheduler.schedule("bad", bad, "", noop()).await.is_err());
        assert_eq!(scheduler.jobs().len(), 0);

        scheduler.shutdown().await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_one_time_job_fires_and_is_forgotten() {
        let scheduler = TaskScheduler::new(utc());
        scheduler.start().await.unwrap();

        let fired = Arc::new(AtomicUsize::new(0));
        let counter = fired.clone();
        let action: JobAction = Arc::new(move || {
            let counter = counter.clone();
            Box::pin(async move {
                counter.fetch_add(1, Ordering::SeqCst);
            })
        });

        let trigger = Trigger::OneTime {
            run_at: Utc::now() + chrono::Duration::seconds(1),
        };
        scheduler.schedule("once", trigger, "", action).await.unwrap();

        for _ in 0..40 {
            if fired.load(Ordering::SeqCst) > 0 && scheduler.jobs().len() == 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(250)).await;
        }
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert_eq!(scheduler.jobs().len(), 0);

        scheduler.shutdown().await.unwrap();
    }
}
