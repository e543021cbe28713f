//! Periodic crawl scheduling.
//!
//! Jobs live in a [`JobRegistry`] owned by whoever builds the application.
//! Registering under a key that is already taken stops the previous job
//! first, so repeated activation never piles up timers. Every job runs on
//! its own task and can be stopped and awaited.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{info, warn};
use tw_core::{Error, Result};

/// Something the scheduler can fire. Errors are the job's to report.
#[async_trait]
pub trait ScheduledJob: Send + Sync + 'static {
    async fn execute(&self);
}

/// The crawl intervals offered to operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u64", into = "u64")]
pub enum ScheduleInterval {
    OneHour,
    TwoHours,
    FiveHours,
    TwelveHours,
    Daily,
}

impl ScheduleInterval {
    pub const ALL: [ScheduleInterval; 5] = [
        ScheduleInterval::OneHour,
        ScheduleInterval::TwoHours,
        ScheduleInterval::FiveHours,
        ScheduleInterval::TwelveHours,
        ScheduleInterval::Daily,
    ];

    pub fn hours(&self) -> u64 {
        match self {
            ScheduleInterval::OneHour => 1,
            ScheduleInterval::TwoHours => 2,
            ScheduleInterval::FiveHours => 5,
            ScheduleInterval::TwelveHours => 12,
            ScheduleInterval::Daily => 24,
        }
    }

    pub fn from_hours(hours: u64) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|interval| interval.hours() == hours)
            .ok_or_else(|| {
                Error::Config(format!(
                    "unsupported interval of {} hours, expected one of 1, 2, 5, 12, 24",
                    hours
                ))
            })
    }

    pub fn period(&self) -> Duration {
        Duration::from_secs(self.hours() * 3600)
    }
}

impl TryFrom<u64> for ScheduleInterval {
    type Error = Error;

    fn try_from(hours: u64) -> Result<Self> {
        Self::from_hours(hours)
    }
}

impl From<ScheduleInterval> for u64 {
    fn from(interval: ScheduleInterval) -> u64 {
        interval.hours()
    }
}

/// Accepts `5`, `5h` or `24h`.
impl FromStr for ScheduleInterval {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let digits = s.strip_suffix('h').unwrap_or(s).trim();
        let hours = digits
            .parse::<u64>()
            .map_err(|_| Error::Config(format!("invalid interval '{}'", s)))?;
        Self::from_hours(hours)
    }
}

impl fmt::Display for ScheduleInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}h", self.hours())
    }
}

/// A registered job as seen from outside the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobInfo {
    pub key: String,
    pub interval: ScheduleInterval,
    pub registered_at: DateTime<Utc>,
    pub next_run_at: DateTime<Utc>,
    pub runs: usize,
}

struct JobHandle {
    interval: ScheduleInterval,
    registered_at: DateTime<Utc>,
    runs: Arc<AtomicUsize>,
    stop: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl JobHandle {
    fn info(&self, key: &str) -> JobInfo {
        let runs = self.runs.load(Ordering::SeqCst);
        let period = chrono::Duration::hours(self.interval.hours() as i64);
        JobInfo {
            key: key.to_string(),
            interval: self.interval,
            registered_at: self.registered_at,
            next_run_at: self.registered_at + period * (runs as i32 + 1),
            runs,
        }
    }

    /// Signal the task and wait for it. A run already in progress finishes first.
    async fn stop(self, key: &str) {
        let _ = self.stop.send(true);
        if let Err(e) = self.task.await {
            warn!(%key, error = %e, "Scheduled job ended abnormally");
        }
    }
}

/// Keyed set of periodic jobs.
#[derive(Default)]
pub struct JobRegistry {
    jobs: Mutex<HashMap<String, JobHandle>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `job` every `interval`, first run one full interval from now.
    /// Returns true when a job already registered under `key` was replaced.
    pub async fn schedule(
        &self,
        key: &str,
        interval: ScheduleInterval,
        job: Arc<dyn ScheduledJob>,
    ) -> bool {
        let previous = self.jobs.lock().await.remove(key);
        let replaced = previous.is_some();
        if let Some(previous) = previous {
            info!(%key, old = %previous.interval, new = %interval, "⏱ Replacing scheduled job");
            previous.stop(key).await;
        }

        let (stop_tx, mut stop_rx) = watch::channel(false);
        let runs = Arc::new(AtomicUsize::new(0));
        let period = interval.period();
        let task_runs = runs.clone();
        let task_key = key.to_string();
        let first_run = Instant::now() + period;

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(first_run, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        info!(key = %task_key, "⏰ Running scheduled job");
                        job.execute().await;
                        task_runs.fetch_add(1, Ordering::SeqCst);
                    }
                    _ = stop_rx.changed() => break,
                }
            }
            info!(key = %task_key, "Scheduled job stopped");
        });

        let handle = JobHandle {
            interval,
            registered_at: Utc::now(),
            runs,
            stop: stop_tx,
            task,
        };

        // A concurrent schedule() for the same key may have slipped in while we awaited.
        let displaced = self.jobs.lock().await.insert(key.to_string(), handle);
        if let Some(displaced) = displaced {
            displaced.stop(key).await;
        }

        info!(%key, %interval, "✅ Job scheduled every {}", interval);
        replaced
    }

    /// Stop and await the job under `key`. False when nothing was registered.
    pub async fn cancel(&self, key: &str) -> bool {
        let handle = self.jobs.lock().await.remove(key);
        match handle {
            Some(handle) => {
                handle.stop(key).await;
                info!(%key, "Scheduled job cancelled");
                true
            }
            None => false,
        }
    }

    pub async fn get(&self, key: &str) -> Option<JobInfo> {
        self.jobs.lock().await.get(key).map(|handle| handle.info(key))
    }

    pub async fn active(&self) -> Vec<JobInfo> {
        let jobs = self.jobs.lock().await;
        let mut infos: Vec<JobInfo> = jobs.iter().map(|(key, handle)| handle.info(key)).collect();
        infos.sort_by(|a, b| a.key.cmp(&b.key));
        infos
    }

    /// Stop every job and wait for all of them.
    pub async fn shutdown(&self) {
        let jobs: Vec<(String, JobHandle)> = self.jobs.lock().await.drain().collect();
        for (key, handle) in jobs {
            handle.stop(&key).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct CountingJob {
        runs: AtomicUsize,
    }

    #[async_trait]
    impl ScheduledJob for CountingJob {
        async fn execute(&self) {
            self.runs.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_interval_parsing() {
        assert_eq!("1".parse::<ScheduleInterval>().unwrap(), ScheduleInterval::OneHour);
        assert_eq!("5h".parse::<ScheduleInterval>().unwrap(), ScheduleInterval::FiveHours);
        assert_eq!(" 24h ".parse::<ScheduleInterval>().unwrap(), ScheduleInterval::Daily);
        assert!("3h".parse::<ScheduleInterval>().is_err());
        assert!("soon".parse::<ScheduleInterval>().is_err());
        assert_eq!(ScheduleInterval::TwelveHours.period(), Duration::from_secs(12 * 3600));
    }

    #[test]
    fn test_interval_serde() {
        let json = serde_json::to_string(&ScheduleInterval::TwoHours).unwrap();
        assert_eq!(json, "2");
        let parsed: ScheduleInterval = serde_json::from_str("12").unwrap();
        assert_eq!(parsed, ScheduleInterval::TwelveHours);
        assert!(serde_json::from_str::<ScheduleInterval>("7").is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_job_runs_each_interval() {
        let registry = JobRegistry::new();
        let job = Arc::new(CountingJob::default());
        registry.schedule("crawl", ScheduleInterval::OneHour, job.clone()).await;

        tokio::time::sleep(Duration::from_secs(30 * 60)).await;
        assert_eq!(job.runs.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_secs(2 * 3600)).await;
        assert_eq!(job.runs.load(Ordering::SeqCst), 2);
        assert_eq!(registry.get("crawl").await.unwrap().runs, 2);

        registry.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_reschedule_replaces_job() {
        let registry = JobRegistry::new();
        let first = Arc::new(CountingJob::default());
        let second = Arc::new(CountingJob::default());

        assert!(!registry.schedule("crawl", ScheduleInterval::OneHour, first.clone()).await);
        assert!(registry.schedule("crawl", ScheduleInterval::TwoHours, second.clone()).await);

        let active = registry.active().await;
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].interval, ScheduleInterval::TwoHours);

        tokio::time::sleep(Duration::from_secs(5 * 3600)).await;
        assert_eq!(first.runs.load(Ordering::SeqCst), 0);
        assert_eq!(second.runs.load(Ordering::SeqCst), 2);

        registry.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_stops_job() {
        let registry = JobRegistry::new();
        let job = Arc::new(CountingJob::default());
        registry.schedule("crawl", ScheduleInterval::OneHour, job.clone()).await;

        assert!(registry.cancel("crawl").await);
        assert!(!registry.cancel("crawl").await);
        assert!(registry.active().await.is_empty());

        tokio::time::sleep(Duration::from_secs(3 * 3600)).await;
        assert_eq!(job.runs.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_shutdown_clears_registry() {
        let registry = JobRegistry::new();
        registry.schedule("a", ScheduleInterval::OneHour, Arc::new(CountingJob::default())).await;
        registry.schedule("b", ScheduleInterval::Daily, Arc::new(CountingJob::default())).await;
        assert_eq!(registry.active().await.len(), 2);

        registry.shutdown().await;
        assert!(registry.active().await.is_empty());
    }
}
