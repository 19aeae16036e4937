//! Periodic maintenance jobs
//!
//! Author: Sofiya Bot Team
//! Version: 0.1.0
//! Date: 2026-10-03
//!
//! Four fixed jobs, each aligned to UTC wall-clock boundaries and driven by
//! its own task. A job run executes in a separate task so that an error or
//! a panic is logged without stopping the schedule.

use std::{fmt, sync::Arc};

use async_trait::async_trait;
use chrono::{DateTime, Datelike, Duration, DurationRound, Utc};
use sofiya_core::{Result, SharedClock, SofiyaError};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument};

/// Scheduled maintenance job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Job {
    /// Expire overdue rentals and warn groups whose rental ends soon
    RentalSweep,
    /// Flush every collection and take a snapshot
    Backup,
    /// Remove old log files and backups
    RetentionTrim,
    /// Drop all rate limiter windows
    RateLimitReset,
}

impl Job {
    pub const ALL: [Job; 4] = [
        Job::RentalSweep,
        Job::Backup,
        Job::RetentionTrim,
        Job::RateLimitReset,
    ];

    pub fn cadence(&self) -> Cadence {
        match self {
            Job::RentalSweep => Cadence::Hourly,
            Job::Backup => Cadence::EverySixHours,
            Job::RetentionTrim => Cadence::WeeklySunday,
            Job::RateLimitReset => Cadence::QuarterHour,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Job::RentalSweep => "rental-sweep",
            Job::Backup => "backup",
            Job::RetentionTrim => "retention-trim",
            Job::RateLimitReset => "rate-limit-reset",
        }
    }
}

impl fmt::Display for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// When a job fires
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cadence {
    /// Minute 0 of every hour
    Hourly,
    /// 00:00, 06:00, 12:00 and 18:00
    EverySixHours,
    /// Sunday 00:00
    WeeklySunday,
    /// Minutes 0, 15, 30 and 45
    QuarterHour,
}

impl Cadence {
    /// First firing instant strictly after `t`
    pub fn next_after(&self, t: DateTime<Utc>) -> DateTime<Utc> {
        match self {
            Cadence::Hourly => floor(t, Duration::hours(1)) + Duration::hours(1),
            Cadence::EverySixHours => floor(t, Duration::hours(6)) + Duration::hours(6),
            Cadence::QuarterHour => floor(t, Duration::minutes(15)) + Duration::minutes(15),
            Cadence::WeeklySunday => {
                let midnight = floor(t, Duration::days(1));
                let days_ahead = (7 - t.weekday().num_days_from_sunday()) % 7;
                let candidate = midnight + Duration::days(i64::from(days_ahead));
                if candidate > t {
                    candidate
                } else {
                    candidate + Duration::weeks(1)
                }
            }
        }
    }
}

/// Boundaries are counted from the Unix epoch, which is midnight UTC, so
/// hour and day multiples line up with the wall clock.
fn floor(t: DateTime<Utc>, step: Duration) -> DateTime<Utc> {
    t.duration_trunc(step).unwrap_or(t)
}

/// Executes job bodies for the scheduler
#[async_trait]
pub trait JobHandler: Send + Sync {
    async fn run_job(&self, job: Job) -> Result<()>;
}

/// Drives the fixed jobs
pub struct Scheduler {
    handler: Arc<dyn JobHandler>,
    clock: SharedClock,
    handles: Vec<(Job, JoinHandle<()>)>,
}

impl fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scheduler")
            .field("running", &self.is_running())
            .finish()
    }
}

impl Scheduler {
    pub fn new(handler: Arc<dyn JobHandler>, clock: SharedClock) -> Self {
        Self {
            handler,
            clock,
            handles: Vec::new(),
        }
    }

    pub fn is_running(&self) -> bool {
        !self.handles.is_empty()
    }

    /// Spawn one task per job
    #[instrument(skip(self))]
    pub fn start(&mut self) -> Result<()> {
        if self.is_running() {
            return Err(SofiyaError::Internal("Scheduler already running".to_string()));
        }

        for job in Job::ALL {
            let handler = self.handler.clone();
            let clock = self.clock.clone();
            let handle = tokio::spawn(async move { run_schedule(job, handler, clock).await });
            self.handles.push((job, handle));
        }

        info!("⏰ Scheduler started with {} jobs", self.handles.len());
        Ok(())
    }

    /// Abort every job task
    #[instrument(skip(self))]
    pub async fn stop(&mut self) {
        if self.handles.is_empty() {
            return;
        }
        for (_, handle) in &self.handles {
            handle.abort();
        }
        let handles: Vec<_> = self.handles.drain(..).map(|(_, handle)| handle).collect();
        // Aborted tasks resolve with a cancellation error.
        let _ = futures::future::join_all(handles).await;
        info!("🛑 Scheduler stopped");
    }

    /// Run one job immediately, outside its schedule
    pub async fn run_now(&self, job: Job) -> Result<()> {
        execute(job, self.handler.clone()).await
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        for (_, handle) in &self.handles {
            handle.abort();
        }
    }
}

async fn run_schedule(job: Job, handler: Arc<dyn JobHandler>, clock: SharedClock) {
    let cadence = job.cadence();
    let mut last_fire: Option<DateTime<Utc>> = None;

    loop {
        let now = clock.now();
        // Never fire the same boundary twice if the clock lags the timer.
        let from = last_fire.map_or(now, |last| last.max(now));
        let next = cadence.next_after(from);
        let wait = (next - now).to_std().unwrap_or_default();
        debug!("⏳ {} next at {} (in {:?})", job, next, wait);

        tokio::time::sleep(wait).await;
        last_fire = Some(next);

        let _ = execute(job, handler.clone()).await;
    }
}

/// Run the job body in its own task and log how it ended
async fn execute(job: Job, handler: Arc<dyn JobHandler>) -> Result<()> {
    let start = std::time::Instant::now();
    info!("⏰ Running scheduled job: {}", job);

    match tokio::spawn(async move { handler.run_job(job).await }).await {
        Ok(Ok(())) => {
            info!("✅ Job {} completed in {:?}", job, start.elapsed());
            Ok(())
        }
        Ok(Err(e)) => {
            error!("❌ Job {} failed: {}", job, e);
            Err(e)
        }
        Err(e) => {
            error!("❌ Job {} panicked: {}", job, e);
            Err(SofiyaError::Internal(format!("job {} panicked: {}", job, e)))
        }
    }
}
