// ABOUTME: Scheduler root — cron-driven nutrition scrape job plus the sync-staleness alerting pass
// ABOUTME: A cron-driven background-task loop built on tokio-cron-scheduler
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2026 fitcoach-server contributors

//! Scheduled background work.
//!
//! Two independent jobs run under one [`tokio_cron_scheduler::JobScheduler`]:
//!
//! - The nutrition scraper, on `ScraperConfig::cron_expression` (default
//!   daily at 02:00). Logs into the nutrition tracking site with a headless
//!   browser, downloads the trailing `lookback_days` export, and upserts it.
//! - An hourly staleness sweep over [`crate::storage::sync`], which warns
//!   when a source hasn't synced successfully within
//!   `ServerConfig::sync_staleness_hours`.
//!
//! A scrape attempt in flight when the next tick fires is
//! left alone rather than run twice — [`ScrapeGuard`] is the reentrancy
//! latch backing that rule, and a job-level timeout
//! (`ScraperConfig::job_timeout_secs`) bounds a hung browser session.

pub mod scraper;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::config::ServerConfig;
use crate::errors::AppResult;
use crate::storage::sync::{is_stale, list_all};
use crate::storage::Database;
use crate::tracker_client::TrackerClient;

pub use scraper::run_nutrition_scrape;

/// Reentrancy latch: a tick that finds the previous scrape still running
/// skips itself instead of queuing behind it.
#[derive(Default)]
pub struct ScrapeGuard {
    running: AtomicBool,
}

impl ScrapeGuard {
    /// Attempt to enter the guarded section. Returns `false` (and changes
    /// nothing) if a previous scrape is still in flight.
    fn try_enter(&self) -> bool {
        self.running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    fn leave(&self) {
        self.running.store(false, Ordering::Release);
    }
}

/// One user to scrape on behalf of. The scraper targets a single tracked
/// account, so this
/// is the user row that ingested nutrition days are attributed to.
#[derive(Debug, Clone, Copy)]
pub struct ScrapeTarget {
    pub user_id: Uuid,
}

/// Build and start the scheduler: the nutrition scrape job on its configured
/// cron expression, and an hourly staleness sweep.
///
/// # Errors
///
/// Returns an error if the underlying `tokio-cron-scheduler` fails to
/// construct or register a job, or if it cannot be started.
pub async fn start(config: Arc<ServerConfig>, db: Database, tracker: TrackerClient, target: ScrapeTarget) -> AppResult<JobScheduler> {
    let scheduler = JobScheduler::new()
        .await
        .map_err(|e| crate::errors::AppError::internal(format!("failed to construct job scheduler: {e}")))?;

    let guard = Arc::new(ScrapeGuard::default());
    let scrape_config = config.scraper.clone();
    let scrape_db = db.clone();
    let scrape_tracker = tracker.clone();

    let scrape_job = Job::new_async(scrape_config.cron_expression.as_str(), move |_uuid, _l| {
        let guard = Arc::clone(&guard);
        let config = scrape_config.clone();
        let db = scrape_db.clone();
        let tracker = scrape_tracker.clone();
        Box::pin(async move {
            if !guard.try_enter() {
                warn!("nutrition scrape tick skipped: previous run still in flight");
                return;
            }
            let timeout = Duration::from_secs(config.job_timeout_secs);
            let outcome = tokio::time::timeout(timeout, run_nutrition_scrape(&config, &db, target.user_id)).await;
            match outcome {
                Ok(Ok(records)) => info!(records, "nutrition scrape completed"),
                Ok(Err(e)) => error!(error = %e, "nutrition scrape failed"),
                Err(_) => error!(timeout_secs = config.job_timeout_secs, "nutrition scrape timed out"),
            }
            guard.leave();
            // tracker is unused by the scrape path itself today but is kept
            // alive for the staleness sweep sharing this scheduler's captured state.
            drop(tracker);
        })
    })
    .map_err(|e| crate::errors::AppError::internal(format!("failed to build scrape job: {e}")))?;

    scheduler
        .add(scrape_job)
        .await
        .map_err(|e| crate::errors::AppError::internal(format!("failed to register scrape job: {e}")))?;

    let staleness_hours = config.sync_staleness_hours;
    let alert_db = db.clone();
    let alert_job = Job::new_async("0 0 * * * *", move |_uuid, _l| {
        let db = alert_db.clone();
        Box::pin(async move {
            if let Err(e) = run_staleness_sweep(&db, staleness_hours).await {
                error!(error = %e, "staleness sweep failed");
            }
        })
    })
    .map_err(|e| crate::errors::AppError::internal(format!("failed to build staleness job: {e}")))?;

    scheduler
        .add(alert_job)
        .await
        .map_err(|e| crate::errors::AppError::internal(format!("failed to register staleness job: {e}")))?;

    scheduler
        .start()
        .await
        .map_err(|e| crate::errors::AppError::internal(format!("failed to start scheduler: {e}")))?;

    info!(cron = %config.scraper.cron_expression, "scheduler started");
    Ok(scheduler)
}

/// Walk every `(user, source)` sync row and warn on anything stale.
/// This never fails the caller for an individual stale
/// row — it only logs; surfacing staleness to a human is `tracing`'s job
/// here, the same way any background-job failure is recorded rather than panicking.
///
/// # Errors
///
/// Returns a database error if the underlying row listing fails.
async fn run_staleness_sweep(db: &Database, staleness_hours: i64) -> AppResult<()> {
    let now = chrono::Utc::now();
    let rows = list_all(db).await?;
    let mut stale_count = 0usize;
    for row in &rows {
        if is_stale(row, now, staleness_hours) {
            stale_count += 1;
            warn!(
                user_id = %row.user_id,
                source = ?row.source,
                last_outcome = ?row.last_outcome,
                last_attempt_at = %row.last_attempt_at,
                "sync source is stale"
            );
        }
    }
    info!(total = rows.len(), stale = stale_count, "staleness sweep complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guard_rejects_reentry_until_released() {
        let guard = ScrapeGuard::default();
        assert!(guard.try_enter());
        assert!(!guard.try_enter());
        guard.leave();
        assert!(guard.try_enter());
    }
}
