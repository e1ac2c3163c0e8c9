//! Background job scheduler.
//!
//! Initialises a [`JobScheduler`] at server startup and registers the
//! reminder sweep, the reminder TTL purge, and idle-session eviction.

mod reminders;

use std::sync::Arc;

use chrono::Utc;
use dealbot_core::AppConfig;
use dealbot_deals::SessionManager;
use dealbot_reminders::{ReminderScheduler, ReminderSink};
use tokio_cron_scheduler::{Job, JobScheduler, JobSchedulerError};

pub use reminders::{run_purge, run_sweep, SweepGuard};

/// Hourly, a quarter past.
const PURGE_CRON: &str = "0 15 * * * *";
/// Every ten minutes.
const EVICT_CRON: &str = "0 */10 * * * *";
/// In-process sessions idle this long are dropped; their snapshot stays in
/// `user_sessions`.
const SESSION_IDLE: chrono::Duration = chrono::Duration::hours(1);

/// Builds and starts the background job scheduler.
///
/// Returns the running [`JobScheduler`] handle, which must be kept alive
/// for the lifetime of the process. Dropping it shuts down all jobs.
///
/// # Errors
///
/// Returns [`JobSchedulerError`] if the scheduler cannot be initialised,
/// a job cannot be registered (including an invalid sweep cron), or the
/// scheduler fails to start.
pub async fn build_scheduler(
    reminders: Arc<ReminderScheduler>,
    sink: Arc<dyn ReminderSink>,
    sessions: Arc<SessionManager>,
    config: &AppConfig,
) -> Result<JobScheduler, JobSchedulerError> {
    let scheduler = JobScheduler::new().await?;

    reminders::register_sweep_job(
        &scheduler,
        &config.reminder_sweep_cron,
        Arc::clone(&reminders),
        sink,
    )
    .await?;
    reminders::register_purge_job(&scheduler, PURGE_CRON, reminders).await?;
    register_session_eviction_job(&scheduler, sessions).await?;

    scheduler.start().await?;
    Ok(scheduler)
}

async fn register_session_eviction_job(
    scheduler: &JobScheduler,
    sessions: Arc<SessionManager>,
) -> Result<(), JobSchedulerError> {
    let job = Job::new_async(EVICT_CRON, move |_uuid, _lock| {
        let sessions = Arc::clone(&sessions);
        Box::pin(async move {
            let evicted = sessions.evict_idle(Utc::now(), SESSION_IDLE);
            if evicted > 0 {
                tracing::info!(
                    evicted,
                    active = sessions.active_sessions(),
                    "scheduler: idle sessions evicted"
                );
            }
        })
    })?;

    scheduler.add(job).await?;
    Ok(())
}
