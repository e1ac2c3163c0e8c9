//! Reminder sweep and TTL purge jobs.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use dealbot_reminders::{DispatchReport, ReminderError, ReminderScheduler, ReminderSink};
use tokio_cron_scheduler::{Job, JobScheduler, JobSchedulerError};

/// Skips a tick while the previous sweep is still delivering, so a slow
/// transport never has two sweeps racing over the same batch.
#[derive(Debug, Default)]
pub struct SweepGuard {
    running: AtomicBool,
}

impl SweepGuard {
    fn try_enter(&self) -> Option<SweepTicket<'_>> {
        self.running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| SweepTicket(self))
    }
}

struct SweepTicket<'a>(&'a SweepGuard);

impl Drop for SweepTicket<'_> {
    fn drop(&mut self) {
        self.0.running.store(false, Ordering::Release);
    }
}

pub(super) async fn register_sweep_job(
    scheduler: &JobScheduler,
    cron: &str,
    reminders: Arc<ReminderScheduler>,
    sink: Arc<dyn ReminderSink>,
) -> Result<(), JobSchedulerError> {
    let guard = Arc::new(SweepGuard::default());

    let job = Job::new_async(cron, move |_uuid, _lock| {
        let reminders = Arc::clone(&reminders);
        let sink = Arc::clone(&sink);
        let guard = Arc::clone(&guard);

        Box::pin(async move {
            // Errors are logged inside; the next tick retries.
            let _ = run_sweep(&reminders, sink.as_ref(), &guard).await;
        })
    })?;

    scheduler.add(job).await?;
    tracing::info!(cron, "scheduler: registered reminder sweep job");
    Ok(())
}

pub(super) async fn register_purge_job(
    scheduler: &JobScheduler,
    cron: &str,
    reminders: Arc<ReminderScheduler>,
) -> Result<(), JobSchedulerError> {
    let job = Job::new_async(cron, move |_uuid, _lock| {
        let reminders = Arc::clone(&reminders);
        Box::pin(async move {
            run_purge(&reminders).await;
        })
    })?;

    scheduler.add(job).await?;
    tracing::info!(cron, "scheduler: registered reminder purge job");
    Ok(())
}

/// One sweep tick. `Ok(None)` when the previous tick is still running.
///
/// # Errors
///
/// Returns the store error if the due scan fails.
pub async fn run_sweep(
    reminders: &ReminderScheduler,
    sink: &dyn ReminderSink,
    guard: &SweepGuard,
) -> Result<Option<DispatchReport>, ReminderError> {
    let Some(_ticket) = guard.try_enter() else {
        tracing::debug!("scheduler: previous reminder sweep still running; skipping tick");
        return Ok(None);
    };

    match reminders.dispatch_due(sink).await {
        Ok(report) => {
            if report.delivered > 0 || report.failed > 0 || report.abandoned > 0 {
                tracing::info!(
                    delivered = report.delivered,
                    failed = report.failed,
                    abandoned = report.abandoned,
                    deferred = report.deferred,
                    "scheduler: reminder sweep complete"
                );
            }
            Ok(Some(report))
        }
        Err(e) => {
            tracing::error!(error = %e, "scheduler: reminder sweep failed");
            Err(e)
        }
    }
}

pub async fn run_purge(reminders: &ReminderScheduler) {
    if let Err(e) = reminders.purge_expired().await {
        tracing::warn!(error = %e, "scheduler: reminder purge failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sweep_guard_admits_one_holder() {
        let guard = SweepGuard::default();
        let first = guard.try_enter();
        assert!(first.is_some());
        assert!(guard.try_enter().is_none());
        drop(first);
        assert!(guard.try_enter().is_some());
    }
}
