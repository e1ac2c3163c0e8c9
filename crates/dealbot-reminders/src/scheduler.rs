//! Reminder scheduling and the due-scan sweep.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use dealbot_core::{Classify, Clock, Deal, Reminder, ReminderStatus, SystemClock};
use uuid::Uuid;

use crate::error::ReminderError;
use crate::parse::{check_lead, parse_reminder_time};
use crate::sink::ReminderSink;
use crate::store::ReminderStore;

/// Reminders fetched per sweep when no batch size is configured.
pub const DEFAULT_BATCH_SIZE: usize = 50;

/// Outcome of one [`ReminderScheduler::dispatch_due`] tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub delivered: usize,
    /// Transient failures, left pending for the next tick.
    pub failed: usize,
    /// Permanent failures, marked `failed` and never swept again.
    pub abandoned: usize,
    /// The batch cap was hit; more due reminders may be waiting.
    pub deferred: bool,
}

pub struct ReminderScheduler {
    store: Arc<dyn ReminderStore>,
    clock: Arc<dyn Clock>,
    batch_size: usize,
}

impl ReminderScheduler {
    #[must_use]
    pub fn new(store: Arc<dyn ReminderStore>) -> Self {
        Self {
            store,
            clock: Arc::new(SystemClock),
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Zero is treated as one so a sweep always makes progress.
    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Schedule a reminder `delay` from now.
    ///
    /// # Errors
    ///
    /// Returns [`ReminderError::Rejected`] when `delay` is not positive or
    /// exceeds 24 hours, or a store error if the insert fails.
    pub async fn schedule(
        &self,
        user_id: &str,
        deal: &Deal,
        delay: Duration,
    ) -> Result<Uuid, ReminderError> {
        let now = self.clock.now();
        self.insert(Reminder::new(user_id, deal, now + delay, now), now)
            .await
    }

    /// Schedule a reminder at an absolute time.
    ///
    /// # Errors
    ///
    /// Same as [`ReminderScheduler::schedule`].
    pub async fn schedule_at(
        &self,
        user_id: &str,
        deal: &Deal,
        at: DateTime<Utc>,
    ) -> Result<Uuid, ReminderError> {
        let now = self.clock.now();
        self.insert(Reminder::new(user_id, deal, at, now), now).await
    }

    /// [`Self::schedule_at`] for a reminder that must be delivered from the
    /// bot number `phone_number_id`.
    ///
    /// # Errors
    ///
    /// Same as [`ReminderScheduler::schedule`].
    pub async fn schedule_via(
        &self,
        phone_number_id: &str,
        user_id: &str,
        deal: &Deal,
        at: DateTime<Utc>,
    ) -> Result<Uuid, ReminderError> {
        let now = self.clock.now();
        let reminder = Reminder::new(user_id, deal, at, now).via(phone_number_id);
        self.insert(reminder, now).await
    }

    async fn insert(&self, reminder: Reminder, now: DateTime<Utc>) -> Result<Uuid, ReminderError> {
        check_lead(reminder.reminder_time, now)?;
        self.store.insert(&reminder).await?;
        tracing::info!(
            user_id = %reminder.user_id,
            phone_number_id = reminder.phone_number_id.as_deref(),
            reminder_id = %reminder.reminder_id,
            reminder_time = %reminder.reminder_time,
            "reminder scheduled"
        );
        Ok(reminder.reminder_id)
    }

    /// Resolve free text such as `in 2 hours` or `at 8 pm` against the clock.
    ///
    /// # Errors
    ///
    /// See [`parse_reminder_time`].
    pub fn parse(&self, input: &str) -> Result<DateTime<Utc>, ReminderError> {
        parse_reminder_time(input, self.clock.now())
    }

    /// Pending reminders due now, at most one batch.
    ///
    /// Read-only: nothing is marked until a sink confirms delivery, so a
    /// sweep whose delivery fails leaves every reminder pending.
    ///
    /// # Errors
    ///
    /// Returns the store error if the scan fails.
    pub async fn sweep(&self) -> Result<Vec<Reminder>, ReminderError> {
        let now = self.clock.now();
        let due = self.store.list_due(now, self.batch_size).await?;
        // Guard against a store that returns rows outside the due window.
        Ok(due.into_iter().filter(|r| r.is_due(now)).collect())
    }

    /// Sweep, hand each due reminder to `sink`, and mark the delivered ones
    /// `sent`. Transient failures stay pending for the next tick; any other
    /// failure marks the reminder `failed` so it stops occupying the batch.
    ///
    /// # Errors
    ///
    /// Returns the store error if the initial scan fails. Per-reminder
    /// failures are counted in the report instead.
    pub async fn dispatch_due(&self, sink: &dyn ReminderSink) -> Result<DispatchReport, ReminderError> {
        let due = self.sweep().await?;
        let mut report = DispatchReport {
            deferred: due.len() >= self.batch_size,
            ..DispatchReport::default()
        };

        for reminder in &due {
            let token = reminder.idempotency_token();
            if let Err(e) = sink.deliver(reminder, &token).await {
                if e.is_transient() {
                    tracing::warn!(
                        reminder_id = %reminder.reminder_id,
                        user_id = %reminder.user_id,
                        error = %e,
                        "reminder delivery failed; will retry next sweep"
                    );
                    report.failed += 1;
                } else {
                    self.abandon(reminder, &e).await;
                    report.abandoned += 1;
                }
                continue;
            }

            match self
                .store
                .transition(reminder.reminder_id, ReminderStatus::Pending, ReminderStatus::Sent)
                .await
            {
                Ok(true) => {}
                Ok(false) => tracing::debug!(
                    reminder_id = %reminder.reminder_id,
                    "reminder left pending before it could be marked sent"
                ),
                Err(e) => tracing::warn!(
                    reminder_id = %reminder.reminder_id,
                    error = %e,
                    "reminder delivered but not marked sent; may be delivered again"
                ),
            }
            report.delivered += 1;
        }

        if report.deferred {
            tracing::info!(batch_size = self.batch_size, "reminder batch full; deferring overflow");
        }
        Ok(report)
    }

    async fn abandon(&self, reminder: &Reminder, cause: &ReminderError) {
        tracing::error!(
            reminder_id = %reminder.reminder_id,
            user_id = %reminder.user_id,
            error = %cause,
            "reminder cannot be delivered; marking failed"
        );
        if let Err(e) = self
            .store
            .transition(reminder.reminder_id, ReminderStatus::Pending, ReminderStatus::Failed)
            .await
        {
            tracing::warn!(
                reminder_id = %reminder.reminder_id,
                error = %e,
                "failed to mark reminder failed; it will be offered again"
            );
        }
    }

    /// Cancel a pending reminder. `Ok(false)` when it already fired or was
    /// cancelled.
    ///
    /// # Errors
    ///
    /// Returns [`ReminderError::NotFound`] for an unknown id, or the store error.
    pub async fn cancel(&self, reminder_id: Uuid) -> Result<bool, ReminderError> {
        if self
            .store
            .transition(reminder_id, ReminderStatus::Pending, ReminderStatus::Cancelled)
            .await?
        {
            tracing::info!(reminder_id = %reminder_id, "reminder cancelled");
            return Ok(true);
        }
        match self.store.get(reminder_id).await? {
            Some(_) => Ok(false),
            None => Err(ReminderError::NotFound(reminder_id)),
        }
    }

    /// # Errors
    ///
    /// Returns the store error if the lookup fails.
    pub async fn reminders_for(&self, user_id: &str) -> Result<Vec<Reminder>, ReminderError> {
        self.store.list_for_user(user_id).await
    }

    /// Delete reminders whose 48 hour TTL has passed.
    ///
    /// # Errors
    ///
    /// Returns the store error if the delete fails.
    pub async fn purge_expired(&self) -> Result<u64, ReminderError> {
        let removed = self.store.delete_expired(self.clock.now()).await?;
        if removed > 0 {
            tracing::info!(removed, "expired reminders purged");
        }
        Ok(removed)
    }
}
