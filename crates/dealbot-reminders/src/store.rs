//! Reminder persistence. Status transitions are conditional on the current
//! status, so concurrent sweepers cannot both claim one reminder.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dealbot_core::{Reminder, ReminderStatus};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::ReminderError;

#[async_trait]
pub trait ReminderStore: Send + Sync {
    async fn insert(&self, reminder: &Reminder) -> Result<(), ReminderError>;

    async fn get(&self, reminder_id: Uuid) -> Result<Option<Reminder>, ReminderError>;

    /// Pending reminders due at `now`, oldest first, at most `limit`.
    async fn list_due(&self, now: DateTime<Utc>, limit: usize) -> Result<Vec<Reminder>, ReminderError>;

    async fn list_for_user(&self, user_id: &str) -> Result<Vec<Reminder>, ReminderError>;

    /// Move `reminder_id` from `from` to `to`. `Ok(false)` when it was not
    /// in `from`.
    async fn transition(
        &self,
        reminder_id: Uuid,
        from: ReminderStatus,
        to: ReminderStatus,
    ) -> Result<bool, ReminderError>;

    /// Delete reminders whose TTL has passed. Returns how many were removed.
    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64, ReminderError>;
}

#[derive(Debug, Default)]
pub struct MemoryReminderStore {
    reminders: Mutex<HashMap<Uuid, Reminder>>,
}

impl MemoryReminderStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<Uuid, Reminder>> {
        self.reminders.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl ReminderStore for MemoryReminderStore {
    async fn insert(&self, reminder: &Reminder) -> Result<(), ReminderError> {
        self.lock().insert(reminder.reminder_id, reminder.clone());
        Ok(())
    }

    async fn get(&self, reminder_id: Uuid) -> Result<Option<Reminder>, ReminderError> {
        Ok(self.lock().get(&reminder_id).cloned())
    }

    async fn list_due(&self, now: DateTime<Utc>, limit: usize) -> Result<Vec<Reminder>, ReminderError> {
        let mut due: Vec<Reminder> = self
            .lock()
            .values()
            .filter(|r| r.is_due(now))
            .cloned()
            .collect();
        due.sort_by(|a, b| {
            a.reminder_time
                .cmp(&b.reminder_time)
                .then(a.reminder_id.cmp(&b.reminder_id))
        });
        due.truncate(limit);
        Ok(due)
    }

    async fn list_for_user(&self, user_id: &str) -> Result<Vec<Reminder>, ReminderError> {
        let mut found: Vec<Reminder> = self
            .lock()
            .values()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect();
        found.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(found)
    }

    async fn transition(
        &self,
        reminder_id: Uuid,
        from: ReminderStatus,
        to: ReminderStatus,
    ) -> Result<bool, ReminderError> {
        let mut reminders = self.lock();
        match reminders.get_mut(&reminder_id) {
            Some(r) if r.status == from => {
                r.status = from.transition(to)?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64, ReminderError> {
        let mut reminders = self.lock();
        let before = reminders.len();
        reminders.retain(|_, r| !r.is_expired(now));
        Ok((before - reminders.len()) as u64)
    }
}

#[derive(Debug, Clone)]
pub struct PgReminderStore {
    pool: PgPool,
}

impl PgReminderStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ReminderStore for PgReminderStore {
    async fn insert(&self, reminder: &Reminder) -> Result<(), ReminderError> {
        Ok(dealbot_db::insert_reminder(&self.pool, reminder).await?)
    }

    async fn get(&self, reminder_id: Uuid) -> Result<Option<Reminder>, ReminderError> {
        Ok(dealbot_db::get_reminder(&self.pool, reminder_id).await?)
    }

    async fn list_due(&self, now: DateTime<Utc>, limit: usize) -> Result<Vec<Reminder>, ReminderError> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        Ok(dealbot_db::list_due_reminders(&self.pool, now, limit).await?)
    }

    async fn list_for_user(&self, user_id: &str) -> Result<Vec<Reminder>, ReminderError> {
        Ok(dealbot_db::list_reminders_for_user(&self.pool, user_id).await?)
    }

    async fn transition(
        &self,
        reminder_id: Uuid,
        from: ReminderStatus,
        to: ReminderStatus,
    ) -> Result<bool, ReminderError> {
        from.transition(to)?;
        Ok(dealbot_db::transition_reminder_status(&self.pool, reminder_id, from, to).await?)
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64, ReminderError> {
        Ok(dealbot_db::delete_expired_reminders(&self.pool, now.timestamp()).await?)
    }
}
