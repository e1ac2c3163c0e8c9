//! Database operations for the `reminders` table.

use chrono::{DateTime, Utc};
use dealbot_core::{Deal, Reminder, ReminderStatus};
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::DbError;

const REMINDER_COLUMNS: &str =
    "reminder_id, user_id, reminder_time, title, deal_snapshot, status, created_at, ttl, phone_number_id";

/// A row from the `reminders` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ReminderRow {
    pub reminder_id: Uuid,
    pub user_id: String,
    pub reminder_time: DateTime<Utc>,
    pub title: String,
    pub deal_snapshot: Json<Deal>,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub ttl: i64,
    pub phone_number_id: Option<String>,
}

impl TryFrom<ReminderRow> for Reminder {
    type Error = DbError;

    fn try_from(row: ReminderRow) -> Result<Self, Self::Error> {
        let status: ReminderStatus = row.status.parse().map_err(|e| DbError::InvalidRow {
            table: "reminders",
            key: row.reminder_id.to_string(),
            reason: format!("{e}"),
        })?;
        Ok(Reminder {
            reminder_id: row.reminder_id,
            user_id: row.user_id,
            reminder_time: row.reminder_time,
            title: row.title,
            deal_snapshot: row.deal_snapshot.0,
            status,
            created_at: row.created_at,
            ttl: row.ttl,
            phone_number_id: row.phone_number_id,
        })
    }
}

/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails (including a duplicate id).
pub async fn insert_reminder(pool: &PgPool, reminder: &Reminder) -> Result<(), DbError> {
    sqlx::query(
        "INSERT INTO reminders \
             (reminder_id, user_id, reminder_time, title, deal_snapshot, status, created_at, ttl, \
              phone_number_id) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
    )
    .bind(reminder.reminder_id)
    .bind(&reminder.user_id)
    .bind(reminder.reminder_time)
    .bind(&reminder.title)
    .bind(Json(&reminder.deal_snapshot))
    .bind(reminder.status.as_str())
    .bind(reminder.created_at)
    .bind(reminder.ttl)
    .bind(reminder.phone_number_id.as_deref())
    .execute(pool)
    .await?;

    Ok(())
}

/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_reminder(pool: &PgPool, reminder_id: Uuid) -> Result<Option<Reminder>, DbError> {
    let row = sqlx::query_as::<_, ReminderRow>(&format!(
        "SELECT {REMINDER_COLUMNS} FROM reminders WHERE reminder_id = $1"
    ))
    .bind(reminder_id)
    .fetch_optional(pool)
    .await?;

    row.map(Reminder::try_from).transpose()
}

/// Pending reminders with `reminder_time <= now`, oldest first, at most `limit`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_due_reminders(
    pool: &PgPool,
    now: DateTime<Utc>,
    limit: i64,
) -> Result<Vec<Reminder>, DbError> {
    let rows = sqlx::query_as::<_, ReminderRow>(&format!(
        "SELECT {REMINDER_COLUMNS} FROM reminders \
         WHERE status = 'pending' AND reminder_time <= $1 \
         ORDER BY reminder_time, reminder_id \
         LIMIT $2"
    ))
    .bind(now)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(Reminder::try_from).collect()
}

/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_reminders_for_user(
    pool: &PgPool,
    user_id: &str,
) -> Result<Vec<Reminder>, DbError> {
    let rows = sqlx::query_as::<_, ReminderRow>(&format!(
        "SELECT {REMINDER_COLUMNS} FROM reminders \
         WHERE user_id = $1 \
         ORDER BY created_at DESC"
    ))
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(Reminder::try_from).collect()
}

/// Conditionally moves a reminder from `from` to `to`.
///
/// Returns `false` when the row is missing or no longer in `from`, so
/// concurrent sweepers cannot both claim the same transition.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the update fails.
pub async fn transition_reminder_status(
    pool: &PgPool,
    reminder_id: Uuid,
    from: ReminderStatus,
    to: ReminderStatus,
) -> Result<bool, DbError> {
    let result = sqlx::query(
        "UPDATE reminders \
         SET status = $1, updated_at = NOW() \
         WHERE reminder_id = $2 AND status = $3",
    )
    .bind(to.as_str())
    .bind(reminder_id)
    .bind(from.as_str())
    .execute(pool)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Deletes reminders whose `ttl` epoch is at or before `now_epoch`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the delete fails.
pub async fn delete_expired_reminders(pool: &PgPool, now_epoch: i64) -> Result<u64, DbError> {
    let result = sqlx::query("DELETE FROM reminders WHERE ttl <= $1")
        .bind(now_epoch)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}
