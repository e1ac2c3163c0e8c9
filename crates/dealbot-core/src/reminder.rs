use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::deals::Deal;
use crate::error::CoreError;

/// Furthest ahead a reminder may be scheduled.
pub const MAX_REMINDER_LEAD: Duration = Duration::hours(24);

/// Lifetime of a persisted reminder row after creation.
pub const REMINDER_TTL: Duration = Duration::hours(48);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReminderStatus {
    Pending,
    Sent,
    Cancelled,
    /// Delivery failed for a reason retrying cannot fix.
    Failed,
}

impl ReminderStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ReminderStatus::Pending => "pending",
            ReminderStatus::Sent => "sent",
            ReminderStatus::Cancelled => "cancelled",
            ReminderStatus::Failed => "failed",
        }
    }

    /// Status only ever moves out of `Pending`.
    #[must_use]
    pub fn can_transition_to(self, next: ReminderStatus) -> bool {
        matches!(
            (self, next),
            (
                ReminderStatus::Pending,
                ReminderStatus::Sent | ReminderStatus::Cancelled | ReminderStatus::Failed
            )
        )
    }

    /// # Errors
    ///
    /// Returns [`CoreError::InvalidTransition`] for anything but `pending → sent|cancelled|failed`.
    pub fn transition(self, next: ReminderStatus) -> Result<ReminderStatus, CoreError> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(CoreError::InvalidTransition {
                from: self.as_str().to_string(),
                to: next.as_str().to_string(),
            })
        }
    }
}

impl std::fmt::Display for ReminderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ReminderStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ReminderStatus::Pending),
            "sent" => Ok(ReminderStatus::Sent),
            "cancelled" => Ok(ReminderStatus::Cancelled),
            "failed" => Ok(ReminderStatus::Failed),
            other => Err(CoreError::InvalidStatus(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reminder {
    pub reminder_id: Uuid,
    pub user_id: String,
    pub reminder_time: DateTime<Utc>,
    pub title: String,
    /// Frozen copy of the deal at scheduling time.
    pub deal_snapshot: Deal,
    pub status: ReminderStatus,
    pub created_at: DateTime<Utc>,
    /// Expiry as epoch seconds: `created_at + 48h`.
    pub ttl: i64,
    /// Bot number the reminder was scheduled through; delivery goes out
    /// from the same number.
    #[serde(default)]
    pub phone_number_id: Option<String>,
}

impl Reminder {
    /// Build a pending reminder. Callers validate the lead time.
    #[must_use]
    pub fn new(
        user_id: &str,
        deal: &Deal,
        reminder_time: DateTime<Utc>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            reminder_id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            reminder_time,
            title: format!("{} - {}", deal.business_name, deal.offer),
            deal_snapshot: deal.clone(),
            status: ReminderStatus::Pending,
            created_at,
            ttl: (created_at + REMINDER_TTL).timestamp(),
            phone_number_id: None,
        }
    }

    #[must_use]
    pub fn via(mut self, phone_number_id: &str) -> Self {
        self.phone_number_id = Some(phone_number_id.to_string());
        self
    }

    /// Pending and not in the future.
    #[must_use]
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.status == ReminderStatus::Pending && self.reminder_time <= now
    }

    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now.timestamp() >= self.ttl
    }

    /// Token the delivery sink uses to drop duplicate deliveries.
    #[must_use]
    pub fn idempotency_token(&self) -> String {
        self.reminder_id.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deals::Category;

    #[test]
    fn status_transitions_are_monotonic() {
        use ReminderStatus::{Cancelled, Failed, Pending, Sent};
        assert!(Pending.can_transition_to(Sent));
        assert!(Pending.can_transition_to(Cancelled));
        assert!(Pending.can_transition_to(Failed));
        assert!(!Failed.can_transition_to(Pending));
        assert_eq!("failed".parse::<ReminderStatus>().unwrap(), Failed);
        assert!(!Sent.can_transition_to(Pending));
        assert!(!Sent.can_transition_to(Cancelled));
        assert!(!Cancelled.can_transition_to(Sent));
        assert!(Sent.transition(Pending).is_err());
    }

    #[test]
    fn ttl_is_48_hours_after_creation() {
        let now = Utc::now();
        let deal = Deal::new("test", Category::Food, "Kopi Corner", "1-for-1", "530349", now);
        let reminder = Reminder::new("6591234567", &deal, now + Duration::hours(1), now);
        assert_eq!(reminder.ttl, (now + Duration::hours(48)).timestamp());
        assert_eq!(reminder.status, ReminderStatus::Pending);
        assert_eq!(reminder.title, "Kopi Corner - 1-for-1");
        assert!(!reminder.is_due(now));
        assert!(reminder.is_due(now + Duration::hours(1)));
        assert!(reminder.phone_number_id.is_none());
        assert_eq!(reminder.via("pnid-1").phone_number_id.as_deref(), Some("pnid-1"));
    }
}
