use async_trait::async_trait;
use dealbot_core::Reminder;

use crate::error::ReminderError;

/// Emits a due reminder to its user.
///
/// Delivery is at-least-once: a reminder whose status update fails after a
/// successful emit is offered again on the next sweep with the same
/// `idempotency_token`, which the sink may use to drop the duplicate.
#[async_trait]
pub trait ReminderSink: Send + Sync {
    async fn deliver(&self, reminder: &Reminder, idempotency_token: &str) -> Result<(), ReminderError>;
}
