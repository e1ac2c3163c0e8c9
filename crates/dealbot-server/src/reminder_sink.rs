//! Delivers due reminders as WhatsApp text messages.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dealbot_core::{Classify, Clock, Reminder, SystemClock, REMINDER_TTL};
use dealbot_reminders::{ReminderError, ReminderSink};

use crate::bots::BotRegistry;
use crate::outbound;

pub struct WhatsAppReminderSink {
    bots: Arc<BotRegistry>,
    clock: Arc<dyn Clock>,
    /// Idempotency tokens already delivered, with their delivery time.
    delivered: Mutex<HashMap<String, DateTime<Utc>>>,
}

impl WhatsAppReminderSink {
    #[must_use]
    pub fn new(bots: Arc<BotRegistry>) -> Self {
        Self {
            bots,
            clock: Arc::new(SystemClock),
            delivered: Mutex::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Tokens outlive their reminder rows by at most one TTL.
    fn already_delivered(&self, token: &str, now: DateTime<Utc>) -> bool {
        let mut delivered = self.delivered.lock().unwrap_or_else(PoisonError::into_inner);
        delivered.retain(|_, at| now - *at < REMINDER_TTL);
        delivered.contains_key(token)
    }

    fn mark_delivered(&self, token: &str, now: DateTime<Utc>) {
        self.delivered
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(token.to_string(), now);
    }
}

#[async_trait]
impl ReminderSink for WhatsAppReminderSink {
    async fn deliver(&self, reminder: &Reminder, idempotency_token: &str) -> Result<(), ReminderError> {
        let now = self.clock.now();
        if self.already_delivered(idempotency_token, now) {
            tracing::debug!(reminder_id = %reminder.reminder_id, "duplicate reminder delivery dropped");
            return Ok(());
        }

        let bot = self
            .bots
            .route(&reminder.user_id, reminder.phone_number_id.as_deref())
            .await
            .map_err(|e| ReminderError::Delivery {
                message: e.to_string(),
                transient: e.is_transient(),
            })?
            .ok_or_else(|| ReminderError::Delivery {
                message: format!("no bot can reach user {}", reminder.user_id),
                transient: false,
            })?;

        bot.messenger
            .send(&reminder.user_id, &outbound::reminder_due(reminder))
            .await
            .map_err(|e| ReminderError::Delivery {
                message: e.to_string(),
                transient: e.is_transient(),
            })?;

        self.mark_delivered(idempotency_token, now);
        tracing::info!(
            reminder_id = %reminder.reminder_id,
            user_id = %reminder.user_id,
            "reminder delivered"
        );
        Ok(())
    }
}
