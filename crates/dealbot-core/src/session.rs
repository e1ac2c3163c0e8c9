use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::deals::{Category, Deal};
use crate::location::ResolvedLocation;

/// Where the user is in the conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationStep {
    #[default]
    Start,
    AwaitingLocation,
    AwaitingCategory,
    ShowingDeals,
    /// Waiting for a reminder delay for `lastDeals[index]`.
    AwaitingReminderTime { index: usize },
}

/// Per-user state. `last_deals` is what `<action>_<i>` button ids index into.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserSession {
    pub user_id: String,
    pub step: ConversationStep,
    pub category: Option<Category>,
    pub resolved_location: Option<ResolvedLocation>,
    pub last_deals: Vec<Deal>,
    pub last_updated: DateTime<Utc>,
}

impl UserSession {
    #[must_use]
    pub fn new(user_id: &str, now: DateTime<Utc>) -> Self {
        Self {
            user_id: user_id.to_string(),
            step: ConversationStep::Start,
            category: None,
            resolved_location: None,
            last_deals: Vec::new(),
            last_updated: now,
        }
    }

    /// Deal behind button index `i`, if still in range.
    #[must_use]
    pub fn deal_at(&self, index: usize) -> Option<&Deal> {
        self.last_deals.get(index)
    }

    /// Replace the shown deals, keeping at most `limit`.
    pub fn set_last_deals(&mut self, mut deals: Vec<Deal>, limit: usize, now: DateTime<Utc>) {
        deals.truncate(limit);
        self.last_deals = deals;
        self.step = ConversationStep::ShowingDeals;
        self.last_updated = now;
    }

    /// Forget everything except the user id.
    pub fn reset(&mut self, now: DateTime<Utc>) {
        *self = Self::new(&self.user_id, now);
        self.step = ConversationStep::AwaitingLocation;
    }

    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.last_updated = now;
    }
}
