//! The chat state machine.
//!
//! `Start → AwaitingLocation → AwaitingCategory → ShowingDeals →
//! AwaitingReminderTime`, driven by text, shared locations, and button
//! replies. Each event runs while holding the sender's session guard, so
//! events from one user are handled one at a time.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dealbot_core::{
    ButtonAction, Category, Classify, Clock, ConversationStep, ErrorKind, ExclusionSet,
    IncomingMessage, MessageContent, SystemClock, UserSession,
};
use dealbot_reminders::ReminderScheduler;

use crate::bots::BotRuntime;
use crate::outbound::{self, OutboundMessage};

const GREETINGS: &[&str] = &["hi", "hello", "hey", "start", "menu", "restart"];

pub struct Conversation {
    reminders: Arc<ReminderScheduler>,
    clock: Arc<dyn Clock>,
    deals_per_page: usize,
}

impl Conversation {
    #[must_use]
    pub fn new(reminders: Arc<ReminderScheduler>, deals_per_page: usize) -> Self {
        Self {
            reminders,
            clock: Arc::new(SystemClock),
            deals_per_page,
        }
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Handle one inbound message and return the replies to send, in order.
    /// The session snapshot is persisted before returning.
    pub async fn handle(&self, bot: &BotRuntime, message: &IncomingMessage) -> Vec<OutboundMessage> {
        let sessions = bot.pipeline.sessions();
        let mut session = sessions.lock(&message.sender, self.clock.now()).await;

        let replies = match &message.content {
            MessageContent::Text(text) => self.on_text(bot, &mut session, text).await,
            MessageContent::Location {
                latitude,
                longitude,
            } => self.on_location(bot, &mut session, *latitude, *longitude).await,
            MessageContent::Button(action) => self.on_button(bot, &mut session, action).await,
            MessageContent::Unsupported(kind) => {
                tracing::debug!(user_id = %message.sender, kind, "unsupported message type");
                vec![help()]
            }
        };

        session.touch(self.clock.now());
        if let Err(e) = sessions.persist(&session).await {
            tracing::warn!(user_id = %message.sender, error = %e, "failed to persist session");
        }
        replies
    }

    async fn on_text(
        &self,
        bot: &BotRuntime,
        session: &mut UserSession,
        text: &str,
    ) -> Vec<OutboundMessage> {
        let text = text.trim();
        if GREETINGS.iter().any(|g| text.eq_ignore_ascii_case(g)) {
            session.reset(self.clock.now());
            return vec![outbound::welcome()];
        }

        match session.step {
            ConversationStep::Start => {
                session.step = ConversationStep::AwaitingLocation;
                vec![outbound::welcome()]
            }
            ConversationStep::AwaitingLocation => vec![outbound::ask_location()],
            ConversationStep::AwaitingCategory => match text.parse::<Category>() {
                Ok(category) => {
                    self.search(bot, session, category, &ExclusionSet::new())
                        .await
                }
                Err(_) => vec![category_prompt(session)],
            },
            ConversationStep::ShowingDeals => {
                vec![outbound::follow_up_menu("What would you like to do next?")]
            }
            ConversationStep::AwaitingReminderTime { index } => match self.reminders.parse(text) {
                Ok(at) => self.schedule_reminder(bot, session, index, at).await,
                Err(e) => {
                    tracing::debug!(user_id = %session.user_id, error = %e, "reminder time not accepted");
                    vec![OutboundMessage::text(format!(
                        "Sorry, {e}. Try \"in 2 hours\", \"in 30 minutes\" or \"at 8 pm\" (within 24 hours)."
                    ))]
                }
            },
        }
    }

    async fn on_location(
        &self,
        bot: &BotRuntime,
        session: &mut UserSession,
        latitude: f64,
        longitude: f64,
    ) -> Vec<OutboundMessage> {
        match bot.pipeline.resolver().resolve(latitude, longitude).await {
            Ok(location) => {
                tracing::info!(
                    user_id = %session.user_id,
                    postal = %location.postal_code,
                    source = location.source.as_str(),
                    "location resolved"
                );
                session.resolved_location = Some(location);
                session.category = None;
                session.last_deals.clear();
                session.step = ConversationStep::AwaitingCategory;
                vec![category_prompt(session)]
            }
            Err(e) => {
                let kind = e.kind();
                if matches!(kind, ErrorKind::Transient | ErrorKind::Internal) {
                    tracing::error!(user_id = %session.user_id, error = %e, "location resolution failed");
                } else {
                    tracing::info!(user_id = %session.user_id, error = %e, "location rejected");
                }
                session.step = ConversationStep::AwaitingLocation;
                vec![error_reply(kind)]
            }
        }
    }

    async fn on_button(
        &self,
        bot: &BotRuntime,
        session: &mut UserSession,
        action: &ButtonAction,
    ) -> Vec<OutboundMessage> {
        match action {
            ButtonAction::Category(category) => {
                self.search(bot, session, *category, &ExclusionSet::new())
                    .await
            }
            ButtonAction::MoreDeals => match session.category {
                Some(category) => {
                    let shown = ExclusionSet::from_deals(&session.last_deals);
                    self.search(bot, session, category, &shown).await
                }
                None => vec![outbound::ask_location()],
            },
            ButtonAction::Directions(i) => match session.deal_at(*i) {
                Some(deal) => vec![outbound::directions(deal)],
                None => vec![stale_button()],
            },
            ButtonAction::ShareDeal(i) => match session.deal_at(*i) {
                Some(deal) => vec![outbound::share_text(std::slice::from_ref(deal))],
                None => vec![stale_button()],
            },
            ButtonAction::ShareAll => {
                if session.last_deals.is_empty() {
                    vec![outbound::ask_location()]
                } else {
                    vec![outbound::share_text(&session.last_deals)]
                }
            }
            ButtonAction::SetReminder(i) => match session.deal_at(*i) {
                Some(deal) => {
                    let prompt = outbound::reminder_options(deal);
                    session.step = ConversationStep::AwaitingReminderTime { index: *i };
                    vec![prompt]
                }
                None => vec![stale_button()],
            },
            ButtonAction::Reminder(delay) => match session.step {
                ConversationStep::AwaitingReminderTime { index } => {
                    let at = self.reminders.now() + delay.duration();
                    self.schedule_reminder(bot, session, index, at).await
                }
                _ => vec![OutboundMessage::text(
                    "Tap \"Remind me\" on a deal first, then pick a time.",
                )],
            },
            ButtonAction::NewSearch => {
                session.reset(self.clock.now());
                vec![outbound::ask_location()]
            }
            ButtonAction::Unknown(id) => {
                tracing::debug!(user_id = %session.user_id, button = %id, "unknown button id");
                vec![help()]
            }
        }
    }

    async fn search(
        &self,
        bot: &BotRuntime,
        session: &mut UserSession,
        category: Category,
        exclude: &ExclusionSet,
    ) -> Vec<OutboundMessage> {
        let Some(location) = session.resolved_location.clone() else {
            session.step = ConversationStep::AwaitingLocation;
            return vec![outbound::ask_location()];
        };

        match bot
            .pipeline
            .get_deals_locked(session, &location, category, exclude, self.deals_per_page)
            .await
        {
            Ok(deals) => outbound::deal_list(&deals),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                session.category = Some(category);
                session.step = ConversationStep::ShowingDeals;
                if exclude.is_empty() {
                    vec![outbound::no_deals()]
                } else {
                    vec![outbound::follow_up_menu(
                        "That's everything I found for now.",
                    )]
                }
            }
            Err(e) => {
                tracing::error!(user_id = %session.user_id, category = %category, error = %e, "deal search failed");
                vec![error_reply(e.kind())]
            }
        }
    }

    async fn schedule_reminder(
        &self,
        bot: &BotRuntime,
        session: &mut UserSession,
        index: usize,
        at: DateTime<Utc>,
    ) -> Vec<OutboundMessage> {
        let Some(deal) = session.deal_at(index).cloned() else {
            session.step = ConversationStep::ShowingDeals;
            return vec![stale_button()];
        };

        match self
            .reminders
            .schedule_via(&bot.config.whatsapp_phone_number_id, &session.user_id, &deal, at)
            .await
        {
            Ok(_) => {
                session.step = ConversationStep::ShowingDeals;
                vec![outbound::reminder_set(&deal, at)]
            }
            Err(e) if e.kind() == ErrorKind::BadInput => vec![OutboundMessage::text(format!(
                "Sorry, {e}. Pick a time within the next 24 hours."
            ))],
            Err(e) => {
                tracing::error!(user_id = %session.user_id, error = %e, "failed to schedule reminder");
                session.step = ConversationStep::ShowingDeals;
                vec![error_reply(e.kind())]
            }
        }
    }
}

fn category_prompt(session: &UserSession) -> OutboundMessage {
    let area = session
        .resolved_location
        .as_ref()
        .map_or("you", |l| l.display_name.as_str());
    outbound::category_menu(area)
}

fn help() -> OutboundMessage {
    OutboundMessage::text("Say \"hi\" to start, or share your location to find deals nearby.")
}

fn stale_button() -> OutboundMessage {
    OutboundMessage::buttons(
        "That deal is no longer in your list. Start a new search?",
        vec![outbound::Button::new("new_search", "New search")],
    )
}

/// User-facing reply for a failure class.
#[must_use]
pub fn error_reply(kind: ErrorKind) -> OutboundMessage {
    match kind {
        ErrorKind::BadInput => OutboundMessage::text(
            "I couldn't read that location. Please share it again with the attachment button.",
        ),
        ErrorKind::OutOfRegion => {
            OutboundMessage::text("Sorry, I only cover deals in Singapore for now.")
        }
        ErrorKind::NotFound => outbound::no_deals(),
        ErrorKind::Transient | ErrorKind::Internal => OutboundMessage::text(
            "Something went wrong on my side. Please try again in a moment.",
        ),
    }
}
