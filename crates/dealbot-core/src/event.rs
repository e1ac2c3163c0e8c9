//! Inbound WhatsApp Cloud API webhook payloads.
//!
//! The raw envelope is deserialized with serde, then flattened by
//! [`parse_inbound_event`] into [`IncomingMessage`] values. Button ids are
//! decoded once here into [`ButtonAction`] so nothing downstream parses
//! strings.

use serde::Deserialize;

use crate::deals::Category;

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEnvelope {
    #[serde(default)]
    pub object: String,
    #[serde(default)]
    pub entry: Vec<WebhookEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEntry {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub changes: Vec<WebhookChange>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookChange {
    #[serde(default)]
    pub field: String,
    pub value: ChangeValue,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChangeValue {
    pub metadata: Option<ChangeMetadata>,
    #[serde(default)]
    pub messages: Vec<RawMessage>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChangeMetadata {
    pub phone_number_id: String,
    pub display_phone_number: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawMessage {
    pub from: String,
    #[serde(default)]
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub text: Option<RawText>,
    pub location: Option<RawLocation>,
    pub interactive: Option<RawInteractive>,
    pub button: Option<RawButton>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawText {
    pub body: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawLocation {
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawInteractive {
    pub button_reply: Option<RawReply>,
    pub list_reply: Option<RawReply>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawReply {
    pub id: String,
    #[serde(default)]
    pub title: String,
}

/// Quick-reply template button; only the payload is used.
#[derive(Debug, Clone, Deserialize)]
pub struct RawButton {
    pub payload: String,
}

/// Reminder delays offered as buttons.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReminderDelay {
    OneHour,
    TwoHours,
    FourHours,
}

impl ReminderDelay {
    #[must_use]
    pub fn duration(self) -> chrono::Duration {
        match self {
            ReminderDelay::OneHour => chrono::Duration::hours(1),
            ReminderDelay::TwoHours => chrono::Duration::hours(2),
            ReminderDelay::FourHours => chrono::Duration::hours(4),
        }
    }

    #[must_use]
    pub fn button_id(self) -> &'static str {
        match self {
            ReminderDelay::OneHour => "reminder_1hour",
            ReminderDelay::TwoHours => "reminder_2hours",
            ReminderDelay::FourHours => "reminder_4hours",
        }
    }
}

/// Decoded interactive reply. Indices refer to the user's `last_deals`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ButtonAction {
    Directions(usize),
    SetReminder(usize),
    ShareDeal(usize),
    Reminder(ReminderDelay),
    MoreDeals,
    ShareAll,
    NewSearch,
    Category(Category),
    Unknown(String),
}

impl ButtonAction {
    /// Decode a button id such as `set_reminder_2` or `category_food`.
    #[must_use]
    pub fn parse(id: &str) -> Self {
        let id = id.trim();
        match id {
            "more_deals" => return ButtonAction::MoreDeals,
            "share_all" => return ButtonAction::ShareAll,
            "new_search" => return ButtonAction::NewSearch,
            "reminder_1hour" => return ButtonAction::Reminder(ReminderDelay::OneHour),
            "reminder_2hours" => return ButtonAction::Reminder(ReminderDelay::TwoHours),
            "reminder_4hours" => return ButtonAction::Reminder(ReminderDelay::FourHours),
            _ => {}
        }

        if let Some(name) = id.strip_prefix("category_") {
            return name
                .parse::<Category>()
                .map_or_else(|_| ButtonAction::Unknown(id.to_string()), ButtonAction::Category);
        }

        let indexed: [(&str, fn(usize) -> ButtonAction); 3] = [
            ("get_directions_", ButtonAction::Directions),
            ("set_reminder_", ButtonAction::SetReminder),
            ("share_deal_", ButtonAction::ShareDeal),
        ];
        for (prefix, build) in indexed {
            if let Some(rest) = id.strip_prefix(prefix) {
                return rest
                    .parse::<usize>()
                    .map_or_else(|_| ButtonAction::Unknown(id.to_string()), build);
            }
        }

        ButtonAction::Unknown(id.to_string())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum MessageContent {
    Text(String),
    Location { latitude: f64, longitude: f64 },
    Button(ButtonAction),
    /// Media, stickers, reactions and other types the bot does not handle.
    Unsupported(String),
}

/// One user message addressed to one bot number.
#[derive(Debug, Clone, PartialEq)]
pub struct IncomingMessage {
    /// Which bot (and therefore which `BotConfig`) the message was sent to.
    pub phone_number_id: String,
    pub message_id: String,
    /// Sender's WhatsApp number; the user id.
    pub sender: String,
    pub content: MessageContent,
}

/// Flatten a webhook envelope into user messages.
///
/// Status callbacks (delivered/read receipts) carry no messages and yield
/// nothing. Changes without metadata are skipped since they cannot be routed
/// to a bot.
#[must_use]
pub fn parse_inbound_event(envelope: &WebhookEnvelope) -> Vec<IncomingMessage> {
    let mut out = Vec::new();
    for entry in &envelope.entry {
        for change in &entry.changes {
            let Some(metadata) = &change.value.metadata else {
                continue;
            };
            for raw in &change.value.messages {
                out.push(IncomingMessage {
                    phone_number_id: metadata.phone_number_id.clone(),
                    message_id: raw.id.clone(),
                    sender: raw.from.clone(),
                    content: message_content(raw),
                });
            }
        }
    }
    out
}

fn message_content(raw: &RawMessage) -> MessageContent {
    match raw.kind.as_str() {
        "text" => raw.text.as_ref().map_or_else(
            || MessageContent::Unsupported(raw.kind.clone()),
            |t| MessageContent::Text(t.body.trim().to_string()),
        ),
        "location" => raw.location.as_ref().map_or_else(
            || MessageContent::Unsupported(raw.kind.clone()),
            |l| MessageContent::Location {
                latitude: l.latitude,
                longitude: l.longitude,
            },
        ),
        "interactive" => raw
            .interactive
            .as_ref()
            .and_then(|i| i.button_reply.as_ref().or(i.list_reply.as_ref()))
            .map_or_else(
                || MessageContent::Unsupported(raw.kind.clone()),
                |reply| MessageContent::Button(ButtonAction::parse(&reply.id)),
            ),
        "button" => raw.button.as_ref().map_or_else(
            || MessageContent::Unsupported(raw.kind.clone()),
            |b| MessageContent::Button(ButtonAction::parse(&b.payload)),
        ),
        other => MessageContent::Unsupported(other.to_string()),
    }
}
