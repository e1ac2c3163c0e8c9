//! WhatsApp webhook service: signature-checked intake, the conversation
//! state machine, outbound messaging, and background reminder jobs.

pub mod api;
pub mod bots;
pub mod conversation;
pub mod error;
pub mod middleware;
pub mod outbound;
pub mod reminder_sink;
pub mod scheduler;
pub mod whatsapp;

pub use api::{build_app, AppState};
pub use bots::{
    BotConfigSource, BotRegistry, BotRuntime, DefaultRuntimeBuilder, PgBotConfigSource,
    RuntimeBuilder,
};
pub use conversation::Conversation;
pub use error::ServerError;
pub use outbound::{Button, ListRow, MessageSink, OutboundMessage};
pub use reminder_sink::WhatsAppReminderSink;
pub use whatsapp::{WhatsAppClient, DEFAULT_GRAPH_BASE_URL};
