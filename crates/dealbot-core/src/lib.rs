//! Shared domain model for the deal bot.
//!
//! Holds the types every other crate agrees on (deals, resolved locations,
//! reminders, sessions, bot configuration, inbound events), the error
//! taxonomy, the call policy wrapper used at every external call site, and
//! application configuration loading.

pub mod app_config;
pub mod bot_config;
pub mod clock;
pub mod config;
pub mod deals;
pub mod error;
pub mod event;
pub mod geo;
pub mod location;
pub mod reminder;
pub mod retry;
pub mod session;

pub use app_config::{AppConfig, Environment};
pub use bot_config::{BotConfig, BotType};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{build_app_config, load_app_config, load_app_config_from_env};
pub use deals::{Category, Deal, DealKey, DealQueryKey, ExclusionSet, SpatialKey};
pub use error::{Classify, ConfigError, CoreError, ErrorKind};
pub use event::{
    parse_inbound_event, ButtonAction, IncomingMessage, MessageContent, ReminderDelay,
    WebhookEnvelope,
};
pub use geo::{haversine_km, valid_coordinates, within_radius_km, EARTH_RADIUS_KM};
pub use location::{
    pad_postal, strip_postal, LocationSource, LocationWarning, PostalRecord, ResolvedLocation,
};
pub use reminder::{Reminder, ReminderStatus, MAX_REMINDER_LEAD, REMINDER_TTL};
pub use retry::{CallError, CallPolicy};
pub use session::{ConversationStep, UserSession};

/// Timezone every user-facing time is presented in (Asia/Singapore, UTC+8, no DST).
#[must_use]
pub fn local_offset() -> chrono::FixedOffset {
    chrono::FixedOffset::east_opt(8 * 3600).expect("UTC+8 is a valid offset")
}
