//! Per-user deal reminders: scheduling, free-text time parsing, and the
//! periodic sweep that hands due reminders to a delivery sink.

pub mod error;
pub mod parse;
pub mod scheduler;
pub mod sink;
pub mod store;

pub use error::ReminderError;
pub use parse::{check_lead, parse_reminder_time};
pub use scheduler::{DispatchReport, ReminderScheduler, DEFAULT_BATCH_SIZE};
pub use sink::ReminderSink;
pub use store::{MemoryReminderStore, PgReminderStore, ReminderStore};
