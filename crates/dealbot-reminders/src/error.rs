use dealbot_core::{Classify, CoreError, ErrorKind};
use dealbot_db::DbError;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum ReminderError {
    /// The requested time is outside `(now, now + 24h]`.
    #[error("reminder rejected: {reason}")]
    Rejected { reason: String },

    /// The user's text is not a recognised time expression.
    #[error("could not understand reminder time {input:?}")]
    Unparseable { input: String },

    #[error("reminder {0} not found")]
    NotFound(Uuid),

    /// The delivery sink could not emit the reminder.
    #[error("reminder delivery failed: {message}")]
    Delivery { message: String, transient: bool },

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Db(#[from] DbError),
}

impl Classify for ReminderError {
    fn kind(&self) -> ErrorKind {
        match self {
            ReminderError::Rejected { .. } | ReminderError::Unparseable { .. } => {
                ErrorKind::BadInput
            }
            ReminderError::NotFound(_) => ErrorKind::NotFound,
            ReminderError::Delivery { transient: true, .. } => ErrorKind::Transient,
            ReminderError::Db(e) => e.kind(),
            ReminderError::Delivery { .. } | ReminderError::Core(_) => ErrorKind::Internal,
        }
    }
}
