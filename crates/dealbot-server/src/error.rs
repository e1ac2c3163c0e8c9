use dealbot_core::{Classify, ErrorKind};
use dealbot_db::DbError;
use dealbot_deals::DealError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The Graph API rejected an outbound message.
    #[error("WhatsApp API error {status}: {message}")]
    WhatsApp { status: u16, message: String },

    #[error("invalid base URL '{url}': {reason}")]
    InvalidBaseUrl { url: String, reason: String },

    #[error(transparent)]
    Deal(#[from] DealError),

    #[error(transparent)]
    Db(#[from] DbError),
}

impl Classify for ServerError {
    fn kind(&self) -> ErrorKind {
        match self {
            ServerError::Http(e) => {
                if e.is_timeout() || e.is_connect() || e.is_request() {
                    ErrorKind::Transient
                } else {
                    ErrorKind::Internal
                }
            }
            ServerError::WhatsApp { status, .. } if *status == 429 || *status >= 500 => {
                ErrorKind::Transient
            }
            ServerError::Deal(e) => e.kind(),
            ServerError::Db(e) => e.kind(),
            ServerError::WhatsApp { .. } | ServerError::InvalidBaseUrl { .. } => {
                ErrorKind::Internal
            }
        }
    }
}
