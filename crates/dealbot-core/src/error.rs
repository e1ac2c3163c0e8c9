use thiserror::Error;

/// Failure classes shared by every adapter.
///
/// The call policy retries only [`ErrorKind::Transient`]; the conversation
/// layer maps the remaining kinds onto user-visible replies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Network failure, throttling, or timeout. Retried with backoff.
    Transient,
    /// Malformed coordinates or unparseable input. Answered with a clarification prompt.
    BadInput,
    /// The location resolves outside the served region. Terminal.
    OutOfRegion,
    /// Nothing matched after every strategy ran.
    NotFound,
    /// Invariant violation. Logged; the user sees a generic failure.
    Internal,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::Transient => write!(f, "transient"),
            ErrorKind::BadInput => write!(f, "bad_input"),
            ErrorKind::OutOfRegion => write!(f, "out_of_region"),
            ErrorKind::NotFound => write!(f, "not_found"),
            ErrorKind::Internal => write!(f, "internal"),
        }
    }
}

/// Implemented by every adapter error so the call policy can decide whether
/// an attempt is worth repeating.
pub trait Classify {
    fn kind(&self) -> ErrorKind;

    fn is_transient(&self) -> bool {
        self.kind() == ErrorKind::Transient
    }
}

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid category: {0}")]
    InvalidCategory(String),

    #[error("invalid coordinates ({latitude}, {longitude})")]
    InvalidCoordinates { latitude: f64, longitude: f64 },

    #[error("invalid reminder status transition {from} -> {to}")]
    InvalidTransition { from: String, to: String },

    #[error("resolved location violates invariant: {0}")]
    InvalidLocation(String),

    #[error("unknown reminder status: {0}")]
    InvalidStatus(String),
}

impl Classify for CoreError {
    fn kind(&self) -> ErrorKind {
        match self {
            CoreError::InvalidCategory(_) | CoreError::InvalidCoordinates { .. } => {
                ErrorKind::BadInput
            }
            CoreError::InvalidTransition { .. }
            | CoreError::InvalidLocation(_)
            | CoreError::InvalidStatus(_) => ErrorKind::Internal,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },
}
