use std::time::Duration;

use dealbot_core::{CallError, Classify, CoreError, ErrorKind};
use dealbot_db::DbError;
use dealbot_geo::GeoError;
use thiserror::Error;

/// Errors from the OpenAI-compatible chat client.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// HTTP 400 naming a request field the model does not accept.
    #[error("{provider} rejected a request parameter: {message}")]
    UnsupportedParameter {
        provider: &'static str,
        message: String,
    },

    #[error("{provider} rate limited (HTTP {status})")]
    RateLimited { provider: &'static str, status: u16 },

    #[error("{provider} API error (HTTP {status}): {message}")]
    Api {
        provider: &'static str,
        status: u16,
        message: String,
    },

    #[error("JSON deserialization error for {context}: {source}")]
    Deserialize {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("{provider} returned no choices")]
    EmptyResponse { provider: &'static str },

    #[error("invalid base URL '{url}': {reason}")]
    InvalidBaseUrl { url: String, reason: String },
}

impl Classify for LlmError {
    fn kind(&self) -> ErrorKind {
        match self {
            LlmError::Http(e) => http_kind(e),
            LlmError::RateLimited { .. } => ErrorKind::Transient,
            LlmError::Api { status, .. } if *status >= 500 => ErrorKind::Transient,
            LlmError::UnsupportedParameter { .. }
            | LlmError::Api { .. }
            | LlmError::Deserialize { .. }
            | LlmError::EmptyResponse { .. }
            | LlmError::InvalidBaseUrl { .. } => ErrorKind::Internal,
        }
    }
}

/// Errors surfaced by the deal store, the searchers and the pipeline.
#[derive(Debug, Error)]
pub enum DealError {
    #[error(transparent)]
    Db(#[from] DbError),

    #[error(transparent)]
    Geo(#[from] GeoError),

    #[error(transparent)]
    Llm(#[from] LlmError),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{provider} API error (HTTP {status}): {message}")]
    Api {
        provider: &'static str,
        status: u16,
        message: String,
    },

    #[error("JSON deserialization error for {context}: {source}")]
    Deserialize {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid base URL '{url}': {reason}")]
    InvalidBaseUrl { url: String, reason: String },

    /// A model reply that does not follow the requested output format.
    #[error("{provider} reply is malformed: {reason}")]
    MalformedReply {
        provider: &'static str,
        reason: &'static str,
    },

    #[error("{label} timed out after {timeout:?}")]
    Timeout {
        label: &'static str,
        timeout: Duration,
    },

    /// Every strategy ran and nothing matched.
    #[error("no deals found")]
    NotFound,
}

impl Classify for DealError {
    fn kind(&self) -> ErrorKind {
        match self {
            DealError::Db(e) => e.kind(),
            DealError::Geo(e) => e.kind(),
            DealError::Llm(e) => e.kind(),
            DealError::Core(CoreError::InvalidCoordinates { .. }) => ErrorKind::BadInput,
            DealError::Http(e) => http_kind(e),
            DealError::Api { status, .. } if *status == 429 || *status >= 500 => {
                ErrorKind::Transient
            }
            DealError::Timeout { .. } => ErrorKind::Transient,
            DealError::NotFound => ErrorKind::NotFound,
            DealError::Core(_)
            | DealError::Api { .. }
            | DealError::Deserialize { .. }
            | DealError::MalformedReply { .. }
            | DealError::InvalidBaseUrl { .. } => ErrorKind::Internal,
        }
    }
}

impl<E: Into<DealError>> From<CallError<E>> for DealError {
    fn from(e: CallError<E>) -> Self {
        match e {
            CallError::Timeout { label, timeout } => DealError::Timeout { label, timeout },
            CallError::Failed(inner) => inner.into(),
        }
    }
}

fn http_kind(e: &reqwest::Error) -> ErrorKind {
    let server_side = e
        .status()
        .is_some_and(|s| s.is_server_error() || s.as_u16() == 429);
    if e.is_timeout() || e.is_connect() || e.is_request() || server_side {
        ErrorKind::Transient
    } else {
        ErrorKind::Internal
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn call_timeouts_become_transient_deal_errors() {
        let err: DealError = CallError::<DealError>::Timeout {
            label: "deal_store",
            timeout: Duration::from_secs(3),
        }
        .into();
        assert!(matches!(err, DealError::Timeout { .. }));
        assert!(err.is_transient());
    }

    #[test]
    fn geo_kinds_pass_through() {
        let err = DealError::from(GeoError::OutOfRegion {
            country: "MY".to_string(),
        });
        assert_eq!(err.kind(), ErrorKind::OutOfRegion);
        assert_eq!(DealError::NotFound.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn unsupported_parameter_is_not_retried() {
        let err = LlmError::UnsupportedParameter {
            provider: "openai",
            message: "Unsupported parameter: 'max_tokens'".to_string(),
        };
        assert!(!err.is_transient());
        assert!(LlmError::RateLimited {
            provider: "openai",
            status: 429
        }
        .is_transient());
    }
}
