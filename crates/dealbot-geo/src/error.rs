use dealbot_core::{Classify, ErrorKind};
use thiserror::Error;

/// Errors returned by the geocoder, places client, postal index and resolver.
#[derive(Debug, Error)]
pub enum GeoError {
    /// Network or TLS failure from the underlying HTTP client.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The provider reported a quota or rate limit.
    #[error("{provider} rate limited: {status}")]
    RateLimited {
        provider: &'static str,
        status: String,
    },

    /// The provider answered with an error status.
    #[error("{provider} API error {status}: {message}")]
    Api {
        provider: &'static str,
        status: String,
        message: String,
    },

    /// The response body could not be deserialized into the expected type.
    #[error("JSON deserialization error for {context}: {source}")]
    Deserialize {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid base URL '{url}': {reason}")]
    InvalidBaseUrl { url: String, reason: String },

    #[error("coordinates ({latitude}, {longitude}) are out of range")]
    InvalidCoordinates { latitude: f64, longitude: f64 },

    /// The coordinates resolve outside Singapore.
    #[error("location is outside the service region (country: {country})")]
    OutOfRegion { country: String },

    /// The postal index is empty, so no nearest record exists.
    #[error("no postal record near ({latitude}, {longitude})")]
    NoMatch { latitude: f64, longitude: f64 },

    #[error("postal CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Db(#[from] dealbot_db::DbError),
}

impl Classify for GeoError {
    fn kind(&self) -> ErrorKind {
        match self {
            GeoError::Http(e) => {
                let server_side = e
                    .status()
                    .is_some_and(|s| s.is_server_error() || s.as_u16() == 429);
                if e.is_timeout() || e.is_connect() || e.is_request() || server_side {
                    ErrorKind::Transient
                } else {
                    ErrorKind::Internal
                }
            }
            GeoError::RateLimited { .. } => ErrorKind::Transient,
            GeoError::InvalidCoordinates { .. } => ErrorKind::BadInput,
            GeoError::OutOfRegion { .. } => ErrorKind::OutOfRegion,
            GeoError::NoMatch { .. } => ErrorKind::NotFound,
            GeoError::Db(e) => e.kind(),
            GeoError::Api { .. }
            | GeoError::Deserialize { .. }
            | GeoError::InvalidBaseUrl { .. }
            | GeoError::Csv(_) => ErrorKind::Internal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_region_and_quota() {
        let out = GeoError::OutOfRegion {
            country: "MY".to_string(),
        };
        assert_eq!(out.kind(), ErrorKind::OutOfRegion);
        assert!(!out.is_transient());

        let quota = GeoError::RateLimited {
            provider: "google_geocode",
            status: "OVER_QUERY_LIMIT".to_string(),
        };
        assert!(quota.is_transient());

        let denied = GeoError::Api {
            provider: "google_geocode",
            status: "REQUEST_DENIED".to_string(),
            message: "bad key".to_string(),
        };
        assert_eq!(denied.kind(), ErrorKind::Internal);
    }
}
