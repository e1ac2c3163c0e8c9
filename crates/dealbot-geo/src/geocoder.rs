//! Reverse geocoding through the Google Geocoding API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::Deserialize;

use crate::error::GeoError;

const DEFAULT_BASE_URL: &str = "https://maps.googleapis.com/";
const PROVIDER: &str = "google_geocode";

/// What the resolver needs from a reverse geocoder.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct GeocodeResult {
    /// ISO 3166-1 alpha-2 country code, upper-case.
    pub country_code: Option<String>,
    pub postal_code: Option<String>,
    pub formatted_address: String,
    pub road_name: Option<String>,
    /// Neighbourhood or sub-locality, e.g. "Hougang".
    pub area: Option<String>,
}

#[async_trait]
pub trait ReverseGeocoder: Send + Sync {
    /// `Ok(None)` when the provider has no address for the point.
    async fn reverse(&self, latitude: f64, longitude: f64)
        -> Result<Option<GeocodeResult>, GeoError>;
}

#[derive(Debug, Deserialize)]
struct GeocodeResponse {
    status: String,
    #[serde(default)]
    results: Vec<GeocodeEntry>,
    #[serde(default)]
    error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeocodeEntry {
    #[serde(default)]
    formatted_address: String,
    #[serde(default)]
    address_components: Vec<AddressComponent>,
}

#[derive(Debug, Deserialize)]
struct AddressComponent {
    long_name: String,
    short_name: String,
    #[serde(default)]
    types: Vec<String>,
}

impl AddressComponent {
    fn has_type(&self, t: &str) -> bool {
        self.types.iter().any(|x| x == t)
    }
}

/// Client for the Google Geocoding API.
///
/// Use [`GoogleGeocoder::new`] for production or
/// [`GoogleGeocoder::with_base_url`] to point at a mock server in tests.
pub struct GoogleGeocoder {
    client: Client,
    api_key: String,
    base_url: Url,
}

impl GoogleGeocoder {
    /// # Errors
    ///
    /// Returns [`GeoError::Http`] if the `reqwest::Client` cannot be built.
    pub fn new(api_key: &str, timeout: Duration) -> Result<Self, GeoError> {
        Self::with_base_url(api_key, timeout, DEFAULT_BASE_URL)
    }

    /// # Errors
    ///
    /// Returns [`GeoError::Http`] if the `reqwest::Client` cannot be built, or
    /// [`GeoError::InvalidBaseUrl`] if `base_url` does not parse.
    pub fn with_base_url(api_key: &str, timeout: Duration, base_url: &str) -> Result<Self, GeoError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent("dealbot/0.1")
            .build()?;
        Ok(Self {
            client,
            api_key: api_key.to_owned(),
            base_url: normalise_base_url(base_url)?,
        })
    }

    fn build_url(&self, latitude: f64, longitude: f64) -> Result<Url, GeoError> {
        let mut url = self
            .base_url
            .join("maps/api/geocode/json")
            .map_err(|e| GeoError::InvalidBaseUrl {
                url: self.base_url.to_string(),
                reason: e.to_string(),
            })?;
        url.query_pairs_mut()
            .append_pair("latlng", &format!("{latitude},{longitude}"))
            .append_pair("key", &self.api_key);
        Ok(url)
    }
}

#[async_trait]
impl ReverseGeocoder for GoogleGeocoder {
    async fn reverse(
        &self,
        latitude: f64,
        longitude: f64,
    ) -> Result<Option<GeocodeResult>, GeoError> {
        let url = self.build_url(latitude, longitude)?;
        let body = self
            .client
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        let response: GeocodeResponse =
            serde_json::from_str(&body).map_err(|e| GeoError::Deserialize {
                context: "geocode/json".to_string(),
                source: e,
            })?;

        match response.status.as_str() {
            "OK" => Ok(Some(summarise(&response.results))),
            "ZERO_RESULTS" => Ok(None),
            "OVER_QUERY_LIMIT" | "OVER_DAILY_LIMIT" | "UNKNOWN_ERROR" => {
                Err(GeoError::RateLimited {
                    provider: PROVIDER,
                    status: response.status,
                })
            }
            _ => Err(GeoError::Api {
                provider: PROVIDER,
                status: response.status,
                message: response.error_message.unwrap_or_default(),
            }),
        }
    }
}

/// Collapse the result list into one [`GeocodeResult`].
///
/// The first result supplies the formatted address; each component is taken
/// from the first result that carries it, since Google often puts the
/// postal code on a less specific entry.
fn summarise(results: &[GeocodeEntry]) -> GeocodeResult {
    let find = |wanted: &[&str], short: bool| -> Option<String> {
        results.iter().find_map(|entry| {
            entry
                .address_components
                .iter()
                .find(|c| wanted.iter().any(|t| c.has_type(t)))
                .map(|c| {
                    if short {
                        c.short_name.clone()
                    } else {
                        c.long_name.clone()
                    }
                })
        })
    };

    GeocodeResult {
        country_code: find(&["country"], true).map(|c| c.to_uppercase()),
        postal_code: find(&["postal_code"], false),
        formatted_address: results
            .first()
            .map(|r| r.formatted_address.clone())
            .unwrap_or_default(),
        road_name: find(&["route"], false),
        area: find(&["neighborhood", "sublocality_level_1", "sublocality"], false),
    }
}

pub(crate) fn normalise_base_url(base_url: &str) -> Result<Url, GeoError> {
    // Exactly one trailing slash so `join` appends rather than replaces.
    let normalised = format!("{}/", base_url.trim_end_matches('/'));
    Url::parse(&normalised).map_err(|e| GeoError::InvalidBaseUrl {
        url: base_url.to_string(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_url_includes_latlng_and_key() {
        let geocoder =
            GoogleGeocoder::with_base_url("k", Duration::from_secs(5), "https://maps.example.com")
                .unwrap();
        let url = geocoder.build_url(1.35, 103.8).unwrap();
        assert_eq!(
            url.as_str(),
            "https://maps.example.com/maps/api/geocode/json?latlng=1.35%2C103.8&key=k"
        );
    }

    #[test]
    fn summarise_picks_components_across_results() {
        let body = serde_json::json!([
            {
                "formatted_address": "349 Hougang Ave 7, Singapore",
                "address_components": [
                    { "long_name": "Hougang Avenue 7", "short_name": "Hougang Ave 7", "types": ["route"] },
                    { "long_name": "Hougang", "short_name": "Hougang", "types": ["neighborhood", "political"] },
                    { "long_name": "Singapore", "short_name": "sg", "types": ["country", "political"] }
                ]
            },
            {
                "formatted_address": "Singapore 530349",
                "address_components": [
                    { "long_name": "530349", "short_name": "530349", "types": ["postal_code"] }
                ]
            }
        ]);
        let entries: Vec<GeocodeEntry> = serde_json::from_value(body).unwrap();
        let result = summarise(&entries);
        assert_eq!(result.country_code.as_deref(), Some("SG"));
        assert_eq!(result.postal_code.as_deref(), Some("530349"));
        assert_eq!(result.road_name.as_deref(), Some("Hougang Avenue 7"));
        assert_eq!(result.area.as_deref(), Some("Hougang"));
        assert_eq!(result.formatted_address, "349 Hougang Ave 7, Singapore");
    }
}
