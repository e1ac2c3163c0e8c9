//! Independently-sourced business names near a point, used by the verifier
//! to cross-check generated deals.

use std::time::Duration;

use async_trait::async_trait;
use dealbot_core::Category;
use reqwest::{Client, Url};
use serde::Deserialize;

use crate::error::GeoError;
use crate::geocoder::normalise_base_url;

const DEFAULT_BASE_URL: &str = "https://maps.googleapis.com/";
const PROVIDER: &str = "google_places";

/// Search radius around the user, in metres.
pub const NEARBY_RADIUS_M: u32 = 1_000;

#[derive(Debug, Clone, PartialEq)]
pub struct NearbyPlace {
    pub name: String,
    pub vicinity: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

#[async_trait]
pub trait NearbyPlacesProvider: Send + Sync {
    async fn nearby(
        &self,
        latitude: f64,
        longitude: f64,
        category: Category,
    ) -> Result<Vec<NearbyPlace>, GeoError>;
}

/// Google place type searched for each category.
#[must_use]
pub fn place_type(category: Category) -> &'static str {
    match category {
        Category::Food => "restaurant",
        Category::Groceries => "supermarket",
        Category::Fashion => "clothing_store",
        Category::Events => "tourist_attraction",
    }
}

#[derive(Debug, Deserialize)]
struct NearbyResponse {
    status: String,
    #[serde(default)]
    results: Vec<PlaceEntry>,
    #[serde(default)]
    error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PlaceEntry {
    name: String,
    #[serde(default)]
    vicinity: Option<String>,
    #[serde(default)]
    geometry: Option<Geometry>,
}

#[derive(Debug, Deserialize)]
struct Geometry {
    location: LatLng,
}

#[derive(Debug, Deserialize)]
struct LatLng {
    lat: f64,
    lng: f64,
}

pub struct GooglePlacesClient {
    client: Client,
    api_key: String,
    base_url: Url,
}

impl GooglePlacesClient {
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
}

#[async_trait]
impl NearbyPlacesProvider for GooglePlacesClient {
    async fn nearby(
        &self,
        latitude: f64,
        longitude: f64,
        category: Category,
    ) -> Result<Vec<NearbyPlace>, GeoError> {
        let mut url = self
            .base_url
            .join("maps/api/place/nearbysearch/json")
            .map_err(|e| GeoError::InvalidBaseUrl {
                url: self.base_url.to_string(),
                reason: e.to_string(),
            })?;
        url.query_pairs_mut()
            .append_pair("location", &format!("{latitude},{longitude}"))
            .append_pair("radius", &NEARBY_RADIUS_M.to_string())
            .append_pair("type", place_type(category))
            .append_pair("key", &self.api_key);

        let body = self
            .client
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        let response: NearbyResponse =
            serde_json::from_str(&body).map_err(|e| GeoError::Deserialize {
                context: "place/nearbysearch/json".to_string(),
                source: e,
            })?;

        match response.status.as_str() {
            "OK" | "ZERO_RESULTS" => Ok(response
                .results
                .into_iter()
                .map(|p| NearbyPlace {
                    name: p.name,
                    vicinity: p.vicinity,
                    latitude: p.geometry.as_ref().map(|g| g.location.lat),
                    longitude: p.geometry.as_ref().map(|g| g.location.lng),
                })
                .collect()),
            "OVER_QUERY_LIMIT" | "UNKNOWN_ERROR" => Err(GeoError::RateLimited {
                provider: PROVIDER,
                status: response.status,
            }),
            _ => Err(GeoError::Api {
                provider: PROVIDER,
                status: response.status,
                message: response.error_message.unwrap_or_default(),
            }),
        }
    }
}
