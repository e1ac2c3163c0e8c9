//! Coordinates → [`ResolvedLocation`].
//!
//! Reverse geocoding supplies the country and postal code; the postal index
//! validates and enriches it. When the geocoder is unavailable, or returns
//! no postal code, the nearest postal record is used instead. Out-of-region
//! is terminal and never falls back.

use std::sync::Arc;

use dealbot_core::{
    geo::valid_coordinates, CallError, CallPolicy, Classify, ErrorKind, LocationSource,
    LocationWarning, ResolvedLocation,
};

use crate::error::GeoError;
use crate::geocoder::{GeocodeResult, ReverseGeocoder};
use crate::postal_index::PostalIndex;

/// Country served.
pub const SERVICE_COUNTRY: &str = "SG";

/// Loose bounding box around Singapore, used when no geocoder answer is
/// available to decide the country.
const SERVICE_BOUNDS: (f64, f64, f64, f64) = (1.13, 1.48, 103.59, 104.11);

#[must_use]
pub fn in_service_area(latitude: f64, longitude: f64) -> bool {
    let (min_lat, max_lat, min_lon, max_lon) = SERVICE_BOUNDS;
    (min_lat..=max_lat).contains(&latitude) && (min_lon..=max_lon).contains(&longitude)
}

pub struct GeoResolver {
    geocoder: Option<Arc<dyn ReverseGeocoder>>,
    index: Arc<PostalIndex>,
    policy: CallPolicy,
}

impl GeoResolver {
    /// `geocoder` is `None` when the store has no maps key; resolution then
    /// always uses the nearest postal record.
    #[must_use]
    pub fn new(
        geocoder: Option<Arc<dyn ReverseGeocoder>>,
        index: Arc<PostalIndex>,
        policy: CallPolicy,
    ) -> Self {
        Self {
            geocoder,
            index,
            policy,
        }
    }

    #[must_use]
    pub fn index(&self) -> &PostalIndex {
        &self.index
    }

    /// # Errors
    ///
    /// - [`GeoError::InvalidCoordinates`] for out-of-range input.
    /// - [`GeoError::OutOfRegion`] when the point is outside Singapore.
    /// - [`GeoError::NoMatch`] when fallback is needed and the index is empty.
    pub async fn resolve(&self, latitude: f64, longitude: f64) -> Result<ResolvedLocation, GeoError> {
        if !valid_coordinates(latitude, longitude) {
            return Err(GeoError::InvalidCoordinates {
                latitude,
                longitude,
            });
        }

        let Some(geocoder) = &self.geocoder else {
            return self.fallback(latitude, longitude, None);
        };

        let outcome = self
            .policy
            .run("reverse_geocode", || geocoder.reverse(latitude, longitude))
            .await;

        match outcome {
            Ok(Some(result)) => self.from_geocode(latitude, longitude, result),
            Ok(None) => {
                tracing::warn!(
                    latitude,
                    longitude,
                    "geocoder returned no address, using nearest postal record"
                );
                self.fallback(latitude, longitude, None)
            }
            Err(e) if e.kind() == ErrorKind::OutOfRegion => Err(into_geo_error(e)),
            Err(e) => {
                tracing::warn!(
                    latitude,
                    longitude,
                    error = %e,
                    "reverse geocoding unavailable, using nearest postal record"
                );
                self.fallback(latitude, longitude, None)
            }
        }
    }

    /// Nearest postal record by Haversine scan.
    ///
    /// # Errors
    ///
    /// Returns [`GeoError::NoMatch`] when the index is empty.
    pub fn nearest(&self, latitude: f64, longitude: f64) -> Result<ResolvedLocation, GeoError> {
        let record = self
            .index
            .nearest(latitude, longitude)
            .ok_or(GeoError::NoMatch {
                latitude,
                longitude,
            })?;
        Ok(ResolvedLocation::from_record(
            record,
            latitude,
            longitude,
            LocationSource::DbNearest,
            None,
            None,
        ))
    }

    fn from_geocode(
        &self,
        latitude: f64,
        longitude: f64,
        result: GeocodeResult,
    ) -> Result<ResolvedLocation, GeoError> {
        let country = result.country_code.clone().unwrap_or_default();
        if country != SERVICE_COUNTRY {
            return Err(GeoError::OutOfRegion { country });
        }

        let Some(postal) = result
            .postal_code
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
        else {
            tracing::warn!(
                latitude,
                longitude,
                "geocoder result has no postal code, using nearest postal record"
            );
            return self.fallback(latitude, longitude, Some(&result));
        };

        if let Some(record) = self.index.get(postal) {
            return Ok(ResolvedLocation::from_record(
                record,
                latitude,
                longitude,
                LocationSource::DbExact,
                result.area.clone(),
                Some(result.formatted_address.clone()),
            ));
        }

        tracing::info!(postal, "geocoded postal code not in postal index");
        ResolvedLocation {
            latitude,
            longitude,
            postal_code: dealbot_core::pad_postal(postal),
            address: result.formatted_address.clone(),
            road_name: result.road_name.clone().unwrap_or_default(),
            building: None,
            blk_no: None,
            area: result.area.clone(),
            display_name: result.formatted_address.clone(),
            formatted_address: result.formatted_address,
            source: LocationSource::GeocoderOnly,
            warning: Some(LocationWarning::PostalNotInDb),
        }
        .validate()
        .map_err(|e| {
            tracing::error!(error = %e, "resolved location invariant violated");
            GeoError::NoMatch {
                latitude,
                longitude,
            }
        })
    }

    /// Nearest-record fallback. With no record at all, a geocoder answer is
    /// still usable as a postal-less location.
    fn fallback(
        &self,
        latitude: f64,
        longitude: f64,
        geocoded: Option<&GeocodeResult>,
    ) -> Result<ResolvedLocation, GeoError> {
        if geocoded.is_none() && !in_service_area(latitude, longitude) {
            return Err(GeoError::OutOfRegion {
                country: "unknown".to_string(),
            });
        }
        match self.nearest(latitude, longitude) {
            Ok(mut location) => {
                if let Some(g) = geocoded {
                    location.area.clone_from(&g.area);
                    location.formatted_address.clone_from(&g.formatted_address);
                }
                Ok(location)
            }
            Err(no_match) => {
                let Some(g) = geocoded else {
                    return Err(no_match);
                };
                Ok(ResolvedLocation {
                    latitude,
                    longitude,
                    postal_code: String::new(),
                    address: g.formatted_address.clone(),
                    road_name: g.road_name.clone().unwrap_or_default(),
                    building: None,
                    blk_no: None,
                    area: g.area.clone(),
                    display_name: g.formatted_address.clone(),
                    formatted_address: g.formatted_address.clone(),
                    source: LocationSource::GeocoderOnly,
                    warning: Some(LocationWarning::NoPostalCode),
                })
            }
        }
    }
}

fn into_geo_error(e: CallError<GeoError>) -> GeoError {
    match e {
        CallError::Failed(inner) => inner,
        // Timeouts classify as transient and never reach here, but map them
        // to a provider error rather than panic.
        CallError::Timeout { label, timeout } => GeoError::Api {
            provider: label,
            status: "TIMEOUT".to_string(),
            message: format!("timed out after {} ms", timeout.as_millis()),
        },
    }
}
