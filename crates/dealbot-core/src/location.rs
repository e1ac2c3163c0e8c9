//! Postal records and the normalized location every lookup starts from.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Width of a presented postal code.
pub const POSTAL_WIDTH: usize = 6;

/// Left-pad a postal code with zeros to six characters.
///
/// Inputs longer than six characters are returned unchanged.
#[must_use]
pub fn pad_postal(postal: &str) -> String {
    let trimmed = postal.trim();
    if trimmed.is_empty() {
        return String::new();
    }
    format!("{trimmed:0>POSTAL_WIDTH$}")
}

/// Strip leading zeros to the stored (key) form. `"000000"` becomes `"0"`.
#[must_use]
pub fn strip_postal(postal: &str) -> String {
    let trimmed = postal.trim();
    if trimmed.is_empty() {
        return String::new();
    }
    let stripped = trimmed.trim_start_matches('0');
    if stripped.is_empty() {
        "0".to_string()
    } else {
        stripped.to_string()
    }
}

/// One row of the postal-code directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostalRecord {
    /// Stored (unpadded) form; the index key.
    pub postal: String,
    pub address: String,
    pub blk_no: Option<String>,
    pub building: Option<String>,
    pub road_name: String,
    pub latitude: f64,
    pub longitude: f64,
}

impl PostalRecord {
    /// Six-character presentation form.
    #[must_use]
    pub fn padded(&self) -> String {
        pad_postal(&self.postal)
    }

    /// Numeric value of the postal code, used for tie-breaking.
    #[must_use]
    pub fn numeric(&self) -> u32 {
        self.postal.parse().unwrap_or(u32::MAX)
    }
}

/// How a [`ResolvedLocation`] was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocationSource {
    /// Geocoder postal code found in the postal index.
    DbExact,
    /// Nearest postal record by coordinate scan.
    DbNearest,
    /// Geocoder result that could not be validated against the index.
    GeocoderOnly,
}

impl LocationSource {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            LocationSource::DbExact => "db_exact",
            LocationSource::DbNearest => "db_nearest",
            LocationSource::GeocoderOnly => "geocoder_only",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocationWarning {
    PostalNotInDb,
    NoPostalCode,
}

/// User location normalized against the postal directory. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedLocation {
    pub latitude: f64,
    pub longitude: f64,
    /// Six-character padded form; may be empty only for `GeocoderOnly`.
    pub postal_code: String,
    pub address: String,
    pub road_name: String,
    pub building: Option<String>,
    pub blk_no: Option<String>,
    pub area: Option<String>,
    pub display_name: String,
    pub formatted_address: String,
    pub source: LocationSource,
    pub warning: Option<LocationWarning>,
}

impl ResolvedLocation {
    /// Build a location from a postal record, keeping the caller's coordinates.
    #[must_use]
    pub fn from_record(
        record: &PostalRecord,
        latitude: f64,
        longitude: f64,
        source: LocationSource,
        area: Option<String>,
        formatted_address: Option<String>,
    ) -> Self {
        let display_name = record
            .building
            .clone()
            .unwrap_or_else(|| record.address.clone());
        Self {
            latitude,
            longitude,
            postal_code: record.padded(),
            address: record.address.clone(),
            road_name: record.road_name.clone(),
            building: record.building.clone(),
            blk_no: record.blk_no.clone(),
            area,
            display_name,
            formatted_address: formatted_address.unwrap_or_else(|| record.address.clone()),
            source,
            warning: None,
        }
    }

    /// Enforce: a postal code is present, or the result is geocoder-only and
    /// carries a warning.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidLocation`] when neither holds.
    pub fn validate(self) -> Result<Self, CoreError> {
        if !self.postal_code.is_empty() {
            return Ok(self);
        }
        if self.source == LocationSource::GeocoderOnly && self.warning.is_some() {
            return Ok(self);
        }
        Err(CoreError::InvalidLocation(format!(
            "empty postal code with source {}",
            self.source.as_str()
        )))
    }

    /// Lowercased area token: the area name if known, else the first road-name word.
    #[must_use]
    pub fn area_token(&self) -> Option<String> {
        self.area
            .as_deref()
            .filter(|a| !a.trim().is_empty())
            .or_else(|| self.road_name.split_whitespace().next())
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty())
    }

    /// Key deals from this location are stored under: the padded postal code,
    /// falling back to the area token.
    #[must_use]
    pub fn location_key(&self) -> String {
        if self.postal_code.is_empty() {
            self.area_token().unwrap_or_default()
        } else {
            self.postal_code.clone()
        }
    }

    /// Human label used in search queries: area when known, else postal code.
    #[must_use]
    pub fn search_label(&self) -> String {
        self.area
            .clone()
            .filter(|a| !a.trim().is_empty())
            .unwrap_or_else(|| {
                if self.postal_code.is_empty() {
                    self.display_name.clone()
                } else {
                    self.postal_code.clone()
                }
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> PostalRecord {
        PostalRecord {
            postal: "530349".to_string(),
            address: "349 HOUGANG AVENUE 7 SINGAPORE 530349".to_string(),
            blk_no: Some("349".to_string()),
            building: None,
            road_name: "HOUGANG AVENUE 7".to_string(),
            latitude: 1.371_8,
            longitude: 103.899_5,
        }
    }

    #[test]
    fn pads_short_postal() {
        assert_eq!(pad_postal("18956"), "018956");
        assert_eq!(pad_postal("530349"), "530349");
        assert_eq!(pad_postal(""), "");
    }

    #[test]
    fn strips_leading_zeros() {
        assert_eq!(strip_postal("018956"), "18956");
        assert_eq!(strip_postal("530349"), "530349");
        assert_eq!(strip_postal("000000"), "0");
    }

    #[test]
    fn from_record_pads_and_copies_fields() {
        let loc = ResolvedLocation::from_record(
            &record(),
            1.37,
            103.9,
            LocationSource::DbExact,
            Some("Hougang".to_string()),
            None,
        );
        assert_eq!(loc.postal_code, "530349");
        assert_eq!(loc.blk_no.as_deref(), Some("349"));
        assert_eq!(loc.source, LocationSource::DbExact);
        assert!((loc.latitude - 1.37).abs() < f64::EPSILON);
        assert_eq!(loc.location_key(), "530349");
        assert_eq!(loc.search_label(), "Hougang");
    }

    #[test]
    fn empty_postal_requires_geocoder_only_with_warning() {
        let mut loc = ResolvedLocation::from_record(
            &record(),
            1.37,
            103.9,
            LocationSource::DbNearest,
            None,
            None,
        );
        loc.postal_code = String::new();
        assert!(loc.clone().validate().is_err());

        loc.source = LocationSource::GeocoderOnly;
        assert!(loc.clone().validate().is_err());

        loc.warning = Some(LocationWarning::NoPostalCode);
        assert!(loc.validate().is_ok());
    }

    #[test]
    fn area_token_falls_back_to_road_name() {
        let loc = ResolvedLocation::from_record(
            &record(),
            1.37,
            103.9,
            LocationSource::DbExact,
            None,
            None,
        );
        assert_eq!(loc.area_token().as_deref(), Some("hougang"));
    }
}
