//! Deal records, categories, and the exclusion rules used for deduplication.

use std::collections::HashSet;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::CoreError;
use crate::geo::haversine_km;
use crate::location::ResolvedLocation;

/// Deal categories a user can pick from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Food,
    Groceries,
    Fashion,
    Events,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::Food,
        Category::Groceries,
        Category::Fashion,
        Category::Events,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Category::Food => "food",
            Category::Groceries => "groceries",
            Category::Fashion => "fashion",
            Category::Events => "events",
        }
    }

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Category::Food => "Food & Beverage",
            Category::Groceries => "Groceries",
            Category::Fashion => "Fashion",
            Category::Events => "Events",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "food" | "f&b" | "food & beverage" | "restaurants" => Ok(Category::Food),
            "groceries" | "grocery" | "supermarket" => Ok(Category::Groceries),
            "fashion" | "clothing" | "apparel" => Ok(Category::Fashion),
            "events" | "event" | "activities" => Ok(Category::Events),
            other => Err(CoreError::InvalidCategory(other.to_string())),
        }
    }
}

/// A business offer surfaced to users.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Deal {
    pub deal_id: String,
    pub business_name: String,
    pub offer: String,
    pub description: String,
    pub address: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub contact: Option<String>,
    pub validity: Option<String>,
    pub price: Option<String>,
    pub url: Option<String>,
    pub source: String,
    pub verified: bool,
    pub verified_at: Option<DateTime<Utc>>,
    pub category: Category,
    pub location_key: String,
    pub created_at: DateTime<Utc>,
}

impl Deal {
    /// Build an unverified deal with a derived, source-stable `deal_id`.
    #[must_use]
    pub fn new(
        source: &str,
        category: Category,
        business_name: &str,
        offer: &str,
        location_key: &str,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            deal_id: Self::derive_id(source, business_name, offer),
            business_name: business_name.trim().to_string(),
            offer: offer.trim().to_string(),
            description: String::new(),
            address: String::new(),
            latitude: None,
            longitude: None,
            contact: None,
            validity: None,
            price: None,
            url: None,
            source: source.to_string(),
            verified: false,
            verified_at: None,
            category,
            location_key: location_key.to_string(),
            created_at,
        }
    }

    /// Stable id: first 16 hex chars of `sha256(source|business|offer)`,
    /// case- and whitespace-insensitive on the name and offer.
    #[must_use]
    pub fn derive_id(source: &str, business_name: &str, offer: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(source.as_bytes());
        hasher.update(b"|");
        hasher.update(normalize_key_part(business_name).as_bytes());
        hasher.update(b"|");
        hasher.update(normalize_key_part(offer).as_bytes());
        let digest = hasher.finalize();
        hex::encode(&digest[..8])
    }

    /// The `(businessName, offer)` collision key.
    #[must_use]
    pub fn key(&self) -> DealKey {
        DealKey::new(&self.business_name, &self.offer)
    }

    /// Distance from the given point, when this deal carries coordinates.
    #[must_use]
    pub fn distance_km(&self, latitude: f64, longitude: f64) -> Option<f64> {
        match (self.latitude, self.longitude) {
            (Some(lat), Some(lon)) => Some(haversine_km(latitude, longitude, lat, lon)),
            _ => None,
        }
    }

    /// Padded postal code this deal is indexed under: the location key when
    /// it is a postal code, else the last six-digit run in the address.
    #[must_use]
    pub fn postal_code(&self) -> Option<String> {
        if is_postal_code(&self.location_key) {
            return Some(self.location_key.clone());
        }
        self.address
            .split(|c: char| !c.is_ascii_digit())
            .rev()
            .find(|run| is_postal_code(run))
            .map(str::to_string)
    }

    /// Mark as verified at `now`.
    #[must_use]
    pub fn into_verified(mut self, now: DateTime<Utc>) -> Self {
        self.verified = true;
        self.verified_at = Some(now);
        self
    }
}

fn is_postal_code(s: &str) -> bool {
    s.len() == 6 && s.bytes().all(|b| b.is_ascii_digit())
}

fn normalize_key_part(s: &str) -> String {
    s.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Case- and whitespace-insensitive `(businessName, offer)` pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DealKey {
    pub business_name: String,
    pub offer: String,
}

impl DealKey {
    #[must_use]
    pub fn new(business_name: &str, offer: &str) -> Self {
        Self {
            business_name: normalize_key_part(business_name),
            offer: normalize_key_part(offer),
        }
    }
}

/// Deals a result set must not contain, matched by id or collision key.
#[derive(Debug, Clone, Default)]
pub struct ExclusionSet {
    ids: HashSet<String>,
    keys: HashSet<DealKey>,
}

impl ExclusionSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn from_deals<'a>(deals: impl IntoIterator<Item = &'a Deal>) -> Self {
        let mut set = Self::new();
        set.extend(deals);
        set
    }

    pub fn insert(&mut self, deal: &Deal) {
        if !deal.deal_id.is_empty() {
            self.ids.insert(deal.deal_id.clone());
        }
        self.keys.insert(deal.key());
    }

    pub fn insert_key(&mut self, key: DealKey) {
        self.keys.insert(key);
    }

    pub fn extend<'a>(&mut self, deals: impl IntoIterator<Item = &'a Deal>) {
        for deal in deals {
            self.insert(deal);
        }
    }

    /// `true` if `deal` collides with any excluded item by id or by key.
    #[must_use]
    pub fn excludes(&self, deal: &Deal) -> bool {
        (!deal.deal_id.is_empty() && self.ids.contains(&deal.deal_id))
            || self.keys.contains(&deal.key())
    }

    /// Insert `deal` unless it is already excluded. Returns `true` when inserted.
    pub fn admit(&mut self, deal: &Deal) -> bool {
        if self.excludes(deal) {
            return false;
        }
        self.insert(deal);
        true
    }

    /// Excluded `(businessName, offer)` pairs, normalised.
    pub fn keys(&self) -> impl Iterator<Item = &DealKey> {
        self.keys.iter()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty() && self.keys.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.len()
    }
}

/// Spatial half of a deal query, in the order matching is attempted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SpatialKey {
    /// Exact padded postal code.
    PostalCode(String),
    /// Road-name tokens plus block number from the resolved address.
    AreaToken {
        road_name: String,
        blk_no: Option<String>,
    },
    /// Haversine radius around a point.
    CoordRadius {
        latitude: f64,
        longitude: f64,
        radius_km: f64,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DealQueryKey {
    pub category: Category,
    pub spatial: SpatialKey,
}

impl DealQueryKey {
    /// Radius used by the coordinate predicate.
    pub const DEFAULT_RADIUS_KM: f64 = 2.0;

    /// Query keys for `location`, ordered postal → address tokens → radius.
    #[must_use]
    pub fn for_location(location: &ResolvedLocation, category: Category) -> Vec<Self> {
        let mut keys = Vec::with_capacity(3);
        if !location.postal_code.is_empty() {
            keys.push(Self {
                category,
                spatial: SpatialKey::PostalCode(location.postal_code.clone()),
            });
        }
        if !location.road_name.trim().is_empty() {
            keys.push(Self {
                category,
                spatial: SpatialKey::AreaToken {
                    road_name: location.road_name.clone(),
                    blk_no: location.blk_no.clone(),
                },
            });
        }
        keys.push(Self {
            category,
            spatial: SpatialKey::CoordRadius {
                latitude: location.latitude,
                longitude: location.longitude,
                radius_km: Self::DEFAULT_RADIUS_KM,
            },
        });
        keys
    }
}
