//! Database operations for the `deals` table.
//!
//! Queries here are coarse prefilters (postal equality, road-name substring,
//! bounding box). Exact predicate matching happens in the caller.

use chrono::{DateTime, Utc};
use dealbot_core::{Category, Deal};
use sqlx::PgPool;

use crate::DbError;

const DEAL_COLUMNS: &str = "deal_id, business_name, offer, description, address, latitude, \
     longitude, contact, validity, price, url, source, verified, verified_at, category, \
     location_key, created_at";

/// A row from the `deals` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct DealRow {
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
    pub category: String,
    pub location_key: String,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<DealRow> for Deal {
    type Error = DbError;

    fn try_from(row: DealRow) -> Result<Self, Self::Error> {
        let category: Category = row.category.parse().map_err(|e| DbError::InvalidRow {
            table: "deals",
            key: row.deal_id.clone(),
            reason: format!("{e}"),
        })?;
        Ok(Deal {
            deal_id: row.deal_id,
            business_name: row.business_name,
            offer: row.offer,
            description: row.description,
            address: row.address,
            latitude: row.latitude,
            longitude: row.longitude,
            contact: row.contact,
            validity: row.validity,
            price: row.price,
            url: row.url,
            source: row.source,
            verified: row.verified,
            verified_at: row.verified_at,
            category,
            location_key: row.location_key,
            created_at: row.created_at,
        })
    }
}

/// Latitude/longitude box used to prefilter radius queries.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub min_latitude: f64,
    pub max_latitude: f64,
    pub min_longitude: f64,
    pub max_longitude: f64,
}

impl Bounds {
    /// Smallest box enclosing a circle of `radius_km` around a point.
    #[must_use]
    pub fn around(latitude: f64, longitude: f64, radius_km: f64) -> Self {
        let lat_delta = (radius_km / dealbot_core::EARTH_RADIUS_KM).to_degrees();
        let cos_lat = latitude.to_radians().cos().abs().max(1e-6);
        let lon_delta = lat_delta / cos_lat;
        Self {
            min_latitude: latitude - lat_delta,
            max_latitude: latitude + lat_delta,
            min_longitude: longitude - lon_delta,
            max_longitude: longitude + lon_delta,
        }
    }
}

/// Upserts deals keyed by `deal_id` in one round-trip. Last writer wins.
///
/// Returns the number of rows written.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn upsert_deals(pool: &PgPool, deals: &[Deal]) -> Result<u64, DbError> {
    if deals.is_empty() {
        return Ok(0);
    }

    let n = deals.len();
    let mut deal_ids: Vec<String> = Vec::with_capacity(n);
    let mut names: Vec<String> = Vec::with_capacity(n);
    let mut offers: Vec<String> = Vec::with_capacity(n);
    let mut descriptions: Vec<String> = Vec::with_capacity(n);
    let mut addresses: Vec<String> = Vec::with_capacity(n);
    let mut latitudes: Vec<Option<f64>> = Vec::with_capacity(n);
    let mut longitudes: Vec<Option<f64>> = Vec::with_capacity(n);
    let mut contacts: Vec<Option<String>> = Vec::with_capacity(n);
    let mut validities: Vec<Option<String>> = Vec::with_capacity(n);
    let mut prices: Vec<Option<String>> = Vec::with_capacity(n);
    let mut urls: Vec<Option<String>> = Vec::with_capacity(n);
    let mut sources: Vec<String> = Vec::with_capacity(n);
    let mut verifieds: Vec<bool> = Vec::with_capacity(n);
    let mut verified_ats: Vec<Option<DateTime<Utc>>> = Vec::with_capacity(n);
    let mut categories: Vec<String> = Vec::with_capacity(n);
    let mut location_keys: Vec<String> = Vec::with_capacity(n);
    let mut postal_codes: Vec<Option<String>> = Vec::with_capacity(n);
    let mut created_ats: Vec<DateTime<Utc>> = Vec::with_capacity(n);

    for d in deals {
        deal_ids.push(d.deal_id.clone());
        names.push(d.business_name.clone());
        offers.push(d.offer.clone());
        descriptions.push(d.description.clone());
        addresses.push(d.address.clone());
        latitudes.push(d.latitude);
        longitudes.push(d.longitude);
        contacts.push(d.contact.clone());
        validities.push(d.validity.clone());
        prices.push(d.price.clone());
        urls.push(d.url.clone());
        sources.push(d.source.clone());
        verifieds.push(d.verified);
        verified_ats.push(d.verified_at);
        categories.push(d.category.as_str().to_string());
        location_keys.push(d.location_key.clone());
        postal_codes.push(d.postal_code());
        created_ats.push(d.created_at);
    }

    let result = sqlx::query(
        "INSERT INTO deals \
             (deal_id, business_name, offer, description, address, latitude, longitude, \
              contact, validity, price, url, source, verified, verified_at, category, \
              location_key, postal_code, created_at) \
         SELECT * FROM UNNEST(\
              $1::text[], $2::text[], $3::text[], $4::text[], $5::text[], \
              $6::float8[], $7::float8[], $8::text[], $9::text[], $10::text[], $11::text[], \
              $12::text[], $13::bool[], $14::timestamptz[], $15::text[], $16::text[], \
              $17::text[], $18::timestamptz[]) \
         ON CONFLICT (deal_id) DO UPDATE SET \
             business_name = EXCLUDED.business_name, \
             offer         = EXCLUDED.offer, \
             description   = EXCLUDED.description, \
             address       = EXCLUDED.address, \
             latitude      = EXCLUDED.latitude, \
             longitude     = EXCLUDED.longitude, \
             contact       = EXCLUDED.contact, \
             validity      = EXCLUDED.validity, \
             price         = EXCLUDED.price, \
             url           = EXCLUDED.url, \
             verified      = EXCLUDED.verified, \
             verified_at   = EXCLUDED.verified_at, \
             category      = EXCLUDED.category, \
             location_key  = EXCLUDED.location_key, \
             postal_code   = EXCLUDED.postal_code, \
             updated_at    = NOW()",
    )
    .bind(&deal_ids)
    .bind(&names)
    .bind(&offers)
    .bind(&descriptions)
    .bind(&addresses)
    .bind(&latitudes)
    .bind(&longitudes)
    .bind(&contacts)
    .bind(&validities)
    .bind(&prices)
    .bind(&urls)
    .bind(&sources)
    .bind(&verifieds)
    .bind(&verified_ats)
    .bind(&categories)
    .bind(&location_keys)
    .bind(&postal_codes)
    .bind(&created_ats)
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}

/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails, or [`DbError::InvalidRow`]
/// if the stored category is unknown.
pub async fn get_deal(pool: &PgPool, deal_id: &str) -> Result<Option<Deal>, DbError> {
    let row = sqlx::query_as::<_, DealRow>(&format!(
        "SELECT {DEAL_COLUMNS} FROM deals WHERE deal_id = $1"
    ))
    .bind(deal_id)
    .fetch_optional(pool)
    .await?;

    row.map(Deal::try_from).transpose()
}

/// Deals in `category` indexed under the padded `postal_code` or keyed by it.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails, or [`DbError::InvalidRow`]
/// for a malformed row.
pub async fn list_deals_by_postal(
    pool: &PgPool,
    category: Category,
    postal_code: &str,
    limit: i64,
) -> Result<Vec<Deal>, DbError> {
    let rows = sqlx::query_as::<_, DealRow>(&format!(
        "SELECT {DEAL_COLUMNS} FROM deals \
         WHERE category = $1 AND (postal_code = $2 OR location_key = $2) \
         ORDER BY created_at DESC, deal_id \
         LIMIT $3"
    ))
    .bind(category.as_str())
    .bind(postal_code)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(Deal::try_from).collect()
}

/// Deals in `category` whose address contains `road_fragment` (case-insensitive).
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails, or [`DbError::InvalidRow`]
/// for a malformed row.
pub async fn list_deals_by_road(
    pool: &PgPool,
    category: Category,
    road_fragment: &str,
    limit: i64,
) -> Result<Vec<Deal>, DbError> {
    let pattern = format!("%{}%", escape_like(road_fragment));
    let rows = sqlx::query_as::<_, DealRow>(&format!(
        "SELECT {DEAL_COLUMNS} FROM deals \
         WHERE category = $1 AND address ILIKE $2 \
         ORDER BY created_at DESC, deal_id \
         LIMIT $3"
    ))
    .bind(category.as_str())
    .bind(pattern)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(Deal::try_from).collect()
}

/// Deals in `category` with coordinates inside `bounds`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails, or [`DbError::InvalidRow`]
/// for a malformed row.
pub async fn list_deals_in_bounds(
    pool: &PgPool,
    category: Category,
    bounds: Bounds,
    limit: i64,
) -> Result<Vec<Deal>, DbError> {
    let rows = sqlx::query_as::<_, DealRow>(&format!(
        "SELECT {DEAL_COLUMNS} FROM deals \
         WHERE category = $1 \
           AND latitude BETWEEN $2 AND $3 \
           AND longitude BETWEEN $4 AND $5 \
         ORDER BY created_at DESC, deal_id \
         LIMIT $6"
    ))
    .bind(category.as_str())
    .bind(bounds.min_latitude)
    .bind(bounds.max_latitude)
    .bind(bounds.min_longitude)
    .bind(bounds.max_longitude)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(Deal::try_from).collect()
}

fn escape_like(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounds_enclose_radius() {
        let b = Bounds::around(1.35, 103.82, 2.0);
        assert!(b.min_latitude < 1.35 && b.max_latitude > 1.35);
        // ~0.018 degrees of latitude per 2 km
        assert!((b.max_latitude - 1.35 - 0.017_986).abs() < 1e-3);
        assert!(b.max_longitude - 103.82 >= b.max_latitude - 1.35);
    }

    #[test]
    fn like_metacharacters_are_escaped() {
        assert_eq!(escape_like("50%_off\\"), "50\\%\\_off\\\\");
    }
}
