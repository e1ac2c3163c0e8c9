//! Database operations for the `postal_codes` table.

use std::collections::hash_map::Entry;
use std::collections::HashMap;

use dealbot_core::PostalRecord;
use sqlx::PgPool;

use crate::DbError;

/// A row from the `postal_codes` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PostalCodeRow {
    pub postal: String,
    pub address: String,
    pub blk_no: Option<String>,
    pub building: Option<String>,
    pub road_name: String,
    pub latitude: f64,
    pub longitude: f64,
}

impl From<PostalCodeRow> for PostalRecord {
    fn from(row: PostalCodeRow) -> Self {
        PostalRecord {
            postal: row.postal,
            address: row.address,
            blk_no: row.blk_no,
            building: row.building,
            road_name: row.road_name,
            latitude: row.latitude,
            longitude: row.longitude,
        }
    }
}

/// Collapse records sharing a `postal` to the last one, keeping the position
/// of the first.
#[must_use]
pub fn dedup_postal_records(records: Vec<PostalRecord>) -> Vec<PostalRecord> {
    let mut slots: HashMap<String, usize> = HashMap::with_capacity(records.len());
    let mut out: Vec<PostalRecord> = Vec::with_capacity(records.len());
    for record in records {
        match slots.entry(record.postal.clone()) {
            Entry::Occupied(slot) => out[*slot.get()] = record,
            Entry::Vacant(slot) => {
                slot.insert(out.len());
                out.push(record);
            }
        }
    }
    out
}

/// Upserts a batch of postal records in one round-trip.
///
/// Records are keyed by their stored (unpadded) `postal`; a repeated postal
/// code within the batch is written once, with its last row. Returns the
/// number of rows written.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn upsert_postal_codes(pool: &PgPool, records: &[PostalRecord]) -> Result<u64, DbError> {
    if records.is_empty() {
        return Ok(0);
    }
    // One INSERT .. ON CONFLICT cannot touch the same row twice.
    let records = dedup_postal_records(records.to_vec());

    let mut postals: Vec<String> = Vec::with_capacity(records.len());
    let mut addresses: Vec<String> = Vec::with_capacity(records.len());
    let mut blk_nos: Vec<Option<String>> = Vec::with_capacity(records.len());
    let mut buildings: Vec<Option<String>> = Vec::with_capacity(records.len());
    let mut road_names: Vec<String> = Vec::with_capacity(records.len());
    let mut latitudes: Vec<f64> = Vec::with_capacity(records.len());
    let mut longitudes: Vec<f64> = Vec::with_capacity(records.len());

    for r in &records {
        postals.push(r.postal.clone());
        addresses.push(r.address.clone());
        blk_nos.push(r.blk_no.clone());
        buildings.push(r.building.clone());
        road_names.push(r.road_name.clone());
        latitudes.push(r.latitude);
        longitudes.push(r.longitude);
    }

    let result = sqlx::query(
        "INSERT INTO postal_codes \
             (postal, address, blk_no, building, road_name, latitude, longitude) \
         SELECT * FROM UNNEST(\
              $1::text[], $2::text[], $3::text[], $4::text[], $5::text[], \
              $6::float8[], $7::float8[]) \
         ON CONFLICT (postal) DO UPDATE SET \
             address   = EXCLUDED.address, \
             blk_no    = EXCLUDED.blk_no, \
             building  = EXCLUDED.building, \
             road_name = EXCLUDED.road_name, \
             latitude  = EXCLUDED.latitude, \
             longitude = EXCLUDED.longitude",
    )
    .bind(&postals)
    .bind(&addresses)
    .bind(&blk_nos)
    .bind(&buildings)
    .bind(&road_names)
    .bind(&latitudes)
    .bind(&longitudes)
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}

/// Exact lookup by stored (unpadded) postal code.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_postal_code(pool: &PgPool, postal: &str) -> Result<Option<PostalRecord>, DbError> {
    let row = sqlx::query_as::<_, PostalCodeRow>(
        "SELECT postal, address, blk_no, building, road_name, latitude, longitude \
         FROM postal_codes WHERE postal = $1",
    )
    .bind(postal)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(PostalRecord::from))
}

/// One page of a keyset scan ordered by `postal`. Pass the last key of the
/// previous page as `after` to continue.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_postal_codes_page(
    pool: &PgPool,
    after: Option<&str>,
    limit: i64,
) -> Result<Vec<PostalRecord>, DbError> {
    let rows = sqlx::query_as::<_, PostalCodeRow>(
        "SELECT postal, address, blk_no, building, road_name, latitude, longitude \
         FROM postal_codes \
         WHERE ($1::text IS NULL OR postal > $1) \
         ORDER BY postal \
         LIMIT $2",
    )
    .bind(after)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(PostalRecord::from).collect())
}

/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn count_postal_codes(pool: &PgPool) -> Result<i64, DbError> {
    let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM postal_codes")
        .fetch_one(pool)
        .await?;
    Ok(count)
}
