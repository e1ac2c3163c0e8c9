//! In-memory postal-code directory.
//!
//! Loaded once at startup (from the CSV export or the `postal_codes` table)
//! and read-only afterwards, so it is shared behind an `Arc` without locking.

use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

use dealbot_core::{haversine_km, strip_postal, PostalRecord};
use serde::Deserialize;
use sqlx::PgPool;

use crate::error::GeoError;

/// Rows fetched per page when loading from the database.
pub const DB_PAGE_SIZE: i64 = 1_000;

/// Raw CSV row. `X`/`Y` (SVY21 projections) are ignored.
#[derive(Debug, Deserialize)]
struct CsvRow {
    #[serde(rename = "POSTAL")]
    postal: String,
    #[serde(rename = "ADDRESS")]
    address: String,
    #[serde(rename = "BLK_NO", default)]
    blk_no: String,
    #[serde(rename = "BUILDING", default)]
    building: String,
    #[serde(rename = "ROAD_NAME", default)]
    road_name: String,
    #[serde(rename = "LATITUDE")]
    latitude: String,
    #[serde(rename = "LONGITUDE")]
    longitude: String,
}

/// Counts from a CSV load.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub ingested: usize,
    pub skipped: usize,
}

#[derive(Debug, Default)]
pub struct PostalIndex {
    records: HashMap<String, PostalRecord>,
}

impl PostalIndex {
    #[must_use]
    pub fn from_records(records: impl IntoIterator<Item = PostalRecord>) -> Self {
        let records = records
            .into_iter()
            .map(|r| (r.postal.clone(), r))
            .collect();
        Self { records }
    }

    /// Load from a CSV file with the `POSTAL,ADDRESS,BLK_NO,BUILDING,ROAD_NAME,LATITUDE,LONGITUDE,X,Y` header.
    ///
    /// # Errors
    ///
    /// Returns [`GeoError::Csv`] if the file cannot be opened or the header is unreadable.
    pub fn from_csv_path(path: &Path) -> Result<(Self, LoadReport), GeoError> {
        let reader = csv::Reader::from_path(path)?;
        Self::from_csv(reader)
    }

    /// # Errors
    ///
    /// Returns [`GeoError::Csv`] if the header is unreadable.
    pub fn from_csv_reader<R: Read>(input: R) -> Result<(Self, LoadReport), GeoError> {
        Self::from_csv(csv::Reader::from_reader(input))
    }

    fn from_csv<R: Read>(mut reader: csv::Reader<R>) -> Result<(Self, LoadReport), GeoError> {
        let (records, mut report) = read_csv_records(&mut reader)?;
        let index = Self::from_records(records);
        // Duplicate postal codes collapse to the last row.
        report.ingested = index.len();
        Ok((index, report))
    }

    /// Load the whole `postal_codes` table with a keyset-paginated scan.
    ///
    /// # Errors
    ///
    /// Returns [`GeoError::Db`] if any page query fails.
    pub async fn load_from_db(pool: &PgPool) -> Result<Self, GeoError> {
        let mut records = HashMap::new();
        let mut after: Option<String> = None;
        loop {
            let page =
                dealbot_db::list_postal_codes_page(pool, after.as_deref(), DB_PAGE_SIZE).await?;
            let Some(last) = page.last() else {
                break;
            };
            after = Some(last.postal.clone());
            let short_page = i64::try_from(page.len()).unwrap_or(DB_PAGE_SIZE) < DB_PAGE_SIZE;
            for record in page {
                records.insert(record.postal.clone(), record);
            }
            if short_page {
                break;
            }
        }
        tracing::info!(records = records.len(), "postal index loaded from database");
        Ok(Self { records })
    }

    /// Exact lookup. Accepts padded or unpadded input.
    #[must_use]
    pub fn get(&self, postal: &str) -> Option<&PostalRecord> {
        self.records.get(&strip_postal(postal))
    }

    pub fn iter(&self) -> impl Iterator<Item = &PostalRecord> {
        self.records.values()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Closest record by Haversine distance; ties go to the numerically
    /// smallest postal code.
    #[must_use]
    pub fn nearest(&self, latitude: f64, longitude: f64) -> Option<&PostalRecord> {
        let mut best: Option<(&PostalRecord, f64)> = None;
        for record in self.records.values() {
            let d = haversine_km(latitude, longitude, record.latitude, record.longitude);
            let closer = match best {
                None => true,
                Some((current, best_d)) => d
                    .total_cmp(&best_d)
                    .then(record.numeric().cmp(&current.numeric()))
                    .is_lt(),
            };
            if closer {
                best = Some((record, d));
            }
        }
        best.map(|(r, _)| r)
    }
}

/// Parse every row, keeping those whose `POSTAL` is a 5- or 6-digit number.
///
/// Five-digit values are six-digit codes that lost their leading zero in a
/// spreadsheet export; both are stored in the stripped form.
///
/// # Errors
///
/// Returns [`GeoError::Csv`] if the header is unreadable.
pub fn read_csv_records<R: Read>(
    reader: &mut csv::Reader<R>,
) -> Result<(Vec<PostalRecord>, LoadReport), GeoError> {
    reader.headers()?;
    let mut out = Vec::new();
    let mut report = LoadReport::default();
    for row in reader.deserialize::<CsvRow>() {
        match row {
            Ok(row) => match parse_row(row) {
                Some(record) => {
                    out.push(record);
                    report.ingested += 1;
                }
                None => report.skipped += 1,
            },
            Err(e) => {
                tracing::debug!(error = %e, "skipping malformed postal CSV row");
                report.skipped += 1;
            }
        }
    }
    Ok((out, report))
}

fn parse_row(row: CsvRow) -> Option<PostalRecord> {
    let postal = row.postal.trim();
    if !(5..=6).contains(&postal.len()) || !postal.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let latitude: f64 = row.latitude.trim().parse().ok()?;
    let longitude: f64 = row.longitude.trim().parse().ok()?;
    if !dealbot_core::geo::valid_coordinates(latitude, longitude) {
        return None;
    }
    Some(PostalRecord {
        postal: strip_postal(postal),
        address: row.address.trim().to_string(),
        blk_no: non_nil(&row.blk_no),
        building: non_nil(&row.building),
        road_name: row.road_name.trim().to_string(),
        latitude,
        longitude,
    })
}

/// The directory export uses `NIL` for absent values.
fn non_nil(value: &str) -> Option<String> {
    let v = value.trim();
    if v.is_empty() || v.eq_ignore_ascii_case("nil") {
        None
    } else {
        Some(v.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CSV: &str = "\
POSTAL,ADDRESS,BLK_NO,BUILDING,ROAD_NAME,LATITUDE,LONGITUDE,X,Y
530349,349 HOUGANG AVENUE 7 SINGAPORE 530349,349,NIL,HOUGANG AVENUE 7,1.371834,103.899556,33000.1,39000.2
18956,10 MARINA BOULEVARD MARINA BAY FINANCIAL CENTRE SINGAPORE 018956,10,MARINA BAY FINANCIAL CENTRE,MARINA BOULEVARD,1.279,103.854,30000,29000
ABC,bad row,1,NIL,ROAD,1.3,103.8,0,0
1234,too short,1,NIL,ROAD,1.3,103.8,0,0
238801,2 ORCHARD ROAD,2,NIL,ORCHARD ROAD,not-a-number,103.8,0,0
";

    fn index() -> PostalIndex {
        PostalIndex::from_csv_reader(CSV.as_bytes()).unwrap().0
    }

    #[test]
    fn csv_load_keeps_only_valid_numeric_postals() {
        let (index, report) = PostalIndex::from_csv_reader(CSV.as_bytes()).unwrap();
        assert_eq!(index.len(), 2);
        assert_eq!(report.ingested, 2);
        assert_eq!(report.skipped, 3);
    }

    #[test]
    fn get_accepts_padded_and_stripped_forms() {
        let index = index();
        let record = index.get("018956").expect("padded lookup");
        assert_eq!(record.postal, "18956");
        assert_eq!(record.padded(), "018956");
        assert!(index.get("18956").is_some());
        assert_eq!(
            record.building.as_deref(),
            Some("MARINA BAY FINANCIAL CENTRE")
        );
        assert!(index.get("530349").unwrap().building.is_none(), "NIL maps to None");
    }

    #[test]
    fn nearest_returns_closest_record() {
        let index = index();
        let nearest = index.nearest(1.3718338, 103.8995563).unwrap();
        assert_eq!(nearest.postal, "530349");
    }

    #[test]
    fn nearest_ties_break_on_smallest_postal() {
        let record = |postal: &str| PostalRecord {
            postal: postal.to_string(),
            address: String::new(),
            blk_no: None,
            building: None,
            road_name: String::new(),
            latitude: 1.30,
            longitude: 103.80,
        };
        let index = PostalIndex::from_records([record("600001"), record("100001"), record("300001")]);
        assert_eq!(index.nearest(1.31, 103.81).unwrap().postal, "100001");
    }

    #[test]
    fn nearest_on_empty_index_is_none() {
        assert!(PostalIndex::default().nearest(1.3, 103.8).is_none());
    }
}
