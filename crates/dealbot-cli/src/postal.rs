//! `ingest-postal`: CSV export into the `postal_codes` table.

use std::path::Path;

use anyhow::Context;
use dealbot_core::{AppConfig, PostalRecord};

/// Records per `upsert_postal_codes` call.
pub(crate) const INGEST_BATCH_SIZE: usize = 25;

/// Parse `path` and upsert every valid row in batches of
/// [`INGEST_BATCH_SIZE`], retrying transient write failures under the
/// store call policy.
///
/// # Errors
///
/// Returns an error if the CSV cannot be read or a batch still fails after
/// its retries.
pub(crate) async fn run_ingest_postal(
    pool: &sqlx::PgPool,
    config: &AppConfig,
    path: &Path,
    dry_run: bool,
) -> anyhow::Result<()> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("opening {}", path.display()))?;
    let (records, report) = dealbot_geo::read_csv_records(&mut reader)
        .with_context(|| format!("reading {}", path.display()))?;
    let parsed = records.len();
    let records = dealbot_db::dedup_postal_records(records);
    tracing::info!(
        path = %path.display(),
        ingested = report.ingested,
        skipped = report.skipped,
        duplicates = parsed - records.len(),
        "postal CSV parsed"
    );

    if dry_run {
        println!(
            "dry-run: {} record(s) would be written in {} batch(es), {} row(s) skipped, {} duplicate(s)",
            records.len(),
            batch_count(records.len()),
            report.skipped,
            parsed - records.len()
        );
        return Ok(());
    }

    let policy = config.store_policy();
    let mut written: u64 = 0;
    for (i, batch) in records.chunks(INGEST_BATCH_SIZE).enumerate() {
        written += write_batch(pool, &policy, batch)
            .await
            .with_context(|| format!("writing postal batch {i}"))?;
    }

    let total = dealbot_db::count_postal_codes(pool).await?;
    tracing::info!(written, total, "postal ingestion complete");
    println!("wrote {written} record(s); postal_codes now holds {total}");
    Ok(())
}

async fn write_batch(
    pool: &sqlx::PgPool,
    policy: &dealbot_core::CallPolicy,
    batch: &[PostalRecord],
) -> Result<u64, dealbot_core::CallError<dealbot_db::DbError>> {
    policy
        .run("upsert_postal_codes", || {
            dealbot_db::upsert_postal_codes(pool, batch)
        })
        .await
}

pub(crate) fn batch_count(records: usize) -> usize {
    records.div_ceil(INGEST_BATCH_SIZE)
}
