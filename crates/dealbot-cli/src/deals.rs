//! `find-deals`: one pipeline run from the command line.

use std::sync::Arc;

use anyhow::Context;
use dealbot_core::{AppConfig, BotConfig, Category, ExclusionSet};
use dealbot_deals::{build_pipeline, PgDealStore, SessionManager};
use dealbot_geo::PostalIndex;

/// Session key for CLI lookups; kept in memory so no user row is written.
const CLI_USER: &str = "dealbot-cli";

pub(crate) async fn run_find_deals(
    pool: &sqlx::PgPool,
    config: &AppConfig,
    latitude: f64,
    longitude: f64,
    category: Category,
    phone_number_id: Option<&str>,
    limit: usize,
) -> anyhow::Result<()> {
    let bot = select_bot(pool, phone_number_id).await?;
    let index = PostalIndex::load_from_db(pool).await?;
    if index.is_empty() {
        anyhow::bail!("postal_codes is empty; run `dealbot-cli ingest-postal` first");
    }

    let pipeline = build_pipeline(
        &bot,
        config,
        Arc::new(PgDealStore::new(pool.clone())),
        Arc::new(index),
        Arc::new(SessionManager::in_memory()),
    )?;

    let location = pipeline
        .resolver()
        .resolve(latitude, longitude)
        .await
        .context("resolving location")?;
    println!(
        "{} ({}), {category}",
        location.display_name,
        location.postal_code
    );

    match pipeline
        .get_deals(CLI_USER, &location, category, &ExclusionSet::new(), limit)
        .await
    {
        Ok(deals) => {
            for (i, deal) in deals.iter().enumerate() {
                let badge = if deal.verified { "" } else { " [unverified]" };
                println!("{:>2}. {}: {}{badge}", i + 1, deal.business_name, deal.offer);
                if !deal.address.is_empty() {
                    println!("    {}", deal.address);
                }
            }
        }
        Err(dealbot_deals::DealError::NotFound) => println!("no deals found"),
        Err(e) => return Err(e.into()),
    }
    Ok(())
}

async fn select_bot(pool: &sqlx::PgPool, phone_number_id: Option<&str>) -> anyhow::Result<BotConfig> {
    if let Some(id) = phone_number_id {
        return dealbot_db::get_bot_config_by_phone_number_id(pool, id)
            .await?
            .with_context(|| format!("no bot config for phone number id {id}"));
    }
    let mut bots = dealbot_db::list_bot_configs(pool).await?;
    match bots.len() {
        1 => Ok(bots.remove(0)),
        0 => anyhow::bail!("no bot configs found"),
        n => anyhow::bail!("{n} bots configured; pass --phone-number-id"),
    }
}
