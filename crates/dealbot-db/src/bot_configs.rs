//! Database operations for the `bot_configs` table.

use dealbot_core::{BotConfig, BotType};
use sqlx::PgPool;

use crate::DbError;

const BOT_CONFIG_COLUMNS: &str = "store_id, whatsapp_phone_number_id, whatsapp_token, \
     webhook_secret, owner_number, google_maps_api_key, google_cse_api_key, google_cse_id, \
     openai_api_key, deepseek_api_key, bot_type, s3_bucket_name, aws_region";

#[derive(sqlx::FromRow)]
struct BotConfigRow {
    store_id: String,
    whatsapp_phone_number_id: String,
    whatsapp_token: String,
    webhook_secret: String,
    owner_number: Option<String>,
    google_maps_api_key: Option<String>,
    google_cse_api_key: Option<String>,
    google_cse_id: Option<String>,
    openai_api_key: Option<String>,
    deepseek_api_key: Option<String>,
    bot_type: String,
    s3_bucket_name: Option<String>,
    aws_region: Option<String>,
}

impl From<BotConfigRow> for BotConfig {
    fn from(row: BotConfigRow) -> Self {
        BotConfig {
            store_id: row.store_id,
            whatsapp_phone_number_id: row.whatsapp_phone_number_id,
            whatsapp_token: row.whatsapp_token,
            webhook_secret: row.webhook_secret,
            owner_number: row.owner_number,
            google_maps_api_key: row.google_maps_api_key,
            google_cse_api_key: row.google_cse_api_key,
            google_cse_id: row.google_cse_id,
            openai_api_key: row.openai_api_key,
            deepseek_api_key: row.deepseek_api_key,
            bot_type: BotType::parse(&row.bot_type),
            s3_bucket_name: row.s3_bucket_name,
            aws_region: row.aws_region,
        }
    }
}

/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_bot_config(pool: &PgPool, store_id: &str) -> Result<Option<BotConfig>, DbError> {
    let row = sqlx::query_as::<_, BotConfigRow>(&format!(
        "SELECT {BOT_CONFIG_COLUMNS} FROM bot_configs WHERE store_id = $1"
    ))
    .bind(store_id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(BotConfig::from))
}

/// Locate the store whose WhatsApp number received a webhook.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_bot_config_by_phone_number_id(
    pool: &PgPool,
    phone_number_id: &str,
) -> Result<Option<BotConfig>, DbError> {
    let row = sqlx::query_as::<_, BotConfigRow>(&format!(
        "SELECT {BOT_CONFIG_COLUMNS} FROM bot_configs WHERE whatsapp_phone_number_id = $1"
    ))
    .bind(phone_number_id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(BotConfig::from))
}

/// All configured bots, ordered by `store_id`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_bot_configs(pool: &PgPool) -> Result<Vec<BotConfig>, DbError> {
    let rows = sqlx::query_as::<_, BotConfigRow>(&format!(
        "SELECT {BOT_CONFIG_COLUMNS} FROM bot_configs ORDER BY store_id"
    ))
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(BotConfig::from).collect())
}

/// # Errors
///
/// Returns [`DbError::Sqlx`] if the upsert fails.
pub async fn upsert_bot_config(pool: &PgPool, config: &BotConfig) -> Result<(), DbError> {
    sqlx::query(
        "INSERT INTO bot_configs \
             (store_id, whatsapp_phone_number_id, whatsapp_token, webhook_secret, owner_number, \
              google_maps_api_key, google_cse_api_key, google_cse_id, openai_api_key, \
              deepseek_api_key, bot_type, s3_bucket_name, aws_region) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13) \
         ON CONFLICT (store_id) DO UPDATE SET \
             whatsapp_phone_number_id = EXCLUDED.whatsapp_phone_number_id, \
             whatsapp_token           = EXCLUDED.whatsapp_token, \
             webhook_secret           = EXCLUDED.webhook_secret, \
             owner_number             = EXCLUDED.owner_number, \
             google_maps_api_key      = EXCLUDED.google_maps_api_key, \
             google_cse_api_key       = EXCLUDED.google_cse_api_key, \
             google_cse_id            = EXCLUDED.google_cse_id, \
             openai_api_key           = EXCLUDED.openai_api_key, \
             deepseek_api_key         = EXCLUDED.deepseek_api_key, \
             bot_type                 = EXCLUDED.bot_type, \
             s3_bucket_name           = EXCLUDED.s3_bucket_name, \
             aws_region               = EXCLUDED.aws_region, \
             updated_at               = NOW()",
    )
    .bind(&config.store_id)
    .bind(&config.whatsapp_phone_number_id)
    .bind(&config.whatsapp_token)
    .bind(&config.webhook_secret)
    .bind(&config.owner_number)
    .bind(&config.google_maps_api_key)
    .bind(&config.google_cse_api_key)
    .bind(&config.google_cse_id)
    .bind(&config.openai_api_key)
    .bind(&config.deepseek_api_key)
    .bind(config.bot_type.as_str())
    .bind(&config.s3_bucket_name)
    .bind(&config.aws_region)
    .execute(pool)
    .await?;

    Ok(())
}
