use crate::app_config::{AppConfig, Environment};
use crate::ConfigError;

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Load application configuration from environment variables already in the process.
///
/// Unlike [`load_app_config`], this does NOT load `.env` files.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build application configuration using the provided env-var lookup function.
///
/// Decoupled from the real environment so tests can drive it from a `HashMap`.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    let require = |var: &str| -> Result<String, ConfigError> {
        lookup(var).map_err(|_| ConfigError::MissingEnvVar(var.to_string()))
    };
    let or_default = |var: &str, default: &str| lookup(var).unwrap_or_else(|_| default.to_string());
    let positive = |var: &str, default: &str| -> Result<usize, ConfigError> {
        match parse_or(&lookup, var, default)? {
            0 => Err(invalid(var, "must be greater than zero")),
            n => Ok(n),
        }
    };

    let database_url = require("DATABASE_URL")?;

    let env = parse_environment(&or_default("DEALBOT_ENV", "development"));

    let bind_addr = parse_or(&lookup, "DEALBOT_BIND_ADDR", "0.0.0.0:3000")?;
    let log_level = or_default("DEALBOT_LOG_LEVEL", "info");
    let postal_csv_path = std::path::PathBuf::from(or_default(
        "DEALBOT_POSTAL_CSV_PATH",
        "./data/postal_codes.csv",
    ));
    let webhook_verify_token = lookup("DEALBOT_WEBHOOK_VERIFY_TOKEN").ok();

    let db_max_connections = parse_or(&lookup, "DEALBOT_DB_MAX_CONNECTIONS", "10")?;
    let db_min_connections = parse_or(&lookup, "DEALBOT_DB_MIN_CONNECTIONS", "1")?;
    let db_acquire_timeout_secs = parse_or(&lookup, "DEALBOT_DB_ACQUIRE_TIMEOUT_SECS", "10")?;

    let geocode_timeout_secs = parse_or(&lookup, "DEALBOT_GEOCODE_TIMEOUT_SECS", "5")?;
    let search_timeout_secs = parse_or(&lookup, "DEALBOT_SEARCH_TIMEOUT_SECS", "10")?;
    let verify_timeout_secs = parse_or(&lookup, "DEALBOT_VERIFY_TIMEOUT_SECS", "10")?;
    let store_timeout_secs = parse_or(&lookup, "DEALBOT_STORE_TIMEOUT_SECS", "3")?;
    let max_retries = parse_or(&lookup, "DEALBOT_MAX_RETRIES", "3")?;
    let retry_backoff_base_ms = parse_or(&lookup, "DEALBOT_RETRY_BACKOFF_BASE_MS", "500")?;

    let deals_per_page = positive("DEALBOT_DEALS_PER_PAGE", "5")?;
    let reminder_sweep_cron = or_default("DEALBOT_REMINDER_SWEEP_CRON", "0 * * * * *");
    let reminder_batch_size = positive("DEALBOT_REMINDER_BATCH_SIZE", "50")?;

    let openai_model = or_default("DEALBOT_OPENAI_MODEL", "gpt-4o-mini");
    let deepseek_model = or_default("DEALBOT_DEEPSEEK_MODEL", "deepseek-chat");

    Ok(AppConfig {
        database_url,
        env,
        bind_addr,
        log_level,
        postal_csv_path,
        webhook_verify_token,
        db_max_connections,
        db_min_connections,
        db_acquire_timeout_secs,
        geocode_timeout_secs,
        search_timeout_secs,
        verify_timeout_secs,
        store_timeout_secs,
        max_retries,
        retry_backoff_base_ms,
        deals_per_page,
        reminder_sweep_cron,
        reminder_batch_size,
        openai_model,
        deepseek_model,
    })
}

/// `var` parsed as `T`, or `default` when unset.
fn parse_or<T, F>(lookup: &F, var: &str, default: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    let raw = lookup(var).unwrap_or_else(|_| default.to_string());
    raw.trim()
        .parse()
        .map_err(|e: T::Err| invalid(var, &e.to_string()))
}

fn invalid(var: &str, reason: &str) -> ConfigError {
    ConfigError::InvalidEnvVar {
        var: var.to_string(),
        reason: reason.to_string(),
    }
}

/// Parse a string into an `Environment` variant.
///
/// Unrecognized values default to `Environment::Development`.
fn parse_environment(s: &str) -> Environment {
    match s {
        "production" => Environment::Production,
        "test" => Environment::Test,
        _ => Environment::Development,
    }
}
