use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::retry::CallPolicy;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Production => write!(f, "production"),
        }
    }
}

#[derive(Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub env: Environment,
    pub bind_addr: SocketAddr,
    pub log_level: String,
    pub postal_csv_path: PathBuf,
    pub webhook_verify_token: Option<String>,
    pub db_max_connections: u32,
    pub db_min_connections: u32,
    pub db_acquire_timeout_secs: u64,
    pub geocode_timeout_secs: u64,
    pub search_timeout_secs: u64,
    pub verify_timeout_secs: u64,
    pub store_timeout_secs: u64,
    pub max_retries: u32,
    pub retry_backoff_base_ms: u64,
    pub deals_per_page: usize,
    pub reminder_sweep_cron: String,
    pub reminder_batch_size: usize,
    pub openai_model: String,
    pub deepseek_model: String,
}

impl AppConfig {
    /// Policy for reverse geocoding and nearby-place lookups.
    #[must_use]
    pub fn geocode_policy(&self) -> CallPolicy {
        self.policy(self.geocode_timeout_secs, self.max_retries)
    }

    /// Policy for the web-search and generative searchers. A timed-out search
    /// degrades to an empty result, so it is attempted once.
    #[must_use]
    pub fn search_policy(&self) -> CallPolicy {
        self.policy(self.search_timeout_secs, 1)
    }

    #[must_use]
    pub fn verify_policy(&self) -> CallPolicy {
        self.policy(self.verify_timeout_secs, 1)
    }

    #[must_use]
    pub fn store_policy(&self) -> CallPolicy {
        self.policy(self.store_timeout_secs, self.max_retries)
    }

    fn policy(&self, timeout_secs: u64, max_attempts: u32) -> CallPolicy {
        CallPolicy {
            timeout: Duration::from_secs(timeout_secs),
            max_attempts,
            backoff_base_ms: self.retry_backoff_base_ms,
        }
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("env", &self.env)
            .field("bind_addr", &self.bind_addr)
            .field("log_level", &self.log_level)
            .field("postal_csv_path", &self.postal_csv_path)
            .field("database_url", &"[redacted]")
            .field(
                "webhook_verify_token",
                &self.webhook_verify_token.as_ref().map(|_| "[redacted]"),
            )
            .field("db_max_connections", &self.db_max_connections)
            .field("db_min_connections", &self.db_min_connections)
            .field("db_acquire_timeout_secs", &self.db_acquire_timeout_secs)
            .field("geocode_timeout_secs", &self.geocode_timeout_secs)
            .field("search_timeout_secs", &self.search_timeout_secs)
            .field("verify_timeout_secs", &self.verify_timeout_secs)
            .field("store_timeout_secs", &self.store_timeout_secs)
            .field("max_retries", &self.max_retries)
            .field("retry_backoff_base_ms", &self.retry_backoff_base_ms)
            .field("deals_per_page", &self.deals_per_page)
            .field("reminder_sweep_cron", &self.reminder_sweep_cron)
            .field("reminder_batch_size", &self.reminder_batch_size)
            .field("openai_model", &self.openai_model)
            .field("deepseek_model", &self.deepseek_model)
            .finish()
    }
}
