//! Per-bot runtimes keyed by WhatsApp `phone_number_id`.
//!
//! Bot configs are read-mostly: a runtime is built on first use and cached
//! until invalidated. A miss always goes back to the config source, so a bot
//! added to `bot_configs` is picked up without a restart.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use dealbot_core::{AppConfig, BotConfig};
use dealbot_deals::{build_pipeline, DealPipeline, DealStore, SessionManager};
use dealbot_geo::PostalIndex;
use sqlx::PgPool;

use crate::error::ServerError;
use crate::outbound::MessageSink;
use crate::whatsapp::WhatsAppClient;

/// Timeout for one outbound Graph API call.
const SEND_TIMEOUT: Duration = Duration::from_secs(10);

#[async_trait]
pub trait BotConfigSource: Send + Sync {
    async fn by_phone_number_id(&self, phone_number_id: &str)
        -> Result<Option<BotConfig>, ServerError>;

    async fn all(&self) -> Result<Vec<BotConfig>, ServerError>;
}

pub struct PgBotConfigSource {
    pool: PgPool,
}

impl PgBotConfigSource {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BotConfigSource for PgBotConfigSource {
    async fn by_phone_number_id(
        &self,
        phone_number_id: &str,
    ) -> Result<Option<BotConfig>, ServerError> {
        Ok(dealbot_db::get_bot_config_by_phone_number_id(&self.pool, phone_number_id).await?)
    }

    async fn all(&self) -> Result<Vec<BotConfig>, ServerError> {
        Ok(dealbot_db::list_bot_configs(&self.pool).await?)
    }
}

/// Everything needed to serve one bot number.
pub struct BotRuntime {
    pub config: BotConfig,
    pub pipeline: DealPipeline,
    pub messenger: Arc<dyn MessageSink>,
}

pub trait RuntimeBuilder: Send + Sync {
    /// # Errors
    ///
    /// Returns an error if an adapter client cannot be constructed.
    fn build(&self, config: BotConfig) -> Result<BotRuntime, ServerError>;
}

/// Production wiring: pipeline adapters from the bot's keys, WhatsApp sender
/// from its token.
pub struct DefaultRuntimeBuilder {
    pub config: Arc<AppConfig>,
    pub store: Arc<dyn DealStore>,
    pub index: Arc<PostalIndex>,
    pub sessions: Arc<SessionManager>,
    pub graph_base_url: String,
}

impl RuntimeBuilder for DefaultRuntimeBuilder {
    fn build(&self, config: BotConfig) -> Result<BotRuntime, ServerError> {
        let pipeline = build_pipeline(
            &config,
            &self.config,
            Arc::clone(&self.store),
            Arc::clone(&self.index),
            Arc::clone(&self.sessions),
        )?;
        let messenger = WhatsAppClient::with_base_url(
            &config.whatsapp_token,
            &config.whatsapp_phone_number_id,
            SEND_TIMEOUT,
            &self.graph_base_url,
        )?;
        Ok(BotRuntime {
            config,
            pipeline,
            messenger: Arc::new(messenger),
        })
    }
}

pub struct BotRegistry {
    source: Arc<dyn BotConfigSource>,
    builder: Arc<dyn RuntimeBuilder>,
    bots: RwLock<HashMap<String, Arc<BotRuntime>>>,
}

impl BotRegistry {
    #[must_use]
    pub fn new(source: Arc<dyn BotConfigSource>, builder: Arc<dyn RuntimeBuilder>) -> Self {
        Self {
            source,
            builder,
            bots: RwLock::new(HashMap::new()),
        }
    }

    /// Cached runtime for `phone_number_id`, loading it on a miss.
    ///
    /// # Errors
    ///
    /// Returns the source error, or the builder error for a bad config.
    pub async fn get(&self, phone_number_id: &str) -> Result<Option<Arc<BotRuntime>>, ServerError> {
        if let Some(bot) = self
            .bots
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(phone_number_id)
        {
            return Ok(Some(Arc::clone(bot)));
        }

        let Some(config) = self.source.by_phone_number_id(phone_number_id).await? else {
            return Ok(None);
        };
        let runtime = Arc::new(self.builder.build(config)?);
        tracing::info!(
            phone_number_id,
            store_id = %runtime.config.store_id,
            "bot runtime loaded"
        );
        let mut bots = self.bots.write().unwrap_or_else(PoisonError::into_inner);
        Ok(Some(Arc::clone(
            bots.entry(phone_number_id.to_string()).or_insert(runtime),
        )))
    }

    /// Drop a cached runtime so the next [`Self::get`] reloads its config.
    pub fn invalidate(&self, phone_number_id: &str) {
        self.bots
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(phone_number_id);
    }

    /// The bot that should message a user unprompted: `phone_number_id`
    /// when the caller recorded one, otherwise the only configured bot.
    ///
    /// # Errors
    ///
    /// Returns the source or builder error.
    pub async fn route(
        &self,
        user_id: &str,
        phone_number_id: Option<&str>,
    ) -> Result<Option<Arc<BotRuntime>>, ServerError> {
        if let Some(phone_number_id) = phone_number_id {
            let bot = self.get(phone_number_id).await?;
            if bot.is_none() {
                tracing::warn!(user_id, phone_number_id, "routed bot no longer configured");
            }
            return Ok(bot);
        }

        let mut configs = self.source.all().await?;
        if configs.len() == 1 {
            let only = configs.remove(0);
            return self.get(&only.whatsapp_phone_number_id).await;
        }
        tracing::warn!(user_id, bots = configs.len(), "no route to user");
        Ok(None)
    }
}
