//! Wiring a [`DealPipeline`] from a store's [`BotConfig`].
//!
//! Each adapter is enabled only when the bot carries its credentials. The
//! generative searcher prefers DeepSeek and the verifier prefers OpenAI;
//! either falls back to the other provider.

use std::sync::Arc;
use std::time::Duration;

use dealbot_core::{AppConfig, BotConfig};
use dealbot_geo::{GeoResolver, GooglePlacesClient, GoogleGeocoder, PostalIndex, ReverseGeocoder};

use crate::error::DealError;
use crate::generative::GenerativeAdapter;
use crate::llm::{ChatClient, LlmProvider};
use crate::pipeline::{DealPipeline, PipelinePolicies};
use crate::session::SessionManager;
use crate::store::DealStore;
use crate::verifier::LlmVerifier;
use crate::web_search::WebSearchAdapter;

/// # Errors
///
/// Returns an error if any HTTP client cannot be built.
pub fn build_pipeline(
    bot: &BotConfig,
    config: &AppConfig,
    store: Arc<dyn DealStore>,
    index: Arc<PostalIndex>,
    sessions: Arc<SessionManager>,
) -> Result<DealPipeline, DealError> {
    let geocode_timeout = Duration::from_secs(config.geocode_timeout_secs);
    let search_timeout = Duration::from_secs(config.search_timeout_secs);
    let verify_timeout = Duration::from_secs(config.verify_timeout_secs);

    let geocoder: Option<Arc<dyn ReverseGeocoder>> = match &bot.google_maps_api_key {
        Some(key) => Some(Arc::new(GoogleGeocoder::new(key, geocode_timeout)?)),
        None => {
            tracing::warn!(store_id = %bot.store_id, "no maps key, locations resolve to the nearest postal record");
            None
        }
    };
    let resolver = Arc::new(GeoResolver::new(geocoder, index, config.geocode_policy()));

    let mut pipeline = DealPipeline::new(
        store,
        resolver,
        sessions,
        PipelinePolicies::from_app_config(config),
    );

    if let Some(key) = &bot.google_maps_api_key {
        pipeline = pipeline.with_places(Arc::new(GooglePlacesClient::new(key, geocode_timeout)?));
    }

    if let (Some(key), Some(cx)) = (&bot.google_cse_api_key, &bot.google_cse_id) {
        pipeline =
            pipeline.with_web_search(Arc::new(WebSearchAdapter::new(key, cx, search_timeout)?));
    }

    if let Some(chat) = chat_client(bot, config, &[LlmProvider::DeepSeek, LlmProvider::OpenAi], search_timeout)? {
        pipeline = pipeline.with_generative(Arc::new(GenerativeAdapter::new(chat)));
    }

    match chat_client(bot, config, &[LlmProvider::OpenAi, LlmProvider::DeepSeek], verify_timeout)? {
        Some(chat) => pipeline = pipeline.with_verifier(Arc::new(LlmVerifier::new(chat))),
        None => {
            tracing::warn!(store_id = %bot.store_id, "no model key, external deals will be unverified");
        }
    }

    Ok(pipeline)
}

/// Client for the first provider in `preference` the bot has a key for.
fn chat_client(
    bot: &BotConfig,
    config: &AppConfig,
    preference: &[LlmProvider],
    timeout: Duration,
) -> Result<Option<ChatClient>, DealError> {
    for provider in preference {
        let (key, model) = match provider {
            LlmProvider::OpenAi => (&bot.openai_api_key, &config.openai_model),
            LlmProvider::DeepSeek => (&bot.deepseek_api_key, &config.deepseek_model),
        };
        if let Some(key) = key {
            return Ok(Some(ChatClient::new(*provider, key, model, timeout)?));
        }
    }
    Ok(None)
}
