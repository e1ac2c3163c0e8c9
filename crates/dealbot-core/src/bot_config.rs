use serde::{Deserialize, Serialize};

/// Which bot flavour a store runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BotType {
    /// Discovers deals for end users.
    #[default]
    DealFinder,
    /// Restaurant owners posting their own deals.
    Restaurant,
}

impl BotType {
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s {
            "restaurant" => BotType::Restaurant,
            _ => BotType::DealFinder,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            BotType::DealFinder => "deal_finder",
            BotType::Restaurant => "restaurant",
        }
    }
}

/// Per-store credentials and options. Immutable once loaded.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BotConfig {
    pub store_id: String,
    pub whatsapp_phone_number_id: String,
    pub whatsapp_token: String,
    pub webhook_secret: String,
    pub owner_number: Option<String>,
    pub google_maps_api_key: Option<String>,
    pub google_cse_api_key: Option<String>,
    pub google_cse_id: Option<String>,
    pub openai_api_key: Option<String>,
    pub deepseek_api_key: Option<String>,
    pub bot_type: BotType,
    pub s3_bucket_name: Option<String>,
    pub aws_region: Option<String>,
}

impl BotConfig {
    /// Web search needs both the API key and the engine id.
    #[must_use]
    pub fn web_search_enabled(&self) -> bool {
        self.google_cse_api_key.is_some() && self.google_cse_id.is_some()
    }
}

impl std::fmt::Debug for BotConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let redact = |v: &Option<String>| v.as_ref().map(|_| "[redacted]");
        f.debug_struct("BotConfig")
            .field("store_id", &self.store_id)
            .field("whatsapp_phone_number_id", &self.whatsapp_phone_number_id)
            .field("whatsapp_token", &"[redacted]")
            .field("webhook_secret", &"[redacted]")
            .field("owner_number", &self.owner_number)
            .field("google_maps_api_key", &redact(&self.google_maps_api_key))
            .field("google_cse_api_key", &redact(&self.google_cse_api_key))
            .field("google_cse_id", &self.google_cse_id)
            .field("openai_api_key", &redact(&self.openai_api_key))
            .field("deepseek_api_key", &redact(&self.deepseek_api_key))
            .field("bot_type", &self.bot_type)
            .field("s3_bucket_name", &self.s3_bucket_name)
            .field("aws_region", &self.aws_region)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> BotConfig {
        BotConfig {
            store_id: "sg-main".to_string(),
            whatsapp_phone_number_id: "1234".to_string(),
            whatsapp_token: "secret-token".to_string(),
            webhook_secret: "hook-secret".to_string(),
            owner_number: None,
            google_maps_api_key: Some("maps-key".to_string()),
            google_cse_api_key: Some("cse-key".to_string()),
            google_cse_id: None,
            openai_api_key: None,
            deepseek_api_key: None,
            bot_type: BotType::DealFinder,
            s3_bucket_name: None,
            aws_region: None,
        }
    }

    #[test]
    fn debug_redacts_secrets() {
        let rendered = format!("{:?}", config());
        assert!(!rendered.contains("secret-token"));
        assert!(!rendered.contains("hook-secret"));
        assert!(!rendered.contains("maps-key"));
    }

    #[test]
    fn web_search_requires_engine_id() {
        let mut cfg = config();
        assert!(!cfg.web_search_enabled());
        cfg.google_cse_id = Some("cx".to_string());
        assert!(cfg.web_search_enabled());
    }

    #[test]
    fn bot_type_parse_defaults_to_deal_finder() {
        assert_eq!(BotType::parse("restaurant"), BotType::Restaurant);
        assert_eq!(BotType::parse("anything"), BotType::DealFinder);
    }
}
