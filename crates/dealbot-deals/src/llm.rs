//! Minimal OpenAI-compatible chat-completions client.
//!
//! Used for both OpenAI and DeepSeek. The request carries only `model`,
//! `messages` and `temperature`; provider-specific tuning fields are never
//! sent, since newer models reject deprecated ones with HTTP 400.

use std::time::Duration;

use reqwest::{Client, StatusCode, Url};
use serde::{Deserialize, Serialize};

use crate::error::LlmError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmProvider {
    OpenAi,
    DeepSeek,
}

impl LlmProvider {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            LlmProvider::OpenAi => "openai",
            LlmProvider::DeepSeek => "deepseek",
        }
    }

    #[must_use]
    pub fn default_base_url(self) -> &'static str {
        match self {
            LlmProvider::OpenAi => "https://api.openai.com/v1/",
            LlmProvider::DeepSeek => "https://api.deepseek.com/v1/",
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
}

#[derive(Clone)]
pub struct ChatClient {
    client: Client,
    provider: LlmProvider,
    api_key: String,
    model: String,
    base_url: Url,
    temperature: f32,
}

impl std::fmt::Debug for ChatClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatClient")
            .field("provider", &self.provider)
            .field("model", &self.model)
            .field("base_url", &self.base_url.as_str())
            .field("api_key", &"[redacted]")
            .finish_non_exhaustive()
    }
}

impl ChatClient {
    /// # Errors
    ///
    /// Returns [`LlmError::Http`] if the `reqwest::Client` cannot be built.
    pub fn new(
        provider: LlmProvider,
        api_key: &str,
        model: &str,
        timeout: Duration,
    ) -> Result<Self, LlmError> {
        Self::with_base_url(provider, api_key, model, timeout, provider.default_base_url())
    }

    /// # Errors
    ///
    /// Returns [`LlmError::Http`] if the `reqwest::Client` cannot be built, or
    /// [`LlmError::InvalidBaseUrl`] if `base_url` does not parse.
    pub fn with_base_url(
        provider: LlmProvider,
        api_key: &str,
        model: &str,
        timeout: Duration,
        base_url: &str,
    ) -> Result<Self, LlmError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent("dealbot/0.1")
            .build()?;
        let normalised = format!("{}/", base_url.trim_end_matches('/'));
        let base_url = Url::parse(&normalised).map_err(|e| LlmError::InvalidBaseUrl {
            url: base_url.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self {
            client,
            provider,
            api_key: api_key.to_owned(),
            model: model.to_owned(),
            base_url,
            temperature: 0.2,
        })
    }

    #[must_use]
    pub fn provider(&self) -> LlmProvider {
        self.provider
    }

    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }

    /// One system + user exchange. Returns the first choice's content.
    ///
    /// # Errors
    ///
    /// - [`LlmError::UnsupportedParameter`] on HTTP 400 naming an unsupported field.
    /// - [`LlmError::RateLimited`] on HTTP 429.
    /// - [`LlmError::Api`] on any other non-success status.
    /// - [`LlmError::Http`] on transport failure.
    /// - [`LlmError::Deserialize`] / [`LlmError::EmptyResponse`] on a malformed body.
    pub async fn complete(&self, system: &str, user: &str) -> Result<String, LlmError> {
        let url = self
            .base_url
            .join("chat/completions")
            .map_err(|e| LlmError::InvalidBaseUrl {
                url: self.base_url.to_string(),
                reason: e.to_string(),
            })?;
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
            temperature: self.temperature,
        };

        let response = self
            .client
            .post(url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(self.status_error(status, &body));
        }

        let parsed: ChatResponse =
            serde_json::from_str(&body).map_err(|e| LlmError::Deserialize {
                context: "chat/completions".to_string(),
                source: e,
            })?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or(LlmError::EmptyResponse {
                provider: self.provider.as_str(),
            })
    }

    fn status_error(&self, status: StatusCode, body: &str) -> LlmError {
        let provider = self.provider.as_str();
        let message = serde_json::from_str::<ErrorEnvelope>(body)
            .map(|e| e.error.message)
            .unwrap_or_else(|_| body.chars().take(500).collect());

        if status == StatusCode::TOO_MANY_REQUESTS {
            return LlmError::RateLimited {
                provider,
                status: status.as_u16(),
            };
        }
        if status == StatusCode::BAD_REQUEST && is_unsupported_parameter(&message) {
            return LlmError::UnsupportedParameter { provider, message };
        }
        LlmError::Api {
            provider,
            status: status.as_u16(),
            message,
        }
    }
}

fn is_unsupported_parameter(message: &str) -> bool {
    let lower = message.to_lowercase();
    lower.contains("unsupported") || lower.contains("unrecognized") || lower.contains("not supported")
}

/// The first balanced JSON array embedded in `text`, parsed.
///
/// Model replies often wrap the array in prose or a Markdown fence, so the
/// scan starts at each `[` and tracks nesting outside string literals.
#[must_use]
pub fn extract_json_array(text: &str) -> Option<Vec<serde_json::Value>> {
    for (start, _) in text.match_indices('[') {
        let Some(end) = matching_bracket(&text[start..]) else {
            continue;
        };
        if let Ok(serde_json::Value::Array(items)) =
            serde_json::from_str::<serde_json::Value>(&text[start..=start + end])
        {
            return Some(items);
        }
    }
    None
}

fn matching_bracket(s: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (i, c) in s.char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '[' => depth += 1,
            ']' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}
