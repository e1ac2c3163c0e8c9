//! WhatsApp Cloud API sender.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::ServerError;
use crate::outbound::{MessageSink, OutboundMessage};

pub const DEFAULT_GRAPH_BASE_URL: &str = "https://graph.facebook.com/v21.0/";

#[derive(Debug, Deserialize)]
struct GraphErrorBody {
    error: GraphError,
}

#[derive(Debug, Deserialize)]
struct GraphError {
    #[serde(default)]
    message: String,
}

pub struct WhatsAppClient {
    client: Client,
    token: String,
    phone_number_id: String,
    base_url: Url,
}

impl std::fmt::Debug for WhatsAppClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WhatsAppClient")
            .field("phone_number_id", &self.phone_number_id)
            .field("base_url", &self.base_url.as_str())
            .field("token", &"[redacted]")
            .finish()
    }
}

impl WhatsAppClient {
    /// # Errors
    ///
    /// Returns [`ServerError::Http`] if the `reqwest::Client` cannot be built.
    pub fn new(token: &str, phone_number_id: &str, timeout: Duration) -> Result<Self, ServerError> {
        Self::with_base_url(token, phone_number_id, timeout, DEFAULT_GRAPH_BASE_URL)
    }

    /// # Errors
    ///
    /// Returns [`ServerError::Http`] if the `reqwest::Client` cannot be built, or
    /// [`ServerError::InvalidBaseUrl`] if `base_url` does not parse.
    pub fn with_base_url(
        token: &str,
        phone_number_id: &str,
        timeout: Duration,
        base_url: &str,
    ) -> Result<Self, ServerError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent("dealbot/0.1")
            .build()?;
        let normalised = format!("{}/", base_url.trim_end_matches('/'));
        let base_url = Url::parse(&normalised).map_err(|e| ServerError::InvalidBaseUrl {
            url: base_url.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self {
            client,
            token: token.to_owned(),
            phone_number_id: phone_number_id.to_owned(),
            base_url,
        })
    }

    fn messages_url(&self) -> Result<Url, ServerError> {
        self.base_url
            .join(&format!("{}/messages", self.phone_number_id))
            .map_err(|e| ServerError::InvalidBaseUrl {
                url: self.base_url.to_string(),
                reason: e.to_string(),
            })
    }
}

#[async_trait]
impl MessageSink for WhatsAppClient {
    async fn send(&self, to: &str, message: &OutboundMessage) -> Result<(), ServerError> {
        let response = self
            .client
            .post(self.messages_url()?)
            .bearer_auth(&self.token)
            .json(&payload(to, message))
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<GraphErrorBody>(&body)
            .map(|b| b.error.message)
            .unwrap_or(body);
        if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
            tracing::warn!(status = status.as_u16(), to, "WhatsApp send throttled or failed upstream");
        }
        Err(ServerError::WhatsApp {
            status: status.as_u16(),
            message,
        })
    }
}

/// Cloud API request body for `message`.
#[must_use]
pub fn payload(to: &str, message: &OutboundMessage) -> Value {
    let mut body = json!({
        "messaging_product": "whatsapp",
        "recipient_type": "individual",
        "to": to,
    });
    let (kind, content) = match message {
        OutboundMessage::Text(text) => ("text", json!({ "preview_url": false, "body": text })),
        OutboundMessage::Buttons { body, buttons } => (
            "interactive",
            json!({
                "type": "button",
                "body": { "text": body },
                "action": {
                    "buttons": buttons
                        .iter()
                        .map(|b| json!({ "type": "reply", "reply": { "id": b.id, "title": b.title } }))
                        .collect::<Vec<_>>(),
                },
            }),
        ),
        OutboundMessage::List {
            body,
            button_label,
            rows,
        } => (
            "interactive",
            json!({
                "type": "list",
                "body": { "text": body },
                "action": {
                    "button": button_label,
                    "sections": [{
                        "title": button_label,
                        "rows": rows
                            .iter()
                            .map(|r| {
                                let mut row = json!({ "id": r.id, "title": r.title });
                                if let Some(d) = &r.description {
                                    row["description"] = json!(d);
                                }
                                row
                            })
                            .collect::<Vec<_>>(),
                    }],
                },
            }),
        ),
        OutboundMessage::Location {
            latitude,
            longitude,
            name,
            address,
        } => (
            "location",
            json!({
                "latitude": latitude,
                "longitude": longitude,
                "name": name,
                "address": address,
            }),
        ),
    };
    body["type"] = json!(kind);
    body[kind] = content;
    body
}
