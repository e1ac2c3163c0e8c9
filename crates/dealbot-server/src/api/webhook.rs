//! `GET /webhook` subscription handshake and `POST /webhook` event intake.

use std::collections::BTreeSet;
use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use dealbot_core::{parse_inbound_event, IncomingMessage, WebhookEnvelope};
use serde::Deserialize;

use super::AppState;
use crate::bots::BotRuntime;
use crate::conversation::Conversation;
use crate::middleware::{verify_signature, SIGNATURE_HEADER};

#[derive(Debug, Deserialize)]
pub struct SubscriptionParams {
    #[serde(rename = "hub.mode")]
    mode: Option<String>,
    #[serde(rename = "hub.verify_token")]
    verify_token: Option<String>,
    #[serde(rename = "hub.challenge")]
    challenge: Option<String>,
}

pub async fn verify_subscription(
    State(state): State<AppState>,
    Query(params): Query<SubscriptionParams>,
) -> Response {
    let Some(expected) = state.verify_token.as_deref() else {
        tracing::warn!("webhook verification attempted but no verify token is configured");
        return StatusCode::FORBIDDEN.into_response();
    };
    let token_ok = params.verify_token.as_deref() == Some(expected);
    match (params.mode.as_deref(), params.challenge) {
        (Some("subscribe"), Some(challenge)) if token_ok => {
            tracing::info!("webhook subscription verified");
            (StatusCode::OK, challenge).into_response()
        }
        _ => StatusCode::FORBIDDEN.into_response(),
    }
}

/// Verify, acknowledge, then handle each message on its own task.
///
/// Every bot addressed by the envelope must accept the signature before any
/// message is dispatched. Envelopes for unknown bots are acknowledged and
/// dropped so the platform does not retry them.
pub async fn receive(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> StatusCode {
    let envelope: WebhookEnvelope = match serde_json::from_slice(&body) {
        Ok(e) => e,
        Err(e) => {
            tracing::warn!(error = %e, "webhook body is not a valid envelope");
            return StatusCode::BAD_REQUEST;
        }
    };
    let messages = parse_inbound_event(&envelope);

    let phone_number_ids: BTreeSet<&str> = envelope
        .entry
        .iter()
        .flat_map(|e| &e.changes)
        .filter_map(|c| c.value.metadata.as_ref())
        .map(|m| m.phone_number_id.as_str())
        .collect();

    let mut bots = Vec::new();
    for phone_number_id in phone_number_ids {
        match state.bots.get(phone_number_id).await {
            Ok(Some(bot)) => {
                if !verify_signature(&bot.config.webhook_secret, &body, headers.get(SIGNATURE_HEADER)) {
                    tracing::warn!(phone_number_id, "webhook signature mismatch");
                    return StatusCode::UNAUTHORIZED;
                }
                bots.push(bot);
            }
            Ok(None) => {
                tracing::warn!(phone_number_id, "webhook for unknown bot ignored");
            }
            Err(e) => {
                tracing::error!(phone_number_id, error = %e, "failed to load bot config");
                return StatusCode::INTERNAL_SERVER_ERROR;
            }
        }
    }

    for message in messages {
        let Some(bot) = bots
            .iter()
            .find(|b| b.config.whatsapp_phone_number_id == message.phone_number_id)
        else {
            continue;
        };
        tokio::spawn(dispatch(
            Arc::clone(&state.conversation),
            Arc::clone(bot),
            message,
        ));
    }

    StatusCode::OK
}

async fn dispatch(conversation: Arc<Conversation>, bot: Arc<BotRuntime>, message: IncomingMessage) {
    let replies = conversation.handle(&bot, &message).await;
    for reply in &replies {
        if let Err(e) = bot.messenger.send(&message.sender, reply).await {
            tracing::error!(user_id = %message.sender, error = %e, "failed to send reply");
            break;
        }
    }
}
