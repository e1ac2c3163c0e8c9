mod common;

use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeZone, Utc};
use dealbot_core::{BotConfig, Classify, Reminder};
use dealbot_reminders::{ReminderError, ReminderSink};
use dealbot_server::{
    BotRegistry, BotRuntime, MessageSink, OutboundMessage, RuntimeBuilder, ServerError,
    WhatsAppClient, WhatsAppReminderSink,
};
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::{bot_config, hougang_deals, pipeline, StaticSource, PHONE_NUMBER_ID, USER};

fn client(server: &MockServer) -> WhatsAppClient {
    WhatsAppClient::with_base_url("test-token", PHONE_NUMBER_ID, Duration::from_secs(5), &server.uri())
        .expect("client")
}

fn accepted() -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(serde_json::json!({
        "messaging_product": "whatsapp",
        "contacts": [{ "input": USER, "wa_id": USER }],
        "messages": [{ "id": "wamid.out.1" }]
    }))
}

#[tokio::test]
async fn send_posts_text_to_phone_number_endpoint() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(format!("/{PHONE_NUMBER_ID}/messages")))
        .and(header("authorization", "Bearer test-token"))
        .and(body_partial_json(serde_json::json!({
            "messaging_product": "whatsapp",
            "to": USER,
            "type": "text",
            "text": { "body": "hello" }
        })))
        .respond_with(accepted())
        .expect(1)
        .mount(&server)
        .await;

    client(&server)
        .send(USER, &OutboundMessage::text("hello"))
        .await
        .expect("send succeeds");
}

#[tokio::test]
async fn graph_error_message_is_surfaced() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
            "error": {
                "message": "(#131030) Recipient phone number not in allowed list",
                "type": "OAuthException",
                "code": 131_030
            }
        })))
        .mount(&server)
        .await;

    let err = client(&server)
        .send(USER, &OutboundMessage::text("hello"))
        .await
        .unwrap_err();
    match &err {
        ServerError::WhatsApp { status, message } => {
            assert_eq!(*status, 400);
            assert!(message.contains("not in allowed list"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(!err.is_transient());
}

#[tokio::test]
async fn throttling_is_transient() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(429).set_body_string("slow down"))
        .mount(&server)
        .await;

    let err = client(&server)
        .send(USER, &OutboundMessage::text("hello"))
        .await
        .unwrap_err();
    assert!(err.is_transient());
}

/// Builds runtimes whose messenger talks to the mock Graph API.
struct MockGraphBuilder {
    base_url: String,
}

impl RuntimeBuilder for MockGraphBuilder {
    fn build(&self, config: BotConfig) -> Result<BotRuntime, ServerError> {
        let messenger = WhatsAppClient::with_base_url(
            &config.whatsapp_token,
            &config.whatsapp_phone_number_id,
            Duration::from_secs(5),
            &self.base_url,
        )?;
        Ok(BotRuntime {
            config,
            pipeline: pipeline(Vec::new()),
            messenger: Arc::new(messenger),
        })
    }
}

fn reminder() -> Reminder {
    let deal = hougang_deals().remove(0);
    let created = Utc.with_ymd_and_hms(2026, 10, 18, 4, 0, 0).unwrap();
    Reminder::new(USER, &deal, created + chrono::Duration::hours(1), created)
}

#[tokio::test]
async fn reminder_sink_delivers_once_per_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(format!("/{PHONE_NUMBER_ID}/messages")))
        .and(body_partial_json(serde_json::json!({ "to": USER, "type": "text" })))
        .respond_with(accepted())
        .expect(1)
        .mount(&server)
        .await;

    let bots = Arc::new(BotRegistry::new(
        Arc::new(StaticSource(vec![bot_config(PHONE_NUMBER_ID)])),
        Arc::new(MockGraphBuilder {
            base_url: server.uri(),
        }),
    ));
    let sink = WhatsAppReminderSink::new(bots);
    let reminder = reminder();
    let token = reminder.idempotency_token();

    sink.deliver(&reminder, &token).await.expect("first delivery");
    sink.deliver(&reminder, &token).await.expect("duplicate is a no-op");
}

#[tokio::test]
async fn reminder_sink_without_a_route_fails_permanently() {
    let server = MockServer::start().await;
    let bots = Arc::new(BotRegistry::new(
        Arc::new(StaticSource(vec![bot_config("pnid-a"), bot_config("pnid-b")])),
        Arc::new(MockGraphBuilder {
            base_url: server.uri(),
        }),
    ));
    let sink = WhatsAppReminderSink::new(bots);
    let reminder = reminder();

    let err = sink
        .deliver(&reminder, &reminder.idempotency_token())
        .await
        .unwrap_err();
    assert!(matches!(err, ReminderError::Delivery { transient: false, .. }));
}

#[tokio::test]
async fn reminder_sink_uses_the_bot_recorded_on_the_reminder() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/pnid-b/messages"))
        .respond_with(accepted())
        .expect(1)
        .mount(&server)
        .await;

    // A fresh registry, as after a restart: nothing is known about the user.
    let bots = Arc::new(BotRegistry::new(
        Arc::new(StaticSource(vec![bot_config("pnid-a"), bot_config("pnid-b")])),
        Arc::new(MockGraphBuilder {
            base_url: server.uri(),
        }),
    ));
    let sink = WhatsAppReminderSink::new(bots);
    let reminder = reminder().via("pnid-b");

    sink.deliver(&reminder, &reminder.idempotency_token())
        .await
        .expect("delivered via pnid-b");
}

#[tokio::test]
async fn reminder_sink_fails_permanently_when_its_bot_was_removed() {
    let server = MockServer::start().await;
    let bots = Arc::new(BotRegistry::new(
        Arc::new(StaticSource(vec![bot_config("pnid-a")])),
        Arc::new(MockGraphBuilder {
            base_url: server.uri(),
        }),
    ));
    let sink = WhatsAppReminderSink::new(bots);
    let reminder = reminder().via("pnid-gone");

    let err = sink
        .deliver(&reminder, &reminder.idempotency_token())
        .await
        .unwrap_err();
    assert!(matches!(err, ReminderError::Delivery { transient: false, .. }));
}
