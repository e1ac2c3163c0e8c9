//! Fakes shared by the server integration tests.
#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use dealbot_core::{
    BotConfig, BotType, CallPolicy, Category, Deal, IncomingMessage, MessageContent,
    PostalRecord,
};
use dealbot_deals::{DealPipeline, MemoryDealStore, PipelinePolicies, SessionManager};
use dealbot_geo::{GeoResolver, PostalIndex};
use dealbot_server::{
    BotConfigSource, BotRuntime, MessageSink, OutboundMessage, RuntimeBuilder, ServerError,
};
use tokio::sync::Notify;

pub const PHONE_NUMBER_ID: &str = "pnid-1";
pub const USER: &str = "6591234567";
pub const SECRET: &str = "webhook-secret";
pub const HOUGANG: (f64, f64) = (1.371_833_8, 103.899_556_3);

#[derive(Default)]
pub struct RecordingMessenger {
    sent: Mutex<Vec<(String, OutboundMessage)>>,
    notify: Notify,
}

impl RecordingMessenger {
    pub fn sent(&self) -> Vec<(String, OutboundMessage)> {
        self.sent.lock().unwrap().clone()
    }

    pub async fn wait_for(&self, n: usize) -> Vec<(String, OutboundMessage)> {
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                let notified = self.notify.notified();
                let sent = self.sent();
                if sent.len() >= n {
                    return sent;
                }
                notified.await;
            }
        })
        .await
        .expect("messages arrive in time")
    }
}

#[async_trait]
impl MessageSink for RecordingMessenger {
    async fn send(&self, to: &str, message: &OutboundMessage) -> Result<(), ServerError> {
        self.sent
            .lock()
            .unwrap()
            .push((to.to_string(), message.clone()));
        self.notify.notify_waiters();
        Ok(())
    }
}

pub struct StaticSource(pub Vec<BotConfig>);

#[async_trait]
impl BotConfigSource for StaticSource {
    async fn by_phone_number_id(
        &self,
        phone_number_id: &str,
    ) -> Result<Option<BotConfig>, ServerError> {
        Ok(self
            .0
            .iter()
            .find(|c| c.whatsapp_phone_number_id == phone_number_id)
            .cloned())
    }

    async fn all(&self) -> Result<Vec<BotConfig>, ServerError> {
        Ok(self.0.clone())
    }
}

pub struct FakeBuilder {
    pub messenger: Arc<dyn MessageSink>,
    pub deals: Vec<Deal>,
}

impl RuntimeBuilder for FakeBuilder {
    fn build(&self, config: BotConfig) -> Result<BotRuntime, ServerError> {
        Ok(BotRuntime {
            config,
            pipeline: pipeline(self.deals.clone()),
            messenger: Arc::clone(&self.messenger),
        })
    }
}

pub fn bot_config(phone_number_id: &str) -> BotConfig {
    BotConfig {
        store_id: format!("store-{phone_number_id}"),
        whatsapp_phone_number_id: phone_number_id.to_string(),
        whatsapp_token: "token".to_string(),
        webhook_secret: SECRET.to_string(),
        owner_number: None,
        google_maps_api_key: None,
        google_cse_api_key: None,
        google_cse_id: None,
        openai_api_key: None,
        deepseek_api_key: None,
        bot_type: BotType::DealFinder,
        s3_bucket_name: None,
        aws_region: None,
    }
}

fn record(postal: &str, blk: &str, road: &str, lat: f64, lon: f64) -> PostalRecord {
    PostalRecord {
        postal: postal.to_string(),
        address: format!("{blk} {road} SINGAPORE {postal}"),
        blk_no: Some(blk.to_string()),
        building: None,
        road_name: road.to_string(),
        latitude: lat,
        longitude: lon,
    }
}

/// Pipeline with no geocoder and no external searchers: locations resolve to
/// the nearest postal record and deals come only from `deals`.
pub fn pipeline(deals: Vec<Deal>) -> DealPipeline {
    let index = Arc::new(PostalIndex::from_records([
        record("530349", "349", "HOUGANG AVENUE 7", 1.371_834, 103.899_556),
        record("570150", "150", "BISHAN STREET 11", 1.3521, 103.8488),
    ]));
    let resolver = Arc::new(GeoResolver::new(
        None,
        index,
        CallPolicy::once(Duration::from_secs(5)),
    ));
    let once = CallPolicy::once(Duration::from_secs(5));
    DealPipeline::new(
        Arc::new(MemoryDealStore::with_deals(deals)),
        resolver,
        Arc::new(SessionManager::in_memory()),
        PipelinePolicies {
            store: once,
            search: once,
            verify: once,
            places: once,
        },
    )
}

pub fn hougang_deals() -> Vec<Deal> {
    [
        ("Kopi Corner", "1-for-1 kopi"),
        ("Hougang Laksa", "$1 off laksa"),
        ("Bread Talk Hougang", "3 buns for $5"),
    ]
    .into_iter()
    .map(|(name, offer)| {
        let mut d = Deal::new(
            "seed",
            Category::Food,
            name,
            offer,
            "530349",
            Utc.with_ymd_and_hms(2026, 10, 1, 0, 0, 0).unwrap(),
        );
        d.address = "Blk 349 Hougang Ave 7 Singapore 530349".to_string();
        d.latitude = Some(1.3719);
        d.longitude = Some(103.8996);
        d
    })
    .collect()
}

pub fn message(content: MessageContent) -> IncomingMessage {
    IncomingMessage {
        phone_number_id: PHONE_NUMBER_ID.to_string(),
        message_id: "wamid.test".to_string(),
        sender: USER.to_string(),
        content,
    }
}
