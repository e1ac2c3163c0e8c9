//! Offline tests for dealbot-db pool configuration and row conversions.
//! These tests do not require a live database connection.

use chrono::Utc;
use dealbot_core::{build_app_config, Category, Deal, PostalRecord, Reminder, ReminderStatus};
use dealbot_db::{dedup_postal_records, Bounds, DbError, DealRow, PoolConfig, ReminderRow};
use sqlx::types::Json;

#[test]
fn pool_config_from_app_config_uses_core_values() {
    let mut app_config = build_app_config(|var| match var {
        "DATABASE_URL" => Ok("postgres://example".to_string()),
        "DEALBOT_DB_MAX_CONNECTIONS" => Ok("42".to_string()),
        "DEALBOT_DB_MIN_CONNECTIONS" => Ok("7".to_string()),
        _ => Err(std::env::VarError::NotPresent),
    })
    .expect("config should build");
    app_config.db_acquire_timeout_secs = 9;

    let pool_config = PoolConfig::from_app_config(&app_config);
    assert_eq!(pool_config.max_connections, 42);
    assert_eq!(pool_config.min_connections, 7);
    assert_eq!(pool_config.acquire_timeout_secs, 9);
}

#[test]
fn deal_row_converts_to_deal() {
    let now = Utc::now();
    let row = DealRow {
        deal_id: "abc".to_string(),
        business_name: "Kopi Corner".to_string(),
        offer: "1-for-1 Kopi".to_string(),
        description: String::new(),
        address: "349 Hougang Ave 7".to_string(),
        latitude: Some(1.37),
        longitude: Some(103.89),
        contact: None,
        validity: None,
        price: Some("$3.20".to_string()),
        url: None,
        source: "web_search".to_string(),
        verified: true,
        verified_at: Some(now),
        category: "food".to_string(),
        location_key: "530349".to_string(),
        created_at: now,
    };

    let deal = Deal::try_from(row).expect("row should convert");
    assert_eq!(deal.category, Category::Food);
    assert!(deal.verified);
    assert_eq!(deal.price.as_deref(), Some("$3.20"));
}

#[test]
fn deal_row_with_unknown_category_is_rejected() {
    let now = Utc::now();
    let row = DealRow {
        deal_id: "abc".to_string(),
        business_name: "X".to_string(),
        offer: "Y".to_string(),
        description: String::new(),
        address: String::new(),
        latitude: None,
        longitude: None,
        contact: None,
        validity: None,
        price: None,
        url: None,
        source: "web_search".to_string(),
        verified: false,
        verified_at: None,
        category: "cars".to_string(),
        location_key: "530349".to_string(),
        created_at: now,
    };

    assert!(matches!(
        Deal::try_from(row),
        Err(DbError::InvalidRow { table: "deals", .. })
    ));
}

#[test]
fn reminder_row_converts_status() {
    let now = Utc::now();
    let deal = Deal::new("web_search", Category::Food, "Kopi Corner", "1-for-1", "530349", now);
    let reminder = Reminder::new("6591234567", &deal, now + chrono::Duration::hours(1), now);
    let row = ReminderRow {
        reminder_id: reminder.reminder_id,
        user_id: reminder.user_id.clone(),
        reminder_time: reminder.reminder_time,
        title: reminder.title.clone(),
        deal_snapshot: Json(deal),
        status: "failed".to_string(),
        created_at: now,
        ttl: reminder.ttl,
        phone_number_id: Some("pnid-1".to_string()),
    };

    let converted = Reminder::try_from(row).expect("row should convert");
    assert_eq!(converted.status, ReminderStatus::Failed);
    assert_eq!(converted.deal_snapshot.business_name, "Kopi Corner");
    assert_eq!(converted.phone_number_id.as_deref(), Some("pnid-1"));
}

#[test]
fn bounds_are_centered_on_point() {
    let b = Bounds::around(1.3521, 103.8198, 2.0);
    let lat_mid = (b.min_latitude + b.max_latitude) / 2.0;
    let lon_mid = (b.min_longitude + b.max_longitude) / 2.0;
    assert!((lat_mid - 1.3521).abs() < 1e-9);
    assert!((lon_mid - 103.8198).abs() < 1e-9);
}

#[test]
fn duplicate_postal_codes_collapse_to_the_last_row() {
    let record = |postal: &str, road: &str| PostalRecord {
        postal: postal.to_string(),
        address: format!("1 {road}"),
        blk_no: None,
        building: None,
        road_name: road.to_string(),
        latitude: 1.37,
        longitude: 103.89,
    };
    let deduped = dedup_postal_records(vec![
        record("530349", "HOUGANG AVE 7"),
        record("238801", "ORCHARD ROAD"),
        record("530349", "HOUGANG AVENUE 7"),
    ]);
    let roads: Vec<(&str, &str)> = deduped
        .iter()
        .map(|r| (r.postal.as_str(), r.road_name.as_str()))
        .collect();
    assert_eq!(
        roads,
        vec![("530349", "HOUGANG AVENUE 7"), ("238801", "ORCHARD ROAD")]
    );
}
