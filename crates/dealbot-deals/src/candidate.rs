//! Normalisation of model- and search-produced deal objects.
//!
//! Upstream JSON names the business under several keys; this module folds
//! them into one field so nothing downstream sees the aliases.

use chrono::{DateTime, Utc};
use dealbot_core::{Category, Deal};
use serde_json::{Map, Value};

/// Keys accepted for the business name, in priority order.
const NAME_KEYS: &[&str] = &[
    "businessName",
    "business_name",
    "restaurant",
    "store",
    "title",
    "name",
];

const KNOWN_KEYS: &[&str] = &[
    "offer",
    "deal",
    "description",
    "address",
    "latitude",
    "longitude",
    "lat",
    "lng",
    "contact",
    "phone",
    "validity",
    "valid_until",
    "validUntil",
    "price",
    "url",
    "link",
    "category",
    "dealId",
    "deal_id",
];

/// A deal proposed by an external source, before it is trusted.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Candidate {
    pub business_name: String,
    pub offer: String,
    pub description: String,
    pub address: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub contact: Option<String>,
    pub validity: Option<String>,
    pub price: Option<String>,
    pub url: Option<String>,
}

impl Candidate {
    /// Fold one JSON object into a candidate. `None` when it is not an
    /// object or lacks a business name or offer.
    #[must_use]
    pub fn from_value(value: &Value) -> Option<Self> {
        let obj = value.as_object()?;
        warn_unknown_keys(obj);

        let business_name = first_text(obj, NAME_KEYS)?;
        let offer = first_text(obj, &["offer", "deal"])?;
        Some(Self {
            business_name,
            offer,
            description: first_text(obj, &["description"]).unwrap_or_default(),
            address: first_text(obj, &["address"]).unwrap_or_default(),
            latitude: first_number(obj, &["latitude", "lat"]),
            longitude: first_number(obj, &["longitude", "lng"]),
            contact: first_text(obj, &["contact", "phone"]),
            validity: first_text(obj, &["validity", "valid_until", "validUntil"]),
            price: first_text(obj, &["price"]),
            url: first_text(obj, &["url", "link"]),
        })
    }

    /// Every well-formed candidate in `items`; malformed ones are dropped.
    #[must_use]
    pub fn from_values(items: &[Value]) -> Vec<Self> {
        items.iter().filter_map(Self::from_value).collect()
    }

    #[must_use]
    pub fn into_deal(
        self,
        source: &str,
        category: Category,
        location_key: &str,
        now: DateTime<Utc>,
    ) -> Deal {
        let mut deal = Deal::new(
            source,
            category,
            &self.business_name,
            &self.offer,
            location_key,
            now,
        );
        deal.description = self.description;
        deal.address = self.address;
        deal.latitude = self.latitude;
        deal.longitude = self.longitude;
        deal.contact = self.contact;
        deal.validity = self.validity;
        deal.price = self.price;
        deal.url = self.url;
        deal
    }
}

fn first_text(obj: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|k| match obj.get(*k)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

fn first_number(obj: &Map<String, Value>, keys: &[&str]) -> Option<f64> {
    keys.iter().find_map(|k| match obj.get(*k)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    })
}

fn warn_unknown_keys(obj: &Map<String, Value>) {
    let unknown: Vec<&str> = obj
        .keys()
        .map(String::as_str)
        .filter(|k| !NAME_KEYS.contains(k) && !KNOWN_KEYS.contains(k))
        .collect();
    if !unknown.is_empty() {
        tracing::warn!(fields = ?unknown, "ignoring unknown deal fields");
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn name_aliases_fold_in_priority_order() {
        let c = Candidate::from_value(&json!({
            "title": "Kopi Page",
            "restaurant": "Kopi Corner",
            "offer": "1-for-1 kopi"
        }))
        .unwrap();
        assert_eq!(c.business_name, "Kopi Corner");

        let c = Candidate::from_value(&json!({ "store": "FairPrice", "offer": "2 for $5" })).unwrap();
        assert_eq!(c.business_name, "FairPrice");
    }

    #[test]
    fn requires_name_and_offer() {
        assert!(Candidate::from_value(&json!({ "offer": "free" })).is_none());
        assert!(Candidate::from_value(&json!({ "businessName": "A", "offer": "  " })).is_none());
        assert!(Candidate::from_value(&json!("not an object")).is_none());
    }

    #[test]
    fn coordinates_accept_strings_and_numbers() {
        let c = Candidate::from_value(&json!({
            "businessName": "A",
            "offer": "B",
            "lat": "1.35",
            "longitude": 103.8,
            "price": 12.5
        }))
        .unwrap();
        assert_eq!(c.latitude, Some(1.35));
        assert_eq!(c.longitude, Some(103.8));
        assert_eq!(c.price.as_deref(), Some("12.5"));
    }

    #[test]
    fn into_deal_derives_a_stable_id() {
        let now = Utc::now();
        let c = Candidate {
            business_name: "Kopi Corner".to_string(),
            offer: "1-for-1".to_string(),
            ..Candidate::default()
        };
        let a = c.clone().into_deal("openai", Category::Food, "530349", now);
        let b = c.into_deal("openai", Category::Food, "530349", now);
        assert_eq!(a.deal_id, b.deal_id);
        assert!(!a.verified);
    }
}
