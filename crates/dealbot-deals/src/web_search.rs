//! Web-search adapter over the Google Programmable Search (CSE) JSON API.

use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use dealbot_core::{Category, Deal, ExclusionSet, ResolvedLocation};
use regex::Regex;
use reqwest::{Client, Url};
use serde::Deserialize;

use crate::candidate::Candidate;
use crate::error::DealError;
use crate::searcher::DealSearcher;

const DEFAULT_BASE_URL: &str = "https://www.googleapis.com/";
const PROVIDER: &str = "google_cse";
const RESULTS_PER_QUERY: u8 = 10;
const MAX_OFFER_CHARS: usize = 160;
const TITLE_SEPARATORS: &[&str] = &[" | ", " - ", " – ", ": "];

static POSTAL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b\d{6}\b").expect("valid postal regex"));

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    #[serde(default)]
    title: String,
    #[serde(default)]
    link: Option<String>,
    #[serde(default)]
    snippet: String,
}

pub struct WebSearchAdapter {
    client: Client,
    api_key: String,
    engine_id: String,
    base_url: Url,
}

impl WebSearchAdapter {
    /// # Errors
    ///
    /// Returns [`DealError::Http`] if the `reqwest::Client` cannot be built.
    pub fn new(api_key: &str, engine_id: &str, timeout: Duration) -> Result<Self, DealError> {
        Self::with_base_url(api_key, engine_id, timeout, DEFAULT_BASE_URL)
    }

    /// # Errors
    ///
    /// Returns [`DealError::Http`] if the `reqwest::Client` cannot be built, or
    /// [`DealError::InvalidBaseUrl`] if `base_url` does not parse.
    pub fn with_base_url(
        api_key: &str,
        engine_id: &str,
        timeout: Duration,
        base_url: &str,
    ) -> Result<Self, DealError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent("dealbot/0.1")
            .build()?;
        let normalised = format!("{}/", base_url.trim_end_matches('/'));
        let base_url = Url::parse(&normalised).map_err(|e| DealError::InvalidBaseUrl {
            url: base_url.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self {
            client,
            api_key: api_key.to_owned(),
            engine_id: engine_id.to_owned(),
            base_url,
        })
    }

    async fn fetch(&self, query: &str) -> Result<Vec<SearchItem>, DealError> {
        let mut url = self
            .base_url
            .join("customsearch/v1")
            .map_err(|e| DealError::InvalidBaseUrl {
                url: self.base_url.to_string(),
                reason: e.to_string(),
            })?;
        url.query_pairs_mut()
            .append_pair("key", &self.api_key)
            .append_pair("cx", &self.engine_id)
            .append_pair("q", query)
            .append_pair("num", &RESULTS_PER_QUERY.to_string());

        let response = self.client.get(url).send().await?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(DealError::Api {
                provider: PROVIDER,
                status: status.as_u16(),
                message: body.chars().take(300).collect(),
            });
        }
        let parsed: SearchResponse =
            serde_json::from_str(&body).map_err(|e| DealError::Deserialize {
                context: "customsearch/v1".to_string(),
                source: e,
            })?;
        Ok(parsed.items)
    }
}

/// `"<category> deals near <area|postal> singapore"`.
#[must_use]
pub fn build_query(location: &ResolvedLocation, category: Category) -> String {
    format!(
        "{} deals near {} singapore",
        category.as_str(),
        location.search_label()
    )
}

#[async_trait]
impl DealSearcher for WebSearchAdapter {
    fn name(&self) -> &'static str {
        PROVIDER
    }

    async fn search(
        &self,
        location: &ResolvedLocation,
        category: Category,
        exclude: &ExclusionSet,
    ) -> Result<Vec<Deal>, DealError> {
        let query = build_query(location, category);
        let items = match self.fetch(&query).await {
            Ok(items) => items,
            Err(e) => {
                tracing::warn!(adapter = PROVIDER, error = %e, "web search failed, returning no candidates");
                return Ok(Vec::new());
            }
        };

        let now = Utc::now();
        let location_key = location.location_key();
        let deals: Vec<Deal> = items
            .into_iter()
            .filter_map(item_to_candidate)
            .map(|c| c.into_deal(PROVIDER, category, &location_key, now))
            .filter(|d| !exclude.excludes(d))
            .collect();
        tracing::debug!(adapter = PROVIDER, %query, candidates = deals.len(), "web search complete");
        Ok(deals)
    }
}

/// Title's leading segment names the business; the snippet's first sentence
/// is the offer. A sentence carrying a postal code becomes the address.
fn item_to_candidate(item: SearchItem) -> Option<Candidate> {
    let cut = TITLE_SEPARATORS
        .iter()
        .filter_map(|sep| item.title.find(sep))
        .min()
        .unwrap_or(item.title.len());
    let business_name = item.title[..cut].trim().to_string();
    if business_name.is_empty() {
        return None;
    }

    let snippet = item.snippet.split_whitespace().collect::<Vec<_>>().join(" ");
    let sentences: Vec<&str> = snippet
        .split(". ")
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();
    let offer: String = sentences.first()?.chars().take(MAX_OFFER_CHARS).collect();
    let address = sentences
        .iter()
        .find(|s| POSTAL_RE.is_match(s))
        .map(|s| (*s).to_string())
        .unwrap_or_default();

    Some(Candidate {
        business_name,
        offer,
        description: snippet.clone(),
        address,
        url: item.link,
        ..Candidate::default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn title_and_snippet_become_a_candidate() {
        let item = SearchItem {
            title: "Kopi Corner | 1-for-1 Kopi Promotion".to_string(),
            link: Some("https://example.sg/kopi".to_string()),
            snippet: "1-for-1 kopi every weekday. Blk 349 Hougang Ave 7 Singapore 530349. Terms apply."
                .to_string(),
        };
        let c = item_to_candidate(item).unwrap();
        assert_eq!(c.business_name, "Kopi Corner");
        assert_eq!(c.offer, "1-for-1 kopi every weekday");
        assert_eq!(c.address, "Blk 349 Hougang Ave 7 Singapore 530349");
        assert_eq!(c.url.as_deref(), Some("https://example.sg/kopi"));
    }

    #[test]
    fn empty_snippet_is_dropped() {
        let item = SearchItem {
            title: "Something".to_string(),
            link: None,
            snippet: "   ".to_string(),
        };
        assert!(item_to_candidate(item).is_none());
    }
}
