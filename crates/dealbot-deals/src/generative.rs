//! Generative adapter: asks a chat model for current deals near a location.

use async_trait::async_trait;
use chrono::Utc;
use dealbot_core::{Category, Deal, ExclusionSet, ResolvedLocation};

use crate::candidate::Candidate;
use crate::error::{DealError, LlmError};
use crate::llm::{extract_json_array, ChatClient};
use crate::searcher::DealSearcher;

/// Upper bound on deals requested per prompt.
pub const MAX_GENERATED_DEALS: usize = 5;

const SYSTEM_PROMPT: &str = "You are a local deals researcher for Singapore. \
Reply with a JSON array only, no prose.";

pub struct GenerativeAdapter {
    chat: ChatClient,
    max_deals: usize,
}

impl GenerativeAdapter {
    #[must_use]
    pub fn new(chat: ChatClient) -> Self {
        Self {
            chat,
            max_deals: MAX_GENERATED_DEALS,
        }
    }

    #[must_use]
    pub fn with_max_deals(mut self, max_deals: usize) -> Self {
        self.max_deals = max_deals.max(1);
        self
    }

    fn source(&self) -> &'static str {
        self.chat.provider().as_str()
    }
}

/// User prompt naming the location, category, exclusions and output schema.
#[must_use]
pub fn build_prompt(
    location: &ResolvedLocation,
    category: Category,
    exclude_names: &[String],
    max_deals: usize,
) -> String {
    let mut prompt = format!(
        "List up to {max_deals} real, currently running {category} deals ({label}) \
         within 2 km of {address} (postal code {postal}, Singapore; \
         coordinates {lat:.6}, {lon:.6}).\n",
        category = category.as_str(),
        label = category.label(),
        address = location.formatted_address,
        postal = if location.postal_code.is_empty() {
            "unknown"
        } else {
            location.postal_code.as_str()
        },
        lat = location.latitude,
        lon = location.longitude,
    );
    if !exclude_names.is_empty() {
        prompt.push_str("Do not include these businesses: ");
        prompt.push_str(&exclude_names.join(", "));
        prompt.push_str(".\n");
    }
    prompt.push_str(
        "Respond with a JSON array of objects with exactly these fields: \
         \"businessName\" (string), \"offer\" (string), \"description\" (string), \
         \"address\" (string, full street address with postal code), \
         \"latitude\" (number), \"longitude\" (number), \"contact\" (string or null), \
         \"validity\" (string, YYYY-MM-DD or null), \"price\" (string or null).\n\
         If you know of no deals, respond with [].",
    );
    prompt
}

#[async_trait]
impl DealSearcher for GenerativeAdapter {
    fn name(&self) -> &'static str {
        "generative"
    }

    async fn search(
        &self,
        location: &ResolvedLocation,
        category: Category,
        exclude: &ExclusionSet,
    ) -> Result<Vec<Deal>, DealError> {
        let mut exclude_names: Vec<String> =
            exclude.keys().map(|k| k.business_name.clone()).collect();
        exclude_names.sort();
        exclude_names.dedup();
        let prompt = build_prompt(location, category, &exclude_names, self.max_deals);
        let reply = match self.chat.complete(SYSTEM_PROMPT, &prompt).await {
            Ok(reply) => reply,
            Err(e @ LlmError::UnsupportedParameter { .. }) => {
                tracing::warn!(
                    adapter = self.source(),
                    model = self.chat.model(),
                    error = %e,
                    "model rejected a request field, returning no candidates"
                );
                return Ok(Vec::new());
            }
            Err(e) => return Err(e.into()),
        };

        let Some(items) = extract_json_array(&reply) else {
            tracing::warn!(adapter = self.source(), "model reply had no JSON array, returning no candidates");
            return Ok(Vec::new());
        };

        let now = Utc::now();
        let location_key = location.location_key();
        let deals: Vec<Deal> = Candidate::from_values(&items)
            .into_iter()
            .take(self.max_deals)
            .map(|c| c.into_deal(self.source(), category, &location_key, now))
            .filter(|d| !exclude.excludes(d))
            .collect();
        tracing::debug!(adapter = self.source(), candidates = deals.len(), "generative search complete");
        Ok(deals)
    }
}

#[cfg(test)]
mod tests {
    use dealbot_core::{LocationSource, ResolvedLocation};

    use super::*;

    fn location() -> ResolvedLocation {
        ResolvedLocation {
            latitude: 1.371_834,
            longitude: 103.899_556,
            postal_code: "530349".to_string(),
            address: "349 HOUGANG AVENUE 7".to_string(),
            road_name: "HOUGANG AVENUE 7".to_string(),
            building: None,
            blk_no: Some("349".to_string()),
            area: Some("Hougang".to_string()),
            display_name: "349 HOUGANG AVENUE 7".to_string(),
            formatted_address: "349 Hougang Ave 7, Singapore 530349".to_string(),
            source: LocationSource::DbExact,
            warning: None,
        }
    }

    #[test]
    fn prompt_names_location_category_and_schema() {
        let prompt = build_prompt(&location(), Category::Food, &[], 5);
        assert!(prompt.contains("up to 5"));
        assert!(prompt.contains("food deals"));
        assert!(prompt.contains("530349"));
        assert!(prompt.contains("\"businessName\""));
    }

    #[test]
    fn prompt_lists_exclusions() {
        let prompt = build_prompt(
            &location(),
            Category::Food,
            &["Kopi Corner".to_string()],
            3,
        );
        assert!(prompt.contains("Do not include these businesses: Kopi Corner."));
    }
}
