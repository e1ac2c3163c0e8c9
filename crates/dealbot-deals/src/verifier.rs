//! AI Verifier: a chat model filters candidate deals down to plausible ones.
//!
//! The model is only trusted to *remove* candidates. [`verify_or_pass_through`]
//! intersects its answer with the input by `(businessName, offer)` so a
//! reply can never add a deal, and degrades to passing the input through
//! unverified when the call fails.

use std::collections::HashSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dealbot_core::{CallPolicy, Deal, DealKey, ResolvedLocation};
use dealbot_geo::NearbyPlace;

use crate::candidate::Candidate;
use crate::error::DealError;
use crate::llm::{extract_json_array, ChatClient};

const SYSTEM_PROMPT: &str = "You verify local deals for a Singapore deals assistant. \
Reply with a JSON array only, no prose.";

#[async_trait]
pub trait DealVerifier: Send + Sync {
    /// Candidates the verifier accepts, identified by name and offer.
    async fn verify(
        &self,
        candidates: &[Deal],
        location: &ResolvedLocation,
        nearby: &[NearbyPlace],
    ) -> Result<Vec<DealKey>, DealError>;
}

pub struct LlmVerifier {
    chat: ChatClient,
}

impl LlmVerifier {
    #[must_use]
    pub fn new(chat: ChatClient) -> Self {
        Self { chat }
    }
}

#[must_use]
pub fn build_prompt(candidates: &[Deal], location: &ResolvedLocation, nearby: &[NearbyPlace]) -> String {
    let mut prompt = format!(
        "User location: {} (postal code {}).\n\nCandidate deals:\n",
        location.formatted_address,
        if location.postal_code.is_empty() {
            "unknown"
        } else {
            location.postal_code.as_str()
        }
    );
    for (i, deal) in candidates.iter().enumerate() {
        prompt.push_str(&format!(
            "{}. businessName: {:?}; offer: {:?}; address: {:?}; category: {}\n",
            i + 1,
            deal.business_name,
            deal.offer,
            deal.address,
            deal.category.as_str()
        ));
    }
    prompt.push_str("\nBusinesses independently known to be nearby:\n");
    if nearby.is_empty() {
        prompt.push_str("(none available)\n");
    }
    for place in nearby {
        prompt.push_str("- ");
        prompt.push_str(&place.name);
        if let Some(vicinity) = &place.vicinity {
            prompt.push_str(" (");
            prompt.push_str(vicinity);
            prompt.push(')');
        }
        prompt.push('\n');
    }
    prompt.push_str(
        "\nKeep only deals that have a plausible business name, an address within \
         reasonable distance of the user, a realistic offer, fit their category, \
         and are complete. Return the kept deals as a JSON array of objects with \
         \"businessName\" and \"offer\" copied exactly from the list. Return [] if none qualify.",
    );
    prompt
}

#[async_trait]
impl DealVerifier for LlmVerifier {
    async fn verify(
        &self,
        candidates: &[Deal],
        location: &ResolvedLocation,
        nearby: &[NearbyPlace],
    ) -> Result<Vec<DealKey>, DealError> {
        let prompt = build_prompt(candidates, location, nearby);
        let reply = self.chat.complete(SYSTEM_PROMPT, &prompt).await?;
        let items = extract_json_array(&reply).ok_or(DealError::MalformedReply {
            provider: self.chat.provider().as_str(),
            reason: "no JSON array",
        })?;
        Ok(Candidate::from_values(&items)
            .into_iter()
            .map(|c| DealKey::new(&c.business_name, &c.offer))
            .collect())
    }
}

/// Result of the verification step.
#[derive(Debug, Clone, PartialEq)]
pub struct VerifyOutcome {
    pub deals: Vec<Deal>,
    /// `true` when the verifier was unavailable and `deals` is the unverified input.
    pub passed_through: bool,
}

/// Run `verifier` under `policy` and intersect its answer with `candidates`.
///
/// Survivors are marked verified at `now`. A missing verifier, a timeout or
/// any failure passes `candidates` through with `verified = false`.
pub async fn verify_or_pass_through(
    verifier: Option<&dyn DealVerifier>,
    policy: &CallPolicy,
    candidates: Vec<Deal>,
    location: &ResolvedLocation,
    nearby: &[NearbyPlace],
    now: DateTime<Utc>,
) -> VerifyOutcome {
    if candidates.is_empty() {
        return VerifyOutcome {
            deals: candidates,
            passed_through: false,
        };
    }
    let Some(verifier) = verifier else {
        tracing::warn!(adapter = "verifier", "no verifier configured, passing candidates through unverified");
        return pass_through(candidates);
    };

    match policy
        .run("verify_deals", || verifier.verify(&candidates, location, nearby))
        .await
    {
        Ok(accepted) => {
            let accepted: HashSet<DealKey> = accepted.into_iter().collect();
            let before = candidates.len();
            let deals: Vec<Deal> = candidates
                .into_iter()
                .filter(|d| accepted.contains(&d.key()))
                .map(|d| d.into_verified(now))
                .collect();
            tracing::info!(candidates = before, verified = deals.len(), "verification complete");
            VerifyOutcome {
                deals,
                passed_through: false,
            }
        }
        Err(e) => {
            tracing::warn!(adapter = "verifier", error = %e, "verification failed, passing candidates through unverified");
            pass_through(candidates)
        }
    }
}

fn pass_through(candidates: Vec<Deal>) -> VerifyOutcome {
    VerifyOutcome {
        deals: candidates
            .into_iter()
            .map(|mut d| {
                d.verified = false;
                d.verified_at = None;
                d
            })
            .collect(),
        passed_through: true,
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use dealbot_core::{Category, LocationSource};

    use super::*;

    fn location() -> ResolvedLocation {
        ResolvedLocation {
            latitude: 1.3521,
            longitude: 103.8198,
            postal_code: "570150".to_string(),
            address: "150 BISHAN STREET 11".to_string(),
            road_name: "BISHAN STREET 11".to_string(),
            building: None,
            blk_no: Some("150".to_string()),
            area: Some("Bishan".to_string()),
            display_name: "150 BISHAN STREET 11".to_string(),
            formatted_address: "150 Bishan St 11, Singapore 570150".to_string(),
            source: LocationSource::DbExact,
            warning: None,
        }
    }

    fn deal(name: &str, offer: &str) -> Deal {
        Deal::new("test", Category::Food, name, offer, "570150", Utc::now())
    }

    struct Fixed(Result<Vec<DealKey>, ()>);

    #[async_trait]
    impl DealVerifier for Fixed {
        async fn verify(
            &self,
            _: &[Deal],
            _: &ResolvedLocation,
            _: &[NearbyPlace],
        ) -> Result<Vec<DealKey>, DealError> {
            self.0.clone().map_err(|()| DealError::NotFound)
        }
    }

    fn policy() -> CallPolicy {
        CallPolicy::once(Duration::from_secs(1))
    }

    #[tokio::test]
    async fn fabricated_deals_are_dropped_by_intersection() {
        let verifier = Fixed(Ok(vec![
            DealKey::new("kopi corner", "1-for-1 KOPI"),
            DealKey::new("Invented Place", "free everything"),
        ]));
        let outcome = verify_or_pass_through(
            Some(&verifier),
            &policy(),
            vec![deal("Kopi Corner", "1-for-1 kopi"), deal("Imaginary Diner", "50% off")],
            &location(),
            &[],
            Utc::now(),
        )
        .await;

        assert!(!outcome.passed_through);
        assert_eq!(outcome.deals.len(), 1);
        assert_eq!(outcome.deals[0].business_name, "Kopi Corner");
        assert!(outcome.deals[0].verified);
        assert!(outcome.deals[0].verified_at.is_some());
    }

    #[tokio::test]
    async fn failure_passes_input_through_unverified() {
        let outcome = verify_or_pass_through(
            Some(&Fixed(Err(()))),
            &policy(),
            vec![deal("Kopi Corner", "1-for-1 kopi")],
            &location(),
            &[],
            Utc::now(),
        )
        .await;
        assert!(outcome.passed_through);
        assert_eq!(outcome.deals.len(), 1);
        assert!(!outcome.deals[0].verified);
    }

    #[test]
    fn prompt_enumerates_candidates_and_nearby_places() {
        let prompt = build_prompt(
            &[deal("Kopi Corner", "1-for-1 kopi")],
            &location(),
            &[NearbyPlace {
                name: "Kopi Corner".to_string(),
                vicinity: Some("Bishan St 11".to_string()),
                latitude: None,
                longitude: None,
            }],
        );
        assert!(prompt.contains("1. businessName: \"Kopi Corner\""));
        assert!(prompt.contains("- Kopi Corner (Bishan St 11)"));
    }
}
