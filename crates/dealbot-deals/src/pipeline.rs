//! Deal Pipeline: store lookup, external search, verification, persistence
//! and ranking for one user request.

use std::sync::Arc;

use dealbot_core::{
    local_offset, AppConfig, CallPolicy, Category, Clock, Deal, ExclusionSet, ResolvedLocation,
    SystemClock, UserSession,
};
use dealbot_geo::{GeoResolver, NearbyPlace, NearbyPlacesProvider};

use crate::error::DealError;
use crate::scoring::rank;
use crate::searcher::DealSearcher;
use crate::session::SessionManager;
use crate::store::DealStore;
use crate::verifier::{verify_or_pass_through, DealVerifier};

/// Call policies for each external dependency of the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelinePolicies {
    pub store: CallPolicy,
    pub search: CallPolicy,
    pub verify: CallPolicy,
    pub places: CallPolicy,
}

impl PipelinePolicies {
    #[must_use]
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            store: config.store_policy(),
            search: config.search_policy(),
            verify: config.verify_policy(),
            places: config.geocode_policy(),
        }
    }
}

pub struct DealPipeline {
    store: Arc<dyn DealStore>,
    resolver: Arc<GeoResolver>,
    sessions: Arc<SessionManager>,
    web_search: Option<Arc<dyn DealSearcher>>,
    generative: Option<Arc<dyn DealSearcher>>,
    verifier: Option<Arc<dyn DealVerifier>>,
    places: Option<Arc<dyn NearbyPlacesProvider>>,
    policies: PipelinePolicies,
    clock: Arc<dyn Clock>,
}

impl DealPipeline {
    #[must_use]
    pub fn new(
        store: Arc<dyn DealStore>,
        resolver: Arc<GeoResolver>,
        sessions: Arc<SessionManager>,
        policies: PipelinePolicies,
    ) -> Self {
        Self {
            store,
            resolver,
            sessions,
            web_search: None,
            generative: None,
            verifier: None,
            places: None,
            policies,
            clock: Arc::new(SystemClock),
        }
    }

    #[must_use]
    pub fn with_web_search(mut self, searcher: Arc<dyn DealSearcher>) -> Self {
        self.web_search = Some(searcher);
        self
    }

    #[must_use]
    pub fn with_generative(mut self, searcher: Arc<dyn DealSearcher>) -> Self {
        self.generative = Some(searcher);
        self
    }

    #[must_use]
    pub fn with_verifier(mut self, verifier: Arc<dyn DealVerifier>) -> Self {
        self.verifier = Some(verifier);
        self
    }

    #[must_use]
    pub fn with_places(mut self, places: Arc<dyn NearbyPlacesProvider>) -> Self {
        self.places = Some(places);
        self
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    #[must_use]
    pub fn sessions(&self) -> &Arc<SessionManager> {
        &self.sessions
    }

    #[must_use]
    pub fn resolver(&self) -> &Arc<GeoResolver> {
        &self.resolver
    }

    /// Resolve `(latitude, longitude)` then run [`Self::get_deals`] with an
    /// empty exclusion set.
    ///
    /// # Errors
    ///
    /// - [`DealError::Geo`] when the coordinates are invalid, out of region,
    ///   or unresolvable. No store query is issued in that case.
    /// - [`DealError::NotFound`] when nothing matched.
    pub async fn discover(
        &self,
        user_id: &str,
        latitude: f64,
        longitude: f64,
        category: Category,
        limit: usize,
    ) -> Result<Vec<Deal>, DealError> {
        let location = self.resolver.resolve(latitude, longitude).await?;
        self.get_deals(user_id, &location, category, &ExclusionSet::new(), limit)
            .await
    }

    /// Serialised per user: waits for any other handler holding this
    /// user's session, then runs [`Self::get_deals_locked`] and persists
    /// the session snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`DealError::NotFound`] when every strategy came back empty.
    pub async fn get_deals(
        &self,
        user_id: &str,
        location: &ResolvedLocation,
        category: Category,
        exclude: &ExclusionSet,
        limit: usize,
    ) -> Result<Vec<Deal>, DealError> {
        let mut session = self.sessions.lock(user_id, self.clock.now()).await;
        let result = self
            .get_deals_locked(&mut session, location, category, exclude, limit)
            .await;
        if let Err(e) = self.sessions.persist(&session).await {
            tracing::warn!(user_id, error = %e, "failed to persist session snapshot");
        }
        result
    }

    /// The pipeline body, for callers that already hold the session.
    ///
    /// On success `session.last_deals` holds the returned deals in order.
    ///
    /// # Errors
    ///
    /// Returns [`DealError::NotFound`] when every strategy came back empty.
    pub async fn get_deals_locked(
        &self,
        session: &mut UserSession,
        location: &ResolvedLocation,
        category: Category,
        exclude: &ExclusionSet,
        limit: usize,
    ) -> Result<Vec<Deal>, DealError> {
        let user_id = session.user_id.clone();
        session.category = Some(category);
        session.resolved_location = Some(location.clone());

        let primary = self.find_primary(location, category, exclude, limit).await;
        tracing::info!(
            user_id = %user_id,
            category = %category,
            postal = %location.postal_code,
            primary = primary.len(),
            "deal store lookup complete"
        );

        let mut external = Vec::new();
        if primary.len() < limit {
            let mut seen = exclude.clone();
            seen.extend(&primary);
            external = self.search_external(location, category, &seen).await;
        }

        let mut combined = primary;
        if !external.is_empty() {
            let nearby = self.nearby_places(location, category).await;
            let outcome = verify_or_pass_through(
                self.verifier.as_deref(),
                &self.policies.verify,
                external,
                location,
                &nearby,
                self.clock.now(),
            )
            .await;
            if !outcome.passed_through {
                self.persist_verified(&outcome.deals).await;
            }
            combined.extend(outcome.deals);
        }

        combined.retain(|d| !exclude.excludes(d));
        let today = self.clock.now().with_timezone(&local_offset()).date_naive();
        let ranked = rank(combined, location, limit, today);
        if ranked.is_empty() {
            tracing::info!(user_id = %user_id, category = %category, "no deals found");
            return Err(DealError::NotFound);
        }

        session.set_last_deals(ranked.clone(), limit, self.clock.now());
        Ok(ranked)
    }

    async fn find_primary(
        &self,
        location: &ResolvedLocation,
        category: Category,
        exclude: &ExclusionSet,
        limit: usize,
    ) -> Vec<Deal> {
        match self
            .policies
            .store
            .run("deal_store.find", || {
                self.store.find_by_location(location, category, exclude, limit)
            })
            .await
        {
            Ok(deals) => deals,
            Err(e) => {
                tracing::warn!(adapter = "deal_store", error = %e, "store lookup failed, continuing with external search");
                Vec::new()
            }
        }
    }

    /// Both searchers in parallel, merged and deduplicated against `seen`.
    async fn search_external(
        &self,
        location: &ResolvedLocation,
        category: Category,
        seen: &ExclusionSet,
    ) -> Vec<Deal> {
        let (web, generated) = tokio::join!(
            self.run_searcher(self.web_search.as_deref(), location, category, seen),
            self.run_searcher(self.generative.as_deref(), location, category, seen),
        );

        let mut seen = seen.clone();
        let merged: Vec<Deal> = web
            .into_iter()
            .chain(generated)
            .filter(|d| seen.admit(d))
            .collect();
        tracing::debug!(candidates = merged.len(), "external search merged");
        merged
    }

    async fn run_searcher(
        &self,
        searcher: Option<&dyn DealSearcher>,
        location: &ResolvedLocation,
        category: Category,
        exclude: &ExclusionSet,
    ) -> Vec<Deal> {
        let Some(searcher) = searcher else {
            return Vec::new();
        };
        match self
            .policies
            .search
            .run("deal_search", || searcher.search(location, category, exclude))
            .await
        {
            Ok(deals) => deals,
            Err(e) => {
                tracing::warn!(adapter = searcher.name(), error = %e, "searcher failed, treating as empty");
                Vec::new()
            }
        }
    }

    async fn nearby_places(&self, location: &ResolvedLocation, category: Category) -> Vec<NearbyPlace> {
        let Some(places) = &self.places else {
            return Vec::new();
        };
        match self
            .policies
            .places
            .run("nearby_places", || {
                places.nearby(location.latitude, location.longitude, category)
            })
            .await
        {
            Ok(found) => found,
            Err(e) => {
                tracing::warn!(adapter = "nearby_places", error = %e, "nearby places unavailable");
                Vec::new()
            }
        }
    }

    async fn persist_verified(&self, deals: &[Deal]) {
        let verified: Vec<Deal> = deals.iter().filter(|d| d.verified).cloned().collect();
        if verified.is_empty() {
            return;
        }
        match self
            .policies
            .store
            .run("deal_store.put", || self.store.put_many(&verified))
            .await
        {
            Ok(written) => tracing::info!(written, "persisted verified deals"),
            Err(e) => {
                tracing::warn!(adapter = "deal_store", error = %e, "failed to persist verified deals");
            }
        }
    }
}
