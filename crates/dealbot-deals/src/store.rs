//! Deal Store: upsert by `deal_id`, and lookup by resolved location.
//!
//! Both implementations share [`collect_matches`]: each [`DealQueryKey`] is
//! tried in order (postal, address tokens, radius), candidates are checked
//! with the exact predicate in [`crate::matching`], and results are merged
//! with exclusion-aware dedup until `limit` is reached. The Postgres store
//! narrows candidates with indexed prefilter queries first.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;
use dealbot_core::{Category, Deal, DealQueryKey, ExclusionSet, ResolvedLocation, SpatialKey};
use dealbot_db::Bounds;
use sqlx::PgPool;

use crate::error::DealError;
use crate::matching::{matches_spatial, tokenize};

/// Prefilter rows fetched per predicate, as a multiple of `limit`.
const PREFILTER_FACTOR: usize = 8;
const PREFILTER_MIN: usize = 50;

#[async_trait]
pub trait DealStore: Send + Sync {
    /// Upsert keyed by `deal_id`. Last writer wins.
    async fn put(&self, deal: &Deal) -> Result<(), DealError>;

    async fn put_many(&self, deals: &[Deal]) -> Result<u64, DealError> {
        for deal in deals {
            self.put(deal).await?;
        }
        Ok(deals.len() as u64)
    }

    /// Up to `limit` deals in `category` near `location`, none of which
    /// collide with `exclude`.
    async fn find_by_location(
        &self,
        location: &ResolvedLocation,
        category: Category,
        exclude: &ExclusionSet,
        limit: usize,
    ) -> Result<Vec<Deal>, DealError>;
}

/// Merge predicate results in key order, skipping excluded and repeated deals.
///
/// `fetch` returns the candidates for one key; they are re-checked against
/// the exact predicate so prefilters may over-select.
///
/// # Errors
///
/// Propagates the first error from `fetch`.
pub async fn collect_matches<F, Fut>(
    keys: &[DealQueryKey],
    exclude: &ExclusionSet,
    limit: usize,
    mut fetch: F,
) -> Result<Vec<Deal>, DealError>
where
    F: FnMut(&DealQueryKey) -> Fut,
    Fut: std::future::Future<Output = Result<Vec<Deal>, DealError>>,
{
    let mut seen = exclude.clone();
    let mut out = Vec::with_capacity(limit);
    for key in keys {
        if out.len() >= limit {
            break;
        }
        let mut candidates: Vec<Deal> = fetch(key)
            .await?
            .into_iter()
            .filter(|d| d.category == key.category && matches_spatial(d, &key.spatial))
            .collect();
        if let SpatialKey::CoordRadius {
            latitude,
            longitude,
            ..
        } = key.spatial
        {
            candidates.sort_by(|a, b| {
                let da = a.distance_km(latitude, longitude).unwrap_or(f64::INFINITY);
                let db = b.distance_km(latitude, longitude).unwrap_or(f64::INFINITY);
                da.total_cmp(&db)
            });
        }
        for deal in candidates {
            if out.len() >= limit {
                break;
            }
            if seen.admit(&deal) {
                out.push(deal);
            }
        }
    }
    Ok(out)
}

/// Process-local store. Deals are kept ordered by `deal_id` so lookups are
/// deterministic.
#[derive(Debug, Default)]
pub struct MemoryDealStore {
    deals: RwLock<BTreeMap<String, Deal>>,
    lookups: AtomicUsize,
}

impl MemoryDealStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_deals(deals: impl IntoIterator<Item = Deal>) -> Self {
        let store = Self::new();
        {
            let mut map = store.deals.write().unwrap_or_else(PoisonError::into_inner);
            for deal in deals {
                map.insert(deal.deal_id.clone(), deal);
            }
        }
        store
    }

    #[must_use]
    pub fn get(&self, deal_id: &str) -> Option<Deal> {
        self.deals
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(deal_id)
            .cloned()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.deals.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of `find_by_location` calls served.
    #[must_use]
    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }

    fn snapshot(&self, category: Category) -> Vec<Deal> {
        self.deals
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter(|d| d.category == category)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl DealStore for MemoryDealStore {
    async fn put(&self, deal: &Deal) -> Result<(), DealError> {
        self.deals
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(deal.deal_id.clone(), deal.clone());
        Ok(())
    }

    async fn find_by_location(
        &self,
        location: &ResolvedLocation,
        category: Category,
        exclude: &ExclusionSet,
        limit: usize,
    ) -> Result<Vec<Deal>, DealError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        let keys = DealQueryKey::for_location(location, category);
        let all = self.snapshot(category);
        collect_matches(&keys, exclude, limit, |_| {
            let all = all.clone();
            async move { Ok::<_, DealError>(all) }
        })
        .await
    }
}

/// Store backed by the `deals` table.
#[derive(Debug, Clone)]
pub struct PgDealStore {
    pool: PgPool,
}

impl PgDealStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn prefilter(&self, key: &DealQueryKey, limit: i64) -> Result<Vec<Deal>, DealError> {
        let deals = match &key.spatial {
            SpatialKey::PostalCode(postal) => {
                dealbot_db::list_deals_by_postal(&self.pool, key.category, postal, limit).await?
            }
            SpatialKey::AreaToken { road_name, .. } => {
                let Some(fragment) = road_fragment(road_name) else {
                    return Ok(Vec::new());
                };
                dealbot_db::list_deals_by_road(&self.pool, key.category, &fragment, limit).await?
            }
            SpatialKey::CoordRadius {
                latitude,
                longitude,
                radius_km,
            } => {
                let bounds = Bounds::around(*latitude, *longitude, *radius_km);
                dealbot_db::list_deals_in_bounds(&self.pool, key.category, bounds, limit).await?
            }
        };
        Ok(deals)
    }
}

#[async_trait]
impl DealStore for PgDealStore {
    async fn put(&self, deal: &Deal) -> Result<(), DealError> {
        dealbot_db::upsert_deals(&self.pool, std::slice::from_ref(deal)).await?;
        Ok(())
    }

    async fn put_many(&self, deals: &[Deal]) -> Result<u64, DealError> {
        if deals.is_empty() {
            return Ok(0);
        }
        Ok(dealbot_db::upsert_deals(&self.pool, deals).await?)
    }

    async fn find_by_location(
        &self,
        location: &ResolvedLocation,
        category: Category,
        exclude: &ExclusionSet,
        limit: usize,
    ) -> Result<Vec<Deal>, DealError> {
        let keys = DealQueryKey::for_location(location, category);
        let fetch_limit =
            i64::try_from((limit * PREFILTER_FACTOR).max(PREFILTER_MIN)).unwrap_or(i64::MAX);
        collect_matches(&keys, exclude, limit, |key| {
            let key = key.clone();
            async move { self.prefilter(&key, fetch_limit).await }
        })
        .await
    }
}

/// Most selective road-name word for an `ILIKE` prefilter: the longest
/// alphabetic token that is not itself a street-type word.
fn road_fragment(road_name: &str) -> Option<String> {
    road_name
        .split_whitespace()
        .filter(|w| w.chars().all(char::is_alphabetic))
        .filter(|w| tokenize(w).first().is_some_and(|t| t == &w.to_lowercase()))
        .max_by_key(|w| w.len())
        .or_else(|| road_name.split_whitespace().next())
        .map(str::to_string)
}
