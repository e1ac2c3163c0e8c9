use async_trait::async_trait;
use dealbot_core::{Category, Deal, ExclusionSet, ResolvedLocation};

use crate::error::DealError;

/// An external source of candidate deals.
///
/// Implementations are stateless. Their documented degradations (HTTP
/// failure, unusable body) yield `Ok(vec![])`; `Err` is reserved for
/// failures the caller should log.
#[async_trait]
pub trait DealSearcher: Send + Sync {
    fn name(&self) -> &'static str;

    async fn search(
        &self,
        location: &ResolvedLocation,
        category: Category,
        exclude: &ExclusionSet,
    ) -> Result<Vec<Deal>, DealError>;
}
