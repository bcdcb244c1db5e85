/// Listing of every valid identity under the content root
use super::{normalize_identity, ConfigStore, IdentityResolver, IdentitySummary};
use crate::{
    cache::{ExpiringCache, RefreshFn, RefreshFuture},
    error::GateResult,
};
use futures::{future::join_all, FutureExt};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

const CACHE_KEY: &str = "available_identities";

/// Enumerates identities and projects them to summaries
pub struct IdentityCatalog {
    resolver: IdentityResolver,
    cache: Arc<ExpiringCache<Arc<Vec<IdentitySummary>>>>,
}

impl IdentityCatalog {
    pub fn new(resolver: IdentityResolver, ttl: Duration) -> Self {
        Self::with_cache(resolver, Arc::new(ExpiringCache::new("identity_list", ttl)))
    }

    pub fn with_cache(
        resolver: IdentityResolver,
        cache: Arc<ExpiringCache<Arc<Vec<IdentitySummary>>>>,
    ) -> Self {
        Self { resolver, cache }
    }

    pub fn cache(&self) -> Arc<ExpiringCache<Arc<Vec<IdentitySummary>>>> {
        Arc::clone(&self.cache)
    }

    /// Summaries of every valid identity, sorted by key
    pub async fn list_identities(&self) -> GateResult<Arc<Vec<IdentitySummary>>> {
        if let Some(cached) = self.cache.get(CACHE_KEY).await {
            return Ok(cached);
        }

        let listing = Arc::new(build_listing(&self.resolver).await?);

        let resolver = self.resolver.clone();
        let refresh: RefreshFn<Arc<Vec<IdentitySummary>>> =
            Arc::new(move || -> RefreshFuture<Arc<Vec<IdentitySummary>>> {
                let resolver = resolver.clone();
                async move { build_listing(&resolver).await.map(Arc::new) }.boxed()
            });
        self.cache
            .set_with_refresh(CACHE_KEY, Arc::clone(&listing), None, refresh)
            .await;

        Ok(listing)
    }
}

/// One identity's contribution to the listing.
///
/// Incomplete directories are skipped; a load error yields the fallback summary.
async fn summarize(store: &ConfigStore, resolver: &IdentityResolver, identity: String) -> Option<IdentitySummary> {
    match store.validate_identity_dir(&identity).await {
        Ok(Some(_)) => {}
        Ok(None) => {
            debug!("Skipping incomplete identity directory {}", identity);
            return None;
        }
        Err(e) => {
            warn!("Failed to inspect identity {}: {}", identity, e);
            return Some(IdentitySummary::fallback(&identity));
        }
    }

    match resolver.resolve(&identity).await {
        Ok(Some(config)) => Some(config.summary()),
        Ok(None) => None,
        Err(e) => {
            warn!("Failed to get config for {}: {}", identity, e);
            Some(IdentitySummary::fallback(&identity))
        }
    }
}

async fn build_listing(resolver: &IdentityResolver) -> GateResult<Vec<IdentitySummary>> {
    let store = resolver.store();

    let mut keys: Vec<String> = store
        .list_root()
        .await?
        .into_iter()
        .filter(|entry| entry.is_dir)
        .map(|entry| normalize_identity(&entry.name))
        .collect();
    keys.sort();
    keys.dedup();

    let summaries = join_all(keys.into_iter().map(|key| summarize(store, resolver, key))).await;
    let listing: Vec<IdentitySummary> = summaries.into_iter().flatten().collect();

    debug!("Listed {} identities", listing.len());
    Ok(listing)
}
