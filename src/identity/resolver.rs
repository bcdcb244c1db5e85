/// Cached identity config lookup
use super::{normalize_identity, ConfigStore, IdentityConfig};
use crate::{
    cache::{ExpiringCache, RefreshFn, RefreshFuture},
    error::{GateError, GateResult},
};
use futures::FutureExt;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Combines the [`ConfigStore`] with an [`ExpiringCache`]
#[derive(Clone)]
pub struct IdentityResolver {
    store: Arc<ConfigStore>,
    cache: Arc<ExpiringCache<Arc<IdentityConfig>>>,
}

fn cache_key(normalized: &str) -> String {
    format!("identity_config_{}", normalized)
}

impl IdentityResolver {
    pub fn new(store: Arc<ConfigStore>, ttl: Duration) -> Self {
        Self::with_cache(store, Arc::new(ExpiringCache::new("identity_config", ttl)))
    }

    pub fn with_cache(store: Arc<ConfigStore>, cache: Arc<ExpiringCache<Arc<IdentityConfig>>>) -> Self {
        Self { store, cache }
    }

    pub fn store(&self) -> &Arc<ConfigStore> {
        &self.store
    }

    pub fn cache(&self) -> Arc<ExpiringCache<Arc<IdentityConfig>>> {
        Arc::clone(&self.cache)
    }

    /// Resolve an identity config
    ///
    /// Resolution order:
    /// 1. Check cache first (fast path)
    /// 2. Load from the content root
    /// 3. Cache the loaded config with a producer that reloads it
    ///
    /// Not-found results are not cached.
    pub async fn resolve(&self, identity: &str) -> GateResult<Option<Arc<IdentityConfig>>> {
        let normalized = normalize_identity(identity);
        let key = cache_key(&normalized);

        if let Some(cached) = self.cache.get(&key).await {
            return Ok(Some(cached));
        }

        let Some(config) = self.store.load_identity_config(&normalized).await? else {
            return Ok(None);
        };
        let config = Arc::new(config);

        self.cache
            .set_with_refresh(&key, Arc::clone(&config), None, self.refresher(normalized))
            .await;

        Ok(Some(config))
    }

    /// Like [`resolve`](Self::resolve), with a missing identity as `NotFound`
    pub async fn require(&self, identity: &str) -> GateResult<Arc<IdentityConfig>> {
        self.resolve(identity)
            .await?
            .ok_or_else(|| GateError::NotFound(format!("Identity {} not found", identity)))
    }

    /// Drop the cached config so the next lookup reloads it
    pub async fn invalidate(&self, identity: &str) {
        self.cache.delete(&cache_key(&normalize_identity(identity))).await;
    }

    fn refresher(&self, normalized: String) -> RefreshFn<Arc<IdentityConfig>> {
        let store = Arc::clone(&self.store);
        Arc::new(move || -> RefreshFuture<Arc<IdentityConfig>> {
            let store = Arc::clone(&store);
            let identity = normalized.clone();
            async move {
                debug!("Reloading identity config for {}", identity);
                // A vanished identity keeps its stale entry until it expires
                store
                    .load_identity_config(&identity)
                    .await?
                    .map(Arc::new)
                    .ok_or_else(|| GateError::NotFound(format!("Identity {} no longer exists", identity)))
            }
            .boxed()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::ManualClock;
    use crate::content::{testing::CountingSource, DiskContentSource};
    use tempfile::tempdir;

    const TTL: Duration = Duration::from_secs(600);

    fn write_identity(root: &std::path::Path, name: &str, group_name: &str) {
        let dir = root.join(name);
        std::fs::create_dir_all(dir.join("locales")).unwrap();
        std::fs::write(dir.join("qrcode.png"), "png").unwrap();
        std::fs::write(
            dir.join("locales/zh-CN.yml"),
            format!("verify:\n  groupName: {}\n", group_name),
        )
        .unwrap();
    }

    #[tokio::test]
    async fn test_second_resolve_hits_cache_without_disk_access() {
        let root = tempdir().unwrap();
        write_identity(root.path(), "chess", "Chess");

        let counting = Arc::new(CountingSource::new(Arc::new(DiskContentSource::new())));
        let store = Arc::new(ConfigStore::new(Some(root.path().to_path_buf()), counting.clone()));
        let resolver = IdentityResolver::new(store, TTL);

        let first = resolver.resolve("chess").await.unwrap().unwrap();
        let calls = counting.calls();
        assert!(calls > 0);

        let second = resolver.resolve("CHESS").await.unwrap().unwrap();
        assert_eq!(counting.calls(), calls);
        assert_eq!(*first, *second);
        assert_eq!(serde_json::to_vec(&*first).unwrap(), serde_json::to_vec(&*second).unwrap());
    }

    #[tokio::test]
    async fn test_missing_identity_is_none_and_require_is_not_found() {
        let root = tempdir().unwrap();
        let store = Arc::new(ConfigStore::new(Some(root.path().to_path_buf()), Arc::new(DiskContentSource::new())));
        let resolver = IdentityResolver::new(store, TTL);

        assert!(resolver.resolve("ghost").await.unwrap().is_none());
        assert!(matches!(resolver.require("ghost").await, Err(GateError::NotFound(_))));
        assert!(resolver.cache().is_empty().await);
    }

    #[tokio::test]
    async fn test_background_refresh_picks_up_changes() {
        let root = tempdir().unwrap();
        write_identity(root.path(), "chess", "Before");

        let clock = Arc::new(ManualClock::new());
        let cache = Arc::new(ExpiringCache::with_clock("identity_config", TTL, clock.clone()));
        let store = Arc::new(ConfigStore::new(Some(root.path().to_path_buf()), Arc::new(DiskContentSource::new())));
        let resolver = IdentityResolver::with_cache(store, cache.clone());

        assert_eq!(resolver.resolve("chess").await.unwrap().unwrap().group_name, "Before");

        write_identity(root.path(), "chess", "After");
        // Still cached
        assert_eq!(resolver.resolve("chess").await.unwrap().unwrap().group_name, "Before");

        clock.advance(TTL.mul_f64(0.85));
        let report = cache.refresh_all().await;
        assert_eq!(report.refreshed, 1);
        assert_eq!(resolver.resolve("chess").await.unwrap().unwrap().group_name, "After");
    }

    #[tokio::test]
    async fn test_refresh_of_deleted_identity_keeps_stale_value() {
        let root = tempdir().unwrap();
        write_identity(root.path(), "chess", "Chess");

        let clock = Arc::new(ManualClock::new());
        let cache = Arc::new(ExpiringCache::with_clock("identity_config", TTL, clock.clone()));
        let store = Arc::new(ConfigStore::new(Some(root.path().to_path_buf()), Arc::new(DiskContentSource::new())));
        let resolver = IdentityResolver::with_cache(store, cache.clone());
        resolver.resolve("chess").await.unwrap().unwrap();

        std::fs::remove_dir_all(root.path().join("chess")).unwrap();
        clock.advance(TTL.mul_f64(0.9));

        let report = cache.refresh_all().await;
        assert_eq!(report.failed, 1);
        assert_eq!(resolver.resolve("chess").await.unwrap().unwrap().group_name, "Chess");

        resolver.invalidate("chess").await;
        assert!(resolver.resolve("chess").await.unwrap().is_none());
    }
}
