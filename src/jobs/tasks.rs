/// Background task implementations
use crate::{
    cache::{CacheMaintenance, RefreshReport},
    metrics,
};
use futures::future::join_all;
use std::sync::Arc;
use tracing::debug;

/// Refresh every cache; caches run concurrently and all are awaited
pub async fn refresh_caches(caches: &[Arc<dyn CacheMaintenance>]) -> RefreshReport {
    let reports = join_all(caches.iter().map(|cache| cache.refresh_entries())).await;

    let mut total = RefreshReport::default();
    for (cache, report) in caches.iter().zip(reports) {
        if report.failed > 0 {
            metrics::record_background_job("cache_refresh", "partial_failure");
        }
        debug!(
            cache = cache.cache_name(),
            refreshed = report.refreshed,
            failed = report.failed,
            "Refreshed cache"
        );
        total.refreshed += report.refreshed;
        total.failed += report.failed;
        total.superseded += report.superseded;
    }

    metrics::record_background_job("cache_refresh", "success");
    total
}

/// Sweep every cache, returning the total number of evicted entries
pub async fn sweep_caches(caches: &[Arc<dyn CacheMaintenance>]) -> usize {
    let mut evicted = 0;
    for cache in caches {
        let count = cache.sweep_expired().await;
        if count > 0 {
            debug!(cache = cache.cache_name(), evicted = count, "Swept cache");
        }
        evicted += count;
    }

    metrics::record_background_job("cache_sweep", "success");
    evicted
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{ExpiringCache, ManualClock, RefreshFn, RefreshFuture};
    use crate::error::GateError;
    use futures::FutureExt;
    use std::time::Duration;

    #[tokio::test]
    async fn test_refresh_and_sweep_across_caches() {
        let clock = Arc::new(ManualClock::new());
        let strings: Arc<ExpiringCache<Arc<String>>> =
            Arc::new(ExpiringCache::with_clock("strings", Duration::from_secs(100), clock.clone()));
        let numbers: Arc<ExpiringCache<u64>> =
            Arc::new(ExpiringCache::with_clock("numbers", Duration::from_secs(100), clock.clone()));

        let ok: RefreshFn<Arc<String>> =
            Arc::new(|| -> RefreshFuture<Arc<String>> { async { Ok(Arc::new("new".to_string())) }.boxed() });
        let failing: RefreshFn<u64> = Arc::new(|| -> RefreshFuture<u64> {
            async { Err(GateError::Internal("nope".to_string())) }.boxed()
        });

        strings.set_with_refresh("s", Arc::new("old".to_string()), None, ok).await;
        numbers.set_with_refresh("n", 1, None, failing).await;
        numbers.set("plain", 2, Some(Duration::from_secs(10))).await;

        let caches: Vec<Arc<dyn CacheMaintenance>> = vec![strings.clone() as Arc<dyn CacheMaintenance>, numbers.clone() as Arc<dyn CacheMaintenance>];

        clock.advance(Duration::from_secs(90));
        let report = refresh_caches(&caches).await;
        assert_eq!(report.refreshed, 1);
        assert_eq!(report.failed, 1);

        // "plain" expired, "n" is stale but not yet expired
        assert_eq!(sweep_caches(&caches).await, 1);
        assert_eq!(strings.get("s").await.unwrap().as_str(), "new");
        assert_eq!(numbers.get("n").await, Some(1));
    }
}
