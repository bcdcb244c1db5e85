use crate::cache::CacheMaintenance;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Duration, Instant, MissedTickBehavior};
use tracing::{error, info};

pub mod tasks;

/// Job scheduler for cache maintenance
///
/// Runs two loops over every registered cache: refresh (refresh near-expiry
/// entries, then sweep) and cleanup (sweep). Each loop awaits its pass before
/// waiting for the next tick, and ticks missed meanwhile are skipped.
pub struct JobScheduler {
    caches: Vec<Arc<dyn CacheMaintenance>>,
    refresh_interval: Duration,
    cleanup_interval: Duration,
    shutdown: watch::Sender<bool>,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl JobScheduler {
    pub fn new(
        caches: Vec<Arc<dyn CacheMaintenance>>,
        refresh_interval: Duration,
        cleanup_interval: Duration,
    ) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            caches,
            refresh_interval,
            cleanup_interval,
            shutdown,
            handles: Mutex::new(Vec::new()),
        }
    }

    pub fn is_running(&self) -> bool {
        !self
            .handles
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_empty()
    }

    /// Start all background jobs
    pub fn start(&self) {
        let mut handles = self.handles.lock().unwrap_or_else(PoisonError::into_inner);
        if !handles.is_empty() {
            info!("Background job scheduler already running");
            return;
        }

        info!(
            "Starting background job scheduler ({} caches, refresh every {:?}, cleanup every {:?})",
            self.caches.len(),
            self.refresh_interval,
            self.cleanup_interval
        );
        self.shutdown.send_replace(false);

        handles.push(tokio::spawn(Self::cache_refresh_job(
            self.caches.clone(),
            self.refresh_interval,
            self.shutdown.subscribe(),
        )));
        handles.push(tokio::spawn(Self::cache_cleanup_job(
            self.caches.clone(),
            self.cleanup_interval,
            self.shutdown.subscribe(),
        )));

        info!("Background jobs started");
    }

    /// Signal both loops and wait for them to finish their current pass
    pub async fn stop(&self) {
        let handles: Vec<JoinHandle<()>> = {
            let mut guard = self.handles.lock().unwrap_or_else(PoisonError::into_inner);
            guard.drain(..).collect()
        };
        if handles.is_empty() {
            return;
        }

        info!("Stopping background job scheduler");
        self.shutdown.send_replace(true);

        for handle in handles {
            if let Err(e) = handle.await {
                error!("Background job ended abnormally: {}", e);
            }
        }
        info!("Background jobs stopped");
    }

    /// Refresh near-expiry entries, then sweep
    async fn cache_refresh_job(
        caches: Vec<Arc<dyn CacheMaintenance>>,
        period: Duration,
        mut shutdown: watch::Receiver<bool>,
    ) {
        let mut interval = interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = interval.tick() => {}
                _ = shutdown.changed() => break,
            }

            let report = tasks::refresh_caches(&caches).await;
            if report.refreshed > 0 || report.failed > 0 {
                info!(
                    "Cache refresh: {} refreshed, {} failed, {} superseded",
                    report.refreshed, report.failed, report.superseded
                );
            }
            tasks::sweep_caches(&caches).await;
        }
    }

    /// Evict expired entries
    async fn cache_cleanup_job(
        caches: Vec<Arc<dyn CacheMaintenance>>,
        period: Duration,
        mut shutdown: watch::Receiver<bool>,
    ) {
        let mut interval = interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = interval.tick() => {}
                _ = shutdown.changed() => break,
            }

            info!("Running cache cleanup");
            let evicted = tasks::sweep_caches(&caches).await;
            if evicted > 0 {
                info!("Cache cleanup evicted {} entries", evicted);
            }
        }
    }
}
