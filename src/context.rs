/// Application context and dependency injection
use crate::{
    cache::CacheMaintenance,
    config::ServerConfig,
    content::{ContentSource, DiskContentSource},
    error::GateResult,
    identity::{ConfigStore, IdentityCatalog, IdentityResolver},
    jobs::JobScheduler,
    locale::DefaultLocales,
    rate_limit::RateLimiter,
    verification::{HttpVerificationTransport, RevealTokens, VerificationGateway, VerificationTransport},
};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Application context holding all shared services
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<ServerConfig>,
    pub config_store: Arc<ConfigStore>,
    pub identity_resolver: IdentityResolver,
    pub catalog: Arc<IdentityCatalog>,
    pub default_locales: Arc<DefaultLocales>,
    pub verification: VerificationGateway,
    pub reveal_tokens: RevealTokens,
    pub rate_limiter: Arc<RateLimiter>,
    pub scheduler: Arc<JobScheduler>,
    pub started_at: Instant,
}

impl AppContext {
    /// Create a new application context from configuration
    pub fn new(config: ServerConfig) -> GateResult<Self> {
        let transport = Arc::new(HttpVerificationTransport::new(&config.verification)?);
        Self::with_parts(config, Arc::new(DiskContentSource::new()), transport)
    }

    /// Build with explicit content and verification collaborators
    pub fn with_parts(
        config: ServerConfig,
        content: Arc<dyn ContentSource>,
        transport: Arc<dyn VerificationTransport>,
    ) -> GateResult<Self> {
        // Validate configuration
        config.validate()?;

        let cache = &config.cache;

        let config_store = Arc::new(ConfigStore::new(
            config.content.user_data_root.clone(),
            Arc::clone(&content),
        ));
        let identity_resolver = IdentityResolver::new(
            Arc::clone(&config_store),
            Duration::from_secs(cache.identity_config_ttl),
        );
        let catalog = Arc::new(IdentityCatalog::new(
            identity_resolver.clone(),
            Duration::from_secs(cache.identity_list_ttl),
        ));
        let default_locales = Arc::new(DefaultLocales::new(
            config.content.default_locales_dir.clone(),
            content,
            Duration::from_secs(cache.default_locales_ttl),
        ));

        let maintained: Vec<Arc<dyn CacheMaintenance>> = vec![
            identity_resolver.cache() as Arc<dyn CacheMaintenance>,
            catalog.cache() as Arc<dyn CacheMaintenance>,
            default_locales.cache() as Arc<dyn CacheMaintenance>,
        ];
        let scheduler = Arc::new(JobScheduler::new(
            maintained,
            Duration::from_secs(cache.refresh_interval),
            Duration::from_secs(cache.cleanup_interval),
        ));

        let verification = VerificationGateway::new(transport);
        let reveal_tokens = RevealTokens::from_config(&config.token);
        let rate_limiter = Arc::new(RateLimiter::new(&config.rate_limit));

        Ok(Self {
            config: Arc::new(config),
            config_store,
            identity_resolver,
            catalog,
            default_locales,
            verification,
            reveal_tokens,
            rate_limiter,
            scheduler,
            started_at: Instant::now(),
        })
    }

    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }
}
