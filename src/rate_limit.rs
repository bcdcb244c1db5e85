/// Rate limiting for verification submissions
use crate::{
    config::RateLimitSettings,
    context::AppContext,
    error::{GateError, GateResult},
};
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter as GovernorLimiter,
};
use std::{num::NonZeroU32, sync::Arc, time::Duration};
use tracing::warn;

const DEFAULT_RPS: NonZeroU32 = match NonZeroU32::new(5) {
    Some(n) => n,
    None => unreachable!(),
};
const DEFAULT_BURST: NonZeroU32 = match NonZeroU32::new(20) {
    Some(n) => n,
    None => unreachable!(),
};

/// Process-wide limiter on outbound verification calls
#[derive(Clone)]
pub struct RateLimiter {
    enabled: bool,
    verify: Arc<GovernorLimiter<NotKeyed, InMemoryState, DefaultClock>>,
}

impl RateLimiter {
    pub fn new(settings: &RateLimitSettings) -> Self {
        let quota = Quota::per_second(NonZeroU32::new(settings.verify_rps).unwrap_or(DEFAULT_RPS))
            .allow_burst(NonZeroU32::new(settings.verify_burst).unwrap_or(DEFAULT_BURST));

        Self {
            enabled: settings.enabled,
            verify: Arc::new(GovernorLimiter::direct(quota)),
        }
    }

    /// Check rate limit for a verification submission
    pub fn check_verify(&self) -> GateResult<()> {
        if !self.enabled {
            return Ok(());
        }
        match self.verify.check() {
            Ok(_) => Ok(()),
            Err(_) => Err(GateError::RateLimitExceeded {
                retry_after: Duration::from_secs(1),
            }),
        }
    }
}

/// Rate limiting middleware for the verify route
pub async fn verify_rate_limit_middleware(
    State(ctx): State<AppContext>,
    request: Request,
    next: Next,
) -> Result<Response, GateError> {
    if let Err(e) = ctx.rate_limiter.check_verify() {
        warn!(path = %request.uri().path(), "Verification rate limit exceeded");
        return Err(e);
    }
    Ok(next.run(request).await)
}
