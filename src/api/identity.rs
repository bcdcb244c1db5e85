/// Identity listing and configuration endpoints
use crate::{
    context::AppContext,
    error::{GateError, GateResult},
    identity::{IdentityConfig, IdentitySummary},
    locale::LocaleBundle,
};
use axum::{
    extract::{Path, State},
    response::Json,
    routing::get,
    Router,
};
use std::sync::Arc;

/// Build identity routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/api/identities", get(list_identities))
        .route("/api/identity/:identity", get(get_identity_config))
        .route("/api/identity/:identity/locales", get(get_identity_locales))
        .route("/api/identity/:identity/locales/:locale", get(get_identity_locale_bundle))
}

/// Every valid identity
pub async fn list_identities(
    State(ctx): State<AppContext>,
) -> GateResult<Json<Arc<Vec<IdentitySummary>>>> {
    Ok(Json(ctx.catalog.list_identities().await?))
}

/// Full config of one identity
pub async fn get_identity_config(
    State(ctx): State<AppContext>,
    Path(identity): Path<String>,
) -> GateResult<Json<Arc<IdentityConfig>>> {
    Ok(Json(ctx.identity_resolver.require(&identity).await?))
}

/// Locale codes of an identity; empty for unknown identities
pub async fn get_identity_locales(
    State(ctx): State<AppContext>,
    Path(identity): Path<String>,
) -> GateResult<Json<Vec<String>>> {
    let locales = ctx
        .identity_resolver
        .resolve(&identity)
        .await?
        .map(|config| config.locale_codes())
        .unwrap_or_default();
    Ok(Json(locales))
}

/// One locale bundle of an identity
pub async fn get_identity_locale_bundle(
    State(ctx): State<AppContext>,
    Path((identity, locale)): Path<(String, String)>,
) -> GateResult<Json<LocaleBundle>> {
    let config = ctx.identity_resolver.require(&identity).await?;
    config
        .locales
        .get(&locale)
        .cloned()
        .map(Json)
        .ok_or_else(|| GateError::NotFound(format!("Locale {} not found for {}", locale, config.identity)))
}
