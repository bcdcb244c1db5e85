/// Default locale endpoints and server-side translation
use crate::{
    context::AppContext,
    error::{GateError, GateResult},
    locale::{resolve, select_locale, LocaleBundle, LocaleSet, BASE_LOCALE},
};
use axum::{
    extract::{Path, Query, State},
    response::Json,
    routing::get,
    Router,
};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

/// Build locale routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/api/locales", get(get_default_locales))
        .route("/api/locales/:locale", get(get_default_locale_bundle))
        .route("/api/translate", get(translate))
}

/// Sorted default locale codes
pub async fn get_default_locales(State(ctx): State<AppContext>) -> GateResult<Json<Vec<String>>> {
    Ok(Json(ctx.default_locales.available().await?))
}

/// One default locale bundle
pub async fn get_default_locale_bundle(
    State(ctx): State<AppContext>,
    Path(locale): Path<String>,
) -> GateResult<Json<LocaleBundle>> {
    Ok(Json(ctx.default_locales.bundle(&locale).await?))
}

#[derive(Debug, Serialize)]
pub struct TranslateResponse {
    pub key: String,
    pub locale: String,
    pub value: String,
}

/// Resolve one key
///
/// `key` is required; `locale` defaults to zh-CN; `identity` switches from the
/// default bundles to that identity's, and a locale it lacks is swapped for
/// the one it would display instead. Any other parameter is interpolated.
pub async fn translate(
    State(ctx): State<AppContext>,
    Query(mut params): Query<HashMap<String, String>>,
) -> GateResult<Json<TranslateResponse>> {
    let key = params
        .remove("key")
        .filter(|k| !k.is_empty())
        .ok_or_else(|| GateError::Validation("Missing key parameter".to_string()))?;
    let mut locale = params
        .remove("locale")
        .filter(|l| !l.is_empty())
        .unwrap_or_else(|| BASE_LOCALE.to_string());

    let bundles: Arc<LocaleSet> = match params.remove("identity") {
        Some(identity) => {
            let config = ctx.identity_resolver.require(&identity).await?;
            locale = select_locale(&config.locale_codes(), &locale);
            Arc::new(config.locales.clone())
        }
        None => ctx.default_locales.all().await?,
    };

    let interpolation = (!params.is_empty()).then_some(&params);
    let value = resolve(&bundles, &locale, &key, interpolation);

    Ok(Json(TranslateResponse { key, locale, value }))
}
