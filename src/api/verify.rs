/// Verification submission endpoint
use crate::{
    context::AppContext,
    error::{GateError, GateResult},
    identity::normalize_identity,
    rate_limit::verify_rate_limit_middleware,
    verification::VerificationOutcome,
};
use axum::{
    extract::{rejection::FormRejection, State},
    middleware,
    response::Json,
    routing::post,
    Form, Router,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Build verification routes
pub fn routes(ctx: AppContext) -> Router<AppContext> {
    Router::new()
        .route("/api/verify", post(submit_verification))
        .route_layer(middleware::from_fn_with_state(ctx, verify_rate_limit_middleware))
}

/// Submitted form; missing fields fail validation rather than extraction
#[derive(Debug, Default, Deserialize)]
pub struct VerifyForm {
    #[serde(default)]
    pub userid: String,
    #[serde(default)]
    pub username: String,
    /// Identity to issue a reveal token for
    pub identity: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<u64>,
}

/// Forward a submission upstream and, on success, issue a reveal token
pub async fn submit_verification(
    State(ctx): State<AppContext>,
    form: Result<Form<VerifyForm>, FormRejection>,
) -> GateResult<Json<VerifyResponse>> {
    let Form(form) = form.map_err(|e| GateError::Validation(e.body_text()))?;
    let report = ctx.verification.verify(&form.userid, &form.username).await?;

    match report.outcome {
        VerificationOutcome::Verified => {}
        VerificationOutcome::NotVerified => {
            return Ok(Json(VerifyResponse {
                success: false,
                token: None,
                expires_in: None,
            }));
        }
        VerificationOutcome::RequestFailed => {
            return Err(GateError::Upstream(
                report.error.unwrap_or_else(|| "Verification request failed".to_string()),
            ));
        }
    }

    let identity = form
        .identity
        .as_deref()
        .filter(|i| !i.is_empty())
        .map(normalize_identity);

    let token = match identity {
        Some(identity) => match ctx.identity_resolver.resolve(&identity).await? {
            Some(config) => {
                info!("Issued reveal token for {}", config.identity);
                Some(ctx.reveal_tokens.issue(&config.identity)?)
            }
            None => {
                warn!("Verified submission named unknown identity {}", identity);
                None
            }
        },
        None => None,
    };

    let expires_in = token.as_ref().map(|_| ctx.reveal_tokens.ttl().as_secs());
    Ok(Json(VerifyResponse {
        success: true,
        token,
        expires_in,
    }))
}
