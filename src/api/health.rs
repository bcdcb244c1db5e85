/// Health check and metrics endpoints
///
/// Supports two types of probes:
/// - Liveness: Is the application alive? (restart if not)
/// - Readiness: Can the content root be read? (remove from load balancer if not)

use crate::{context::AppContext, metrics};
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Json},
    routing::get,
    Router,
};
use chrono::Utc;
use serde::Serialize;

/// Build health check routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/api/health", get(health_detailed))
        .route("/health/live", get(liveness_probe))
        .route("/health/ready", get(readiness_probe))
        .route("/metrics", get(metrics_handler))
}

/// State of the content root
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentRootStatus {
    /// "exists", "not_found", "not_configured" or "read_error"
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub root: Option<String>,
    /// Entries directly under the root, directories suffixed with `/`
    pub contents: Vec<String>,
}

/// Health status response
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthStatus {
    pub status: String,
    pub version: String,
    pub timestamp: String,
    pub uptime_seconds: f64,
    pub scheduler_running: bool,
    pub user_data: ContentRootStatus,
}

async fn content_root_status(ctx: &AppContext) -> ContentRootStatus {
    let Some(root) = ctx.config_store.root() else {
        return ContentRootStatus {
            status: "not_configured".to_string(),
            root: None,
            contents: Vec::new(),
        };
    };
    let root_display = Some(root.display().to_string());

    match ctx.config_store.source().list_dir(root).await {
        Ok(Some(entries)) => ContentRootStatus {
            status: "exists".to_string(),
            root: root_display,
            contents: entries
                .iter()
                .map(|e| format!("{}{}", e.name, if e.is_dir { "/" } else { "" }))
                .collect(),
        },
        Ok(None) => ContentRootStatus {
            status: "not_found".to_string(),
            root: root_display,
            contents: Vec::new(),
        },
        Err(e) => {
            tracing::warn!(error = %e, "content root unreadable");
            ContentRootStatus {
                status: "read_error".to_string(),
                root: root_display,
                contents: Vec::new(),
            }
        }
    }
}

/// Detailed health check
pub async fn health_detailed(State(ctx): State<AppContext>) -> Json<HealthStatus> {
    let user_data = content_root_status(&ctx).await;

    Json(HealthStatus {
        status: "OK".to_string(),
        version: ctx.config.service.version.clone(),
        timestamp: Utc::now().to_rfc3339(),
        uptime_seconds: ctx.uptime().as_secs_f64(),
        scheduler_running: ctx.scheduler.is_running(),
        user_data,
    })
}

/// Liveness probe
pub async fn liveness_probe() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "alive",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Readiness probe
///
/// Returns 503 only when the content root exists but cannot be read. A
/// missing or unconfigured root still serves (empty) listings.
pub async fn readiness_probe(
    State(ctx): State<AppContext>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    let root = content_root_status(&ctx).await;
    if root.status == "read_error" {
        tracing::warn!("readiness_probe_failed: content root unreadable");
        return Err(StatusCode::SERVICE_UNAVAILABLE);
    }

    Ok(Json(serde_json::json!({
        "status": "ready",
        "userData": root.status,
        "version": env!("CARGO_PKG_VERSION")
    })))
}

/// Prometheus metrics in text format
pub async fn metrics_handler(State(ctx): State<AppContext>) -> impl IntoResponse {
    metrics::UPTIME_SECONDS.set(ctx.uptime().as_secs_f64());
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        metrics::render_metrics(),
    )
}
