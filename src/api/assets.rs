/// Identity asset endpoints: raw files, favicon and the token-gated QR code
use crate::{
    api::middleware::extract_bearer_token,
    context::AppContext,
    error::{GateError, GateResult},
    identity::normalize_identity,
    locale::is_safe_segment,
};
use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, HeaderValue},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use serde::Deserialize;
use tracing::debug;

const ASSET_CACHE_CONTROL: &str = "public, max-age=3600";
const FAVICON_CACHE_CONTROL: &str = "public, max-age=86400";
const PRIVATE_CACHE_CONTROL: &str = "private, no-store";

/// Build asset routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/api/identity/:identity/assets/:filename", get(get_identity_asset))
        .route("/api/identity/:identity/favicon", get(get_identity_favicon))
        .route("/api/identity/:identity/qrcode", get(reveal_qrcode))
}

#[derive(Debug, Default, Deserialize)]
pub struct TokenQuery {
    pub token: Option<String>,
}

/// Content type by file extension
pub fn content_type_for(file_name: &str, fallback: &'static str) -> &'static str {
    let ext = file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "ico" => "image/x-icon",
        "svg" => "image/svg+xml",
        _ => fallback,
    }
}

/// QR code files are only served to verified visitors
fn is_qrcode_file(file_name: &str) -> bool {
    file_name.to_lowercase().contains("qrcode")
}

fn file_response(data: Vec<u8>, content_type: &'static str, cache_control: &'static str) -> Response {
    (
        [
            (header::CONTENT_TYPE, HeaderValue::from_static(content_type)),
            (header::CACHE_CONTROL, HeaderValue::from_static(cache_control)),
        ],
        data,
    )
        .into_response()
}

/// Check the reveal token from `?token=` or the Authorization header
fn require_reveal_token(
    ctx: &AppContext,
    identity: &str,
    query: &TokenQuery,
    headers: &HeaderMap,
) -> GateResult<()> {
    let token = query
        .token
        .clone()
        .filter(|t| !t.is_empty())
        .or_else(|| extract_bearer_token(headers))
        .ok_or_else(|| GateError::Authentication("Reveal token required".to_string()))?;

    ctx.reveal_tokens.verify(&token, identity)?;
    Ok(())
}

/// A file from the identity directory
pub async fn get_identity_asset(
    State(ctx): State<AppContext>,
    Path((identity, filename)): Path<(String, String)>,
    Query(query): Query<TokenQuery>,
    headers: HeaderMap,
) -> GateResult<Response> {
    let identity = normalize_identity(&identity);
    if !is_safe_segment(&filename) {
        debug!("Rejected asset path {:?} for {}", filename, identity);
        return Err(GateError::NotFound("File not found".to_string()));
    }

    let gated = is_qrcode_file(&filename);
    if gated {
        require_reveal_token(&ctx, &identity, &query, &headers)?;
    }

    let data = ctx
        .config_store
        .read_asset(&identity, &filename)
        .await?
        .ok_or_else(|| GateError::NotFound("File not found".to_string()))?;

    let cache_control = if gated {
        PRIVATE_CACHE_CONTROL
    } else {
        ASSET_CACHE_CONTROL
    };
    Ok(file_response(
        data,
        content_type_for(&filename, "application/octet-stream"),
        cache_control,
    ))
}

/// The identity's favicon, when it has one
pub async fn get_identity_favicon(
    State(ctx): State<AppContext>,
    Path(identity): Path<String>,
) -> GateResult<Response> {
    let identity = normalize_identity(&identity);
    let files = ctx
        .config_store
        .validate_identity_dir(&identity)
        .await?
        .ok_or_else(|| GateError::NotFound(format!("Identity {} not found", identity)))?;
    let favicon = files
        .favicon
        .ok_or_else(|| GateError::NotFound(format!("Favicon not found for {}", identity)))?;

    let data = ctx
        .config_store
        .read_asset(&identity, &favicon)
        .await?
        .ok_or_else(|| GateError::NotFound(format!("Favicon not found for {}", identity)))?;

    Ok(file_response(
        data,
        content_type_for(&favicon, "image/x-icon"),
        FAVICON_CACHE_CONTROL,
    ))
}

/// Reveal the QR code to a holder of a valid token for this identity
pub async fn reveal_qrcode(
    State(ctx): State<AppContext>,
    Path(identity): Path<String>,
    Query(query): Query<TokenQuery>,
    headers: HeaderMap,
) -> GateResult<Response> {
    let identity = normalize_identity(&identity);
    require_reveal_token(&ctx, &identity, &query, &headers)?;

    let files = ctx
        .config_store
        .validate_identity_dir(&identity)
        .await?
        .ok_or_else(|| GateError::NotFound(format!("Identity {} not found", identity)))?;
    let data = ctx
        .config_store
        .read_asset(&identity, &files.qrcode)
        .await?
        .ok_or_else(|| GateError::NotFound("QR code not found".to_string()))?;

    Ok(file_response(
        data,
        content_type_for(&files.qrcode, "application/octet-stream"),
        PRIVATE_CACHE_CONTROL,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_types() {
        assert_eq!(content_type_for("a.JPG", "x"), "image/jpeg");
        assert_eq!(content_type_for("a.jpeg", "x"), "image/jpeg");
        assert_eq!(content_type_for("qrcode.png", "x"), "image/png");
        assert_eq!(content_type_for("a.webp", "x"), "image/webp");
        assert_eq!(content_type_for("favicon.ico", "x"), "image/x-icon");
        assert_eq!(content_type_for("logo.svg", "x"), "image/svg+xml");
        assert_eq!(content_type_for("notes.txt", "application/octet-stream"), "application/octet-stream");
        assert_eq!(content_type_for("noext", "image/x-icon"), "image/x-icon");
    }

    #[test]
    fn test_qrcode_detection() {
        assert!(is_qrcode_file("QRCode.png"));
        assert!(is_qrcode_file("group-qrcode.jpg"));
        assert!(!is_qrcode_file("favicon.ico"));
    }
}
