/// Unified error types for the group gate
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Field-level validation failure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Main error type for the gate
#[derive(Error, Debug)]
pub enum GateError {
    /// Identity, locale or asset does not exist under the content root
    #[error("Not found: {0}")]
    NotFound(String),

    /// Malformed request input
    #[error("Validation error: {0}")]
    Validation(String),

    /// Submitted form failed one or more field checks
    #[error("Invalid fields: {}", format_fields(.0))]
    InvalidFields(Vec<FieldError>),

    /// Missing, invalid or expired reveal token
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Token valid but not for this resource
    #[error("Not authorized: {0}")]
    Authorization(String),

    /// External verification endpoint failed at the transport level
    #[error("Upstream error: {0}")]
    Upstream(String),

    /// Locale document could not be parsed
    #[error("Parse error: {0}")]
    Parse(String),

    /// Rate limiting errors
    #[error("Rate limit exceeded")]
    RateLimitExceeded { retry_after: std::time::Duration },

    /// Internal server errors
    #[error("Internal error: {0}")]
    Internal(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

fn format_fields(fields: &[FieldError]) -> String {
    fields
        .iter()
        .map(|f| format!("{}: {}", f.field, f.message))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Error response format
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fields: Option<Vec<FieldError>>,
}

/// Convert GateError to HTTP response
impl IntoResponse for GateError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match &self {
            GateError::NotFound(_) => (StatusCode::NOT_FOUND, "NotFound", self.to_string()),
            GateError::Validation(_) | GateError::InvalidFields(_) | GateError::Parse(_) => (
                StatusCode::BAD_REQUEST,
                "InvalidRequest",
                self.to_string(),
            ),
            GateError::Authentication(_) => (
                StatusCode::UNAUTHORIZED,
                "AuthenticationRequired",
                self.to_string(),
            ),
            GateError::Authorization(_) => {
                (StatusCode::FORBIDDEN, "Forbidden", self.to_string())
            }
            GateError::Upstream(_) => (
                StatusCode::BAD_GATEWAY,
                "UpstreamFailure",
                "External verification request failed".to_string(),
            ),
            GateError::RateLimitExceeded { .. } => (
                StatusCode::TOO_MANY_REQUESTS,
                "RateLimitExceeded",
                "Rate limit exceeded".to_string(),
            ),
            GateError::Internal(_) | GateError::Io(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "InternalServerError",
                "Internal server error".to_string(), // Don't leak details
            ),
        };

        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self, "request failed");
        }

        let fields = match self {
            GateError::InvalidFields(fields) => Some(fields),
            _ => None,
        };

        let body = Json(ErrorResponse {
            error: error_code.to_string(),
            message,
            fields,
        });

        (status, body).into_response()
    }
}

/// Result type alias for gate operations
pub type GateResult<T> = Result<T, GateError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        let cases = vec![
            (GateError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (GateError::Validation("x".into()), StatusCode::BAD_REQUEST),
            (GateError::Authentication("x".into()), StatusCode::UNAUTHORIZED),
            (GateError::Authorization("x".into()), StatusCode::FORBIDDEN),
            (GateError::Upstream("x".into()), StatusCode::BAD_GATEWAY),
            (GateError::Internal("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];

        for (err, expected) in cases {
            assert_eq!(err.into_response().status(), expected);
        }
    }

    #[test]
    fn test_field_errors_display() {
        let err = GateError::InvalidFields(vec![
            FieldError::new("userid", "ID number must be exactly 18 characters"),
            FieldError::new("username", "Name is required"),
        ]);
        let text = err.to_string();
        assert!(text.contains("userid"));
        assert!(text.contains("username"));
    }
}
