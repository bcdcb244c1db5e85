/// External identity verification
///
/// A submission is checked locally, forwarded once to the enrollment lookup
/// endpoint, and judged by two literal markers in the response body.

pub mod token;
pub mod transport;

pub use token::{RevealClaims, RevealTokens};
pub use transport::{HttpVerificationTransport, TransportResponse, VerificationTransport};

use crate::{
    error::{FieldError, GateError, GateResult},
    metrics,
};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Required length of a national ID number
pub const ID_NUMBER_LENGTH: usize = 18;

/// Both must appear in the upstream body for a submission to count as verified
pub const SUCCESS_MARKERS: [&str; 2] = ["Congratulations!", "专业录取"];

/// Candidate details as submitted by the visitor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationRequest {
    pub id_number: String,
    pub name: String,
}

impl VerificationRequest {
    pub fn new(id_number: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id_number: id_number.into(),
            name: name.into(),
        }
    }

    /// Field-level checks made before anything is sent upstream
    pub fn validate(&self) -> GateResult<()> {
        let mut errors = Vec::new();

        if self.id_number.chars().count() != ID_NUMBER_LENGTH {
            errors.push(FieldError::new(
                "userid",
                format!("ID number must be exactly {} characters", ID_NUMBER_LENGTH),
            ));
        }
        if self.name.trim().is_empty() {
            errors.push(FieldError::new("username", "Name is required"));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(GateError::InvalidFields(errors))
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerificationOutcome {
    Verified,
    NotVerified,
    /// Transport error or non-success status
    RequestFailed,
}

impl VerificationOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            VerificationOutcome::Verified => "verified",
            VerificationOutcome::NotVerified => "not_verified",
            VerificationOutcome::RequestFailed => "request_failed",
        }
    }

    pub fn is_verified(&self) -> bool {
        matches!(self, VerificationOutcome::Verified)
    }
}

/// Outcome plus diagnostics
#[derive(Debug, Clone)]
pub struct VerificationReport {
    pub outcome: VerificationOutcome,
    /// Upstream status, when a response arrived
    pub status: Option<u16>,
    /// Raw upstream body, for logging only
    pub content: Option<String>,
    /// Transport error text
    pub error: Option<String>,
}

/// True when the body carries every success marker
pub fn is_success_body(body: &str) -> bool {
    SUCCESS_MARKERS.iter().all(|marker| body.contains(marker))
}

/// Validates and forwards submissions
#[derive(Clone)]
pub struct VerificationGateway {
    transport: Arc<dyn VerificationTransport>,
}

impl VerificationGateway {
    pub fn new(transport: Arc<dyn VerificationTransport>) -> Self {
        Self { transport }
    }

    /// Verify a candidate. Only invalid input is an `Err`; upstream trouble is
    /// reported as [`VerificationOutcome::RequestFailed`]. No retry.
    pub async fn verify(&self, id_number: &str, name: &str) -> GateResult<VerificationReport> {
        let request = VerificationRequest::new(id_number, name.trim());
        if let Err(e) = request.validate() {
            metrics::record_verification("invalid");
            return Err(e);
        }

        let report = match self.transport.submit(&request).await {
            Ok(response) if (200..300).contains(&response.status) => {
                let outcome = if is_success_body(&response.body) {
                    VerificationOutcome::Verified
                } else {
                    VerificationOutcome::NotVerified
                };
                VerificationReport {
                    outcome,
                    status: Some(response.status),
                    content: Some(response.body),
                    error: None,
                }
            }
            Ok(response) => {
                warn!("Verification endpoint returned status {}", response.status);
                VerificationReport {
                    outcome: VerificationOutcome::RequestFailed,
                    status: Some(response.status),
                    content: Some(response.body),
                    error: Some(format!("Upstream status {}", response.status)),
                }
            }
            Err(e) => {
                warn!("Verification request failed: {}", e);
                VerificationReport {
                    outcome: VerificationOutcome::RequestFailed,
                    status: None,
                    content: None,
                    error: Some(e.to_string()),
                }
            }
        };

        metrics::record_verification(report.outcome.as_str());
        info!(outcome = report.outcome.as_str(), "Verification completed");
        if let Some(content) = &report.content {
            // Body is the candidate's enrollment page; only its size is logged
            debug!(bytes = content.len(), "Upstream body received");
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    const ID: &str = "123456789012345678";

    /// Returns a canned response and records what was sent
    struct StubTransport {
        response: GateResult<TransportResponse>,
        calls: AtomicUsize,
        last: Mutex<Option<VerificationRequest>>,
    }

    impl StubTransport {
        fn replying(status: u16, body: &str) -> Arc<Self> {
            Arc::new(Self {
                response: Ok(TransportResponse {
                    status,
                    body: body.to_string(),
                }),
                calls: AtomicUsize::new(0),
                last: Mutex::new(None),
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                response: Err(GateError::Upstream("connection refused".to_string())),
                calls: AtomicUsize::new(0),
                last: Mutex::new(None),
            })
        }
    }

    #[async_trait]
    impl VerificationTransport for StubTransport {
        async fn submit(&self, request: &VerificationRequest) -> GateResult<TransportResponse> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last.lock().unwrap() = Some(request.clone());
            match &self.response {
                Ok(response) => Ok(response.clone()),
                Err(e) => Err(GateError::Upstream(e.to_string())),
            }
        }
    }

    #[tokio::test]
    async fn test_verified_when_both_markers_present() {
        let transport = StubTransport::replying(200, "<p>Congratulations! 你已被 计算机 专业录取 </p>");
        let gateway = VerificationGateway::new(transport.clone());

        let report = gateway.verify(ID, "Zhang San").await.unwrap();

        assert_eq!(report.outcome, VerificationOutcome::Verified);
        assert_eq!(transport.calls.load(Ordering::SeqCst), 1);
        let sent = transport.last.lock().unwrap().clone().unwrap();
        assert_eq!(sent.id_number, ID);
        assert_eq!(sent.name, "Zhang San");
    }

    #[tokio::test]
    async fn test_not_verified_without_both_markers() {
        for body in ["Congratulations!", "专业录取", "No record found", ""] {
            let gateway = VerificationGateway::new(StubTransport::replying(200, body));
            let report = gateway.verify(ID, "Zhang San").await.unwrap();
            assert_eq!(report.outcome, VerificationOutcome::NotVerified, "{}", body);
        }
    }

    #[tokio::test]
    async fn test_short_id_never_reaches_transport() {
        let transport = StubTransport::replying(200, "Congratulations! 专业录取");
        let gateway = VerificationGateway::new(transport.clone());

        let err = gateway.verify("12345678901234567", "Zhang San").await.unwrap_err();

        match err {
            GateError::InvalidFields(fields) => {
                assert_eq!(fields.len(), 1);
                assert_eq!(fields[0].field, "userid");
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert_eq!(transport.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_blank_name_and_bad_id_report_both_fields() {
        let transport = StubTransport::replying(200, "");
        let gateway = VerificationGateway::new(transport.clone());

        let err = gateway.verify("1234", "   ").await.unwrap_err();
        let GateError::InvalidFields(fields) = err else {
            panic!("expected field errors");
        };
        let names: Vec<&str> = fields.iter().map(|f| f.field.as_str()).collect();
        assert_eq!(names, vec!["userid", "username"]);
        assert_eq!(transport.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_transport_failure_and_bad_status_are_request_failed() {
        let failed = VerificationGateway::new(StubTransport::failing())
            .verify(ID, "Zhang San")
            .await
            .unwrap();
        assert_eq!(failed.outcome, VerificationOutcome::RequestFailed);
        assert!(failed.error.is_some());

        // Markers in an error page do not count
        let server_error = VerificationGateway::new(StubTransport::replying(500, "Congratulations! 专业录取"))
            .verify(ID, "Zhang San")
            .await
            .unwrap();
        assert_eq!(server_error.outcome, VerificationOutcome::RequestFailed);
        assert_eq!(server_error.status, Some(500));
    }

    #[test]
    fn test_id_length_counts_characters() {
        assert!(VerificationRequest::new("12345678901234567X", "Li").validate().is_ok());
        assert!(VerificationRequest::new("1234567890123456789", "Li").validate().is_err());
    }
}
