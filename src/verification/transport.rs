/// Outbound call to the enrollment lookup endpoint
use super::VerificationRequest;
use crate::{
    config::VerificationConfig,
    error::{GateError, GateResult},
};
use async_trait::async_trait;
use std::time::Duration;

/// Status and body of an upstream response
#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: u16,
    pub body: String,
}

/// Sends one submission upstream. Errors mean no usable response arrived.
#[async_trait]
pub trait VerificationTransport: Send + Sync {
    async fn submit(&self, request: &VerificationRequest) -> GateResult<TransportResponse>;
}

/// Form-encoded POST over reqwest
#[derive(Clone)]
pub struct HttpVerificationTransport {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpVerificationTransport {
    pub fn new(config: &VerificationConfig) -> GateResult<Self> {
        let client = reqwest::Client::builder()
            .user_agent(&config.user_agent)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| GateError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl VerificationTransport for HttpVerificationTransport {
    async fn submit(&self, request: &VerificationRequest) -> GateResult<TransportResponse> {
        let response = self
            .client
            .post(&self.endpoint)
            .form(&[
                ("userid", request.id_number.as_str()),
                ("username", request.name.as_str()),
            ])
            .send()
            .await
            .map_err(|e| GateError::Upstream(format!("Failed to reach verification endpoint: {}", e)))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| GateError::Upstream(format!("Failed to read verification response: {}", e)))?;

        Ok(TransportResponse { status, body })
    }
}
