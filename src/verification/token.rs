/// Signed reveal tokens
///
/// A successful verification for an identity yields a short-lived HS256 JWT.
/// The QR code of that identity is only served to holders of a valid token.
use crate::{
    config::TokenConfig,
    error::{GateError, GateResult},
};
use chrono::Utc;
use jsonwebtoken::{decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::{distributions::Alphanumeric, Rng};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::warn;
use uuid::Uuid;

/// Scope claim carried by every reveal token
pub const REVEAL_SCOPE: &str = "qr-reveal";

const GENERATED_SECRET_LEN: usize = 48;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevealClaims {
    /// Identity the holder was verified for
    pub sub: String,
    pub scope: String,
    pub iat: i64,
    pub exp: i64,
    pub jti: String,
}

/// Issues and checks reveal tokens
#[derive(Clone)]
pub struct RevealTokens {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    ttl: Duration,
}

impl RevealTokens {
    pub fn new(secret: &[u8], ttl: Duration) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            ttl,
        }
    }

    /// Use the configured secret, or generate one for this process
    pub fn from_config(config: &TokenConfig) -> Self {
        let ttl = Duration::from_secs(config.ttl_secs);
        match &config.secret {
            Some(secret) => Self::new(secret.as_bytes(), ttl),
            None => {
                warn!("GATE_TOKEN_SECRET not set, generated a random secret; reveal tokens will not survive a restart");
                let secret: String = rand::thread_rng()
                    .sample_iter(&Alphanumeric)
                    .take(GENERATED_SECRET_LEN)
                    .map(char::from)
                    .collect();
                Self::new(secret.as_bytes(), ttl)
            }
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Issue a token for a verified identity
    pub fn issue(&self, identity: &str) -> GateResult<String> {
        let now = Utc::now().timestamp();
        let claims = RevealClaims {
            sub: identity.to_string(),
            scope: REVEAL_SCOPE.to_string(),
            iat: now,
            exp: now + self.ttl.as_secs() as i64,
            jti: Uuid::new_v4().to_string(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| GateError::Internal(format!("Failed to issue reveal token: {}", e)))
    }

    /// Check a token against the identity it is presented for
    ///
    /// Invalid or expired tokens are `Authentication`; a valid token for a
    /// different identity is `Authorization`.
    pub fn verify(&self, token: &str, identity: &str) -> GateResult<RevealClaims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        let claims = decode::<RevealClaims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => {
                    GateError::Authentication("Reveal token has expired".to_string())
                }
                ErrorKind::InvalidSignature => {
                    GateError::Authentication("Invalid reveal token signature".to_string())
                }
                _ => GateError::Authentication(format!("Invalid reveal token: {}", e)),
            })?;

        if claims.scope != REVEAL_SCOPE {
            return Err(GateError::Authentication("Token has the wrong scope".to_string()));
        }
        if claims.sub != identity {
            return Err(GateError::Authorization(format!(
                "Reveal token is not valid for {}",
                identity
            )));
        }

        Ok(claims)
    }
}
