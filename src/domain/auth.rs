//! Dashboard token verification
//!
//! Notification sockets authenticate with a bearer token minted by the
//! dashboard backend. Verification is HS256 over a shared secret; a
//! missing secret leaves the verifier in a mode where every token is
//! rejected and clients stay anonymous.

use crate::domain::shared::{DomainError, Result};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

/// Claims carried by a dashboard token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Dashboard user id
    pub sub: String,
    /// Tenant the user belongs to, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,
    /// Expiry as a unix timestamp
    pub exp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,
}

/// HS256 token verifier for notification sockets
pub struct TokenVerifier {
    decoding_key: Option<DecodingKey>,
}

impl TokenVerifier {
    pub fn new(secret: &str) -> Self {
        let decoding_key = if secret.is_empty() {
            None
        } else {
            Some(DecodingKey::from_secret(secret.as_bytes()))
        };
        Self { decoding_key }
    }

    /// Whether tokens can be verified at all.
    pub fn is_enabled(&self) -> bool {
        self.decoding_key.is_some()
    }

    pub fn verify(&self, token: &str) -> Result<Claims> {
        let decoding_key = self
            .decoding_key
            .as_ref()
            .ok_or_else(|| DomainError::Unauthorized("no token secret configured".to_string()))?;

        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.validate_nbf = false;

        let token_data = decode::<Claims>(token, decoding_key, &validation)
            .map_err(|e| DomainError::Unauthorized(format!("invalid token: {}", e)))?;

        Ok(token_data.claims)
    }
}
