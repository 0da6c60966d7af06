//! Internal API tokens — short-lived HS512 JWTs binding a service name and
//! user id. Issued per callback invocation and verified by the ingestion API.

use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Header carrying the internal token on both the callback request and the
/// ingestion API. The downstream receiver verifies with the shared secret.
pub const TOKEN_HEADER: &str = "internal-api-token";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenClaims {
    pub service_name: String,
    pub user_id: String,
    pub iat: i64,
    pub exp: i64,
}

/// Issues and verifies internal API tokens from the shared base64 secret.
#[derive(Clone)]
pub struct TokenIssuer {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl_ms: u64,
}

impl TokenIssuer {
    pub fn new(base64_secret: &str, ttl_ms: u64) -> Result<Self> {
        Ok(Self {
            encoding: EncodingKey::from_base64_secret(base64_secret)?,
            decoding: DecodingKey::from_base64_secret(base64_secret)?,
            ttl_ms,
        })
    }

    /// Sign a token for `service_name`/`user_id`, expiring after the
    /// configured TTL.
    pub fn issue(&self, service_name: &str, user_id: &str) -> Result<String> {
        let now = Utc::now().timestamp();
        let claims = TokenClaims {
            service_name: service_name.to_string(),
            user_id: user_id.to_string(),
            iat: now,
            exp: now + (self.ttl_ms / 1_000).max(1) as i64,
        };
        Ok(encode(&Header::new(Algorithm::HS512), &claims, &self.encoding)?)
    }

    /// Verify signature and expiry, returning the embedded claims.
    pub fn verify(&self, token: &str) -> Result<TokenClaims> {
        let mut validation = Validation::new(Algorithm::HS512);
        validation.leeway = 0;
        let data = decode::<TokenClaims>(token, &self.decoding, &validation)?;
        Ok(data.claims)
    }
}
