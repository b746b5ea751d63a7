//! HS256 login tokens.

use std::time::Duration;

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("failed to encode token: {0}")]
    Encode(String),

    #[error("invalid token: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// User id
    pub sub: String,
    pub email: String,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Clone)]
pub struct TokenIssuer {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    ttl: Duration,
}

impl TokenIssuer {
    pub fn new(secret: &str, ttl: Duration) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            ttl,
        }
    }

    pub fn issue(&self, user_id: &str, email: &str) -> Result<String, TokenError> {
        let iat = time::OffsetDateTime::now_utc().unix_timestamp();
        let ttl = i64::try_from(self.ttl.as_secs()).unwrap_or(i64::MAX);
        let claims = TokenClaims {
            sub: user_id.to_string(),
            email: email.to_string(),
            iat,
            exp: iat.saturating_add(ttl),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| TokenError::Encode(e.to_string()))
    }

    pub fn verify(&self, token: &str) -> Result<TokenClaims, TokenError> {
        let validation = Validation::new(Algorithm::HS256);
        decode::<TokenClaims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| TokenError::Invalid(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issued_token_verifies() {
        let issuer = TokenIssuer::new("0123456789abcdef-secret", Duration::from_secs(3600));
        let token = issuer.issue("u1", "a@b.c").unwrap();

        let claims = issuer.verify(&token).unwrap();
        assert_eq!(claims.sub, "u1");
        assert_eq!(claims.email, "a@b.c");
        assert_eq!(claims.exp - claims.iat, 3600);
    }

    #[test]
    fn token_from_another_secret_is_rejected() {
        let issuer = TokenIssuer::new("0123456789abcdef-secret", Duration::from_secs(60));
        let other = TokenIssuer::new("fedcba9876543210-secret", Duration::from_secs(60));
        let token = other.issue("u1", "a@b.c").unwrap();

        assert!(issuer.verify(&token).is_err());
    }
}
