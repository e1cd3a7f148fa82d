use chrono::Utc;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use crate::config::parse_duration_to_secs;
use crate::utils::{ApiError, ApiResult};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User id as a string
    pub sub: String,
    pub username: String,
    pub exp: i64,
    pub iat: i64,
}

pub struct JwtUtil {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    expires_in_secs: i64,
}

impl JwtUtil {
    pub fn new(secret: &str, expires_in: &str) -> Self {
        let expires_in_secs = parse_duration_to_secs(expires_in).unwrap_or_else(|e| {
            tracing::warn!("Invalid JWT expiration '{}': {}, falling back to 24h", expires_in, e);
            24 * 60 * 60
        }) as i64;

        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            expires_in_secs,
        }
    }

    pub fn generate_token(&self, user_id: i64, username: &str) -> ApiResult<String> {
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: user_id.to_string(),
            username: username.to_string(),
            iat: now,
            exp: now + self.expires_in_secs,
        };

        encode(&Header::default(), &claims, &self.encoding_key).map_err(|e| {
            tracing::error!("Failed to sign JWT: {:?}", e);
            ApiError::internal_error("Failed to generate token")
        })
    }

    pub fn verify_token(&self, token: &str) -> ApiResult<Claims> {
        decode::<Claims>(token, &self.decoding_key, &Validation::default())
            .map(|data| data.claims)
            .map_err(|e| {
                tracing::debug!("JWT decode failed: {:?}", e);
                ApiError::unauthorized("Invalid or expired token")
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_roundtrip() {
        let jwt = JwtUtil::new("secret", "1h");
        let token = jwt.generate_token(7, "alice").unwrap();
        let claims = jwt.verify_token(&token).unwrap();
        assert_eq!(claims.sub, "7");
        assert_eq!(claims.username, "alice");
    }

    #[test]
    fn test_token_signed_with_other_secret_is_rejected() {
        let token = JwtUtil::new("one", "1h").generate_token(1, "bob").unwrap();
        let err = JwtUtil::new("two", "1h").verify_token(&token).unwrap_err();
        assert!(matches!(err, ApiError::Unauthorized(_)));
    }
}
