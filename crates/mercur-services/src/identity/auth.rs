//! JWT token issuance and validation.
//!
//! Tokens are symmetric HS256 with 24 hour validity. The signing key is a
//! process-wide secret; production deployments MUST override the default.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use mercur_core::error::{ServiceError, ServiceResult};

/// Default token lifetime.
const TOKEN_LIFETIME_HOURS: i64 = 24;

/// JWT claims structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub user_id: i64,
    pub username: String,

    /// Subject, set to the username.
    pub sub: String,

    /// Issued at (Unix timestamp).
    pub iat: i64,

    /// Expiration (Unix timestamp).
    pub exp: i64,
}

/// Signs and validates bearer tokens.
#[derive(Clone)]
pub struct TokenManager {
    secret: String,
    lifetime: Duration,
}

impl TokenManager {
    pub fn new(secret: impl Into<String>) -> Self {
        TokenManager {
            secret: secret.into(),
            lifetime: Duration::hours(TOKEN_LIFETIME_HOURS),
        }
    }

    /// Overrides the token lifetime.
    pub fn with_lifetime(mut self, lifetime: Duration) -> Self {
        self.lifetime = lifetime;
        self
    }

    /// Issues a token for the user; returns the token and its expiry.
    pub fn generate(
        &self,
        user_id: i64,
        username: &str,
    ) -> ServiceResult<(String, DateTime<Utc>)> {
        let now = Utc::now();
        let expires_at = now + self.lifetime;

        let claims = Claims {
            user_id,
            username: username.to_string(),
            sub: username.to_string(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
        };

        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
        .map_err(|e| ServiceError::internal(format!("failed to generate token: {e}")))?;

        Ok((token, expires_at))
    }

    /// Validates a token signature and expiry, returning its claims.
    pub fn validate(&self, token: &str) -> ServiceResult<Claims> {
        let data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &Validation::default(),
        )
        .map_err(|e| ServiceError::Unauthenticated(format!("invalid token: {e}")))?;

        Ok(data.claims)
    }
}

/// Extracts the token from an `Authorization: Bearer <token>` header value.
pub fn extract_bearer_token(auth_header: &str) -> Option<&str> {
    auth_header.strip_prefix("Bearer ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_round_trip() {
        let manager = TokenManager::new("test-secret");
        let (token, expires_at) = manager.generate(42, "cashier-anne").unwrap();

        let claims = manager.validate(&token).unwrap();
        assert_eq!(claims.user_id, 42);
        assert_eq!(claims.username, "cashier-anne");
        assert_eq!(claims.sub, "cashier-anne");
        assert_eq!(claims.exp, expires_at.timestamp());
        assert!(claims.exp - claims.iat >= 24 * 3600);
    }

    #[test]
    fn wrong_secret_rejected() {
        let manager = TokenManager::new("secret-a");
        let (token, _) = manager.generate(1, "bob").unwrap();

        let other = TokenManager::new("secret-b");
        assert!(other.validate(&token).is_err());
    }

    #[test]
    fn expired_token_rejected() {
        // Expired well beyond the default validation leeway.
        let manager = TokenManager::new("test-secret").with_lifetime(Duration::hours(-2));
        let (token, _) = manager.generate(1, "bob").unwrap();
        assert!(manager.validate(&token).is_err());
    }

    #[test]
    fn bearer_extraction() {
        assert_eq!(extract_bearer_token("Bearer abc.def"), Some("abc.def"));
        assert_eq!(extract_bearer_token("Basic abc"), None);
    }
}
