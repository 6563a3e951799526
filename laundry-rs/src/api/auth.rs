//! JWT Authentication for REST API

use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::security::Role;

/// JWT Claims
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (student id or admin username)
    pub sub: String,
    /// Internal account row id
    pub uid: i64,
    /// Principal role, checked by the role-gated extractors
    pub role: Role,
    /// Expiration time (Unix timestamp)
    pub exp: u64,
    /// Issued at (Unix timestamp)
    pub iat: u64,
}

/// JWT configuration
#[derive(Clone)]
pub struct JwtConfig {
    /// Secret key for signing tokens
    secret: String,
    /// Token expiration duration
    expiration: Duration,
}

impl JwtConfig {
    /// Create a new JWT configuration
    pub fn new(secret: String, expiration_hours: u64) -> Self {
        Self {
            secret,
            expiration: Duration::from_secs(expiration_hours * 3600),
        }
    }

    /// Create a new JWT token for a principal
    pub fn create_token(
        &self,
        sub: &str,
        uid: i64,
        role: Role,
    ) -> Result<String, jsonwebtoken::errors::Error> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_secs();

        let claims = Claims {
            sub: sub.to_string(),
            uid,
            role,
            exp: now + self.expiration.as_secs(),
            iat: now,
        };

        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
    }

    /// Validate a JWT token and extract claims
    pub fn validate_token(&self, token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
        let token_data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &Validation::default(),
        )?;

        Ok(token_data.claims)
    }
}

impl Default for JwtConfig {
    fn default() -> Self {
        Self::new("change-me-in-production".to_string(), 24)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_and_validate_token() {
        let config = JwtConfig::new("test-secret".to_string(), 1);

        let token = config.create_token("STU001", 7, Role::Student).unwrap();
        assert!(!token.is_empty());

        let claims = config.validate_token(&token).unwrap();
        assert_eq!(claims.sub, "STU001");
        assert_eq!(claims.uid, 7);
        assert_eq!(claims.role, Role::Student);
    }

    #[test]
    fn test_admin_token_carries_role() {
        let config = JwtConfig::new("test-secret".to_string(), 1);

        let token = config.create_token("admin", 1, Role::Admin).unwrap();
        let claims = config.validate_token(&token).unwrap();
        assert_eq!(claims.role, Role::Admin);
    }

    #[test]
    fn test_invalid_token() {
        let config = JwtConfig::new("test-secret".to_string(), 1);

        let result = config.validate_token("invalid-token");
        assert!(result.is_err());
    }

    #[test]
    fn test_token_signed_with_other_secret_is_rejected() {
        let config = JwtConfig::new("test-secret".to_string(), 1);
        let other = JwtConfig::new("other-secret".to_string(), 1);

        let token = other.create_token("STU001", 7, Role::Student).unwrap();
        assert!(config.validate_token(&token).is_err());
    }
}
