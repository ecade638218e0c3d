//! JWT utilities for caller identity
//!
//! Tokens are issued by the identity provider in front of this service; we
//! only need to verify them and lift the caller out of the claims. Issuing
//! is kept for tooling and tests.

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use loyalty_core::{Caller, Role, UserId, Utorid};
use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// JWT claims structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (numeric user ID)
    pub sub: String,
    pub utorid: String,
    pub role: Role,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
}

impl Claims {
    /// Get the user ID
    ///
    /// # Errors
    /// Returns an error if the subject is not a positive integer
    pub fn user_id(&self) -> Result<UserId, AppError> {
        UserId::parse(&self.sub).map_err(|_| AppError::InvalidToken)
    }

    /// Lift the authenticated caller out of the claims
    pub fn caller(&self) -> Result<Caller, AppError> {
        let utorid = Utorid::new(self.utorid.as_str()).map_err(|_| AppError::InvalidToken)?;
        Ok(Caller::new(self.user_id()?, utorid, self.role))
    }

    #[must_use]
    pub fn is_expired(&self) -> bool {
        Utc::now().timestamp() > self.exp
    }
}

/// JWT service for encoding and decoding caller tokens
#[derive(Clone)]
pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    token_expiry: i64,
}

impl JwtService {
    /// Create a new JWT service with the given secret and token lifetime in seconds
    #[must_use]
    pub fn new(secret: &str, token_expiry: i64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            token_expiry,
        }
    }

    /// Issue a bearer token for a caller
    ///
    /// # Errors
    /// Returns an error if token encoding fails
    pub fn issue(&self, caller: &Caller) -> Result<String, AppError> {
        let now = Utc::now();
        let claims = Claims {
            sub: caller.id.to_string(),
            utorid: caller.utorid.to_string(),
            role: caller.role,
            iat: now.timestamp(),
            exp: (now + Duration::seconds(self.token_expiry)).timestamp(),
        };

        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|_| AppError::Internal(anyhow::anyhow!("Failed to encode JWT")))
    }

    /// Decode and validate a JWT token
    ///
    /// # Errors
    /// Returns an error if the token is invalid or expired
    pub fn decode_token(&self, token: &str) -> Result<Claims, AppError> {
        let token_data = decode::<Claims>(token, &self.decoding_key, &Validation::default())
            .map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => AppError::TokenExpired,
                _ => AppError::InvalidToken,
            })?;

        Ok(token_data.claims)
    }

    /// Validate a token and return the caller it identifies
    pub fn authenticate(&self, token: &str) -> Result<Caller, AppError> {
        self.decode_token(token)?.caller()
    }

    #[must_use]
    pub fn token_expiry(&self) -> i64 {
        self.token_expiry
    }
}

impl std::fmt::Debug for JwtService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtService")
            .field("token_expiry", &self.token_expiry)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_service() -> JwtService {
        JwtService::new("test-secret-key-that-is-long-enough", 900)
    }

    fn caller() -> Caller {
        Caller::new(
            UserId::new(12345),
            Utorid::new("cashier1").unwrap(),
            Role::Cashier,
        )
    }

    #[test]
    fn test_issue_and_authenticate() {
        let service = create_test_service();
        let token = service.issue(&caller()).unwrap();

        let authenticated = service.authenticate(&token).unwrap();
        assert_eq!(authenticated, caller());
    }

    #[test]
    fn test_decode_claims() {
        let service = create_test_service();
        let token = service.issue(&caller()).unwrap();
        let claims = service.decode_token(&token).unwrap();

        assert_eq!(claims.sub, "12345");
        assert_eq!(claims.role, Role::Cashier);
        assert!(!claims.is_expired());
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let token = create_test_service().issue(&caller()).unwrap();
        let other = JwtService::new("a-completely-different-secret-key", 900);
        assert!(matches!(other.decode_token(&token), Err(AppError::InvalidToken)));
    }

    #[test]
    fn test_invalid_token() {
        let service = create_test_service();
        let result = service.decode_token("invalid.token.here");
        assert!(matches!(result, Err(AppError::InvalidToken)));
    }

    #[test]
    fn test_claims_with_bad_subject() {
        let claims = Claims {
            sub: "abc".to_string(),
            utorid: "cashier1".to_string(),
            role: Role::Regular,
            iat: 0,
            exp: i64::MAX,
        };
        assert!(matches!(claims.caller(), Err(AppError::InvalidToken)));
    }
}
