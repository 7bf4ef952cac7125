//! Bearer token authentication for users and shared-secret authentication for
//! the render worker.

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::state::AppState;

/// Header carrying the render worker's shared secret.
pub const WORKER_CREDENTIAL_HEADER: &str = "X-Worker-Credential";

/// Decoded user token claims.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User ID
    pub sub: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Expiration
    pub exp: i64,
}

/// Authenticated user extracted from request.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub uid: String,
    pub email: Option<String>,
}

impl From<Claims> for AuthUser {
    fn from(claims: Claims) -> Self {
        Self {
            uid: claims.sub,
            email: claims.email,
        }
    }
}

/// HS256 token verifier.
pub struct JwtVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl JwtVerifier {
    pub fn new(secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_required_spec_claims(&["exp", "sub"]);
        Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    pub fn verify_token(&self, token: &str) -> Result<Claims, ApiError> {
        let data = decode::<Claims>(token, &self.key, &self.validation)
            .map_err(|e| ApiError::unauthorized(format!("Token validation failed: {}", e)))?;
        if data.claims.sub.trim().is_empty() {
            return Err(ApiError::unauthorized("Token has an empty subject"));
        }
        Ok(data.claims)
    }
}

/// Axum extractor for authenticated user.
#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        // Get Authorization header
        let auth_header = parts
            .headers
            .get("Authorization")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| ApiError::unauthorized("Missing Authorization header"))?;

        // Extract Bearer token
        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or_else(|| ApiError::unauthorized("Invalid Authorization header format"))?;

        let claims = state.jwt.verify_token(token)?;
        Ok(AuthUser::from(claims))
    }
}

/// Marker extractor proving the caller is the render worker.
#[derive(Debug, Clone, Copy)]
pub struct WorkerAuth;

#[async_trait]
impl FromRequestParts<AppState> for WorkerAuth {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let expected = state
            .config
            .worker_credential
            .as_deref()
            .ok_or_else(|| ApiError::unauthorized("Worker callbacks are disabled"))?;
        let presented = parts
            .headers
            .get(WORKER_CREDENTIAL_HEADER)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| ApiError::unauthorized("Missing worker credential"))?;

        if !constant_time_eq(presented.as_bytes(), expected.as_bytes()) {
            return Err(ApiError::unauthorized("Invalid worker credential"));
        }
        Ok(WorkerAuth)
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};

    fn token(secret: &str, sub: &str, exp: i64) -> String {
        let claims = Claims {
            sub: sub.into(),
            email: None,
            exp,
        };
        encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_bytes())).unwrap()
    }

    #[test]
    fn test_verify_token() {
        let verifier = JwtVerifier::new("secret");
        let exp = chrono::Utc::now().timestamp() + 3600;

        let claims = verifier.verify_token(&token("secret", "u1", exp)).unwrap();
        assert_eq!(claims.sub, "u1");

        assert!(verifier.verify_token(&token("other", "u1", exp)).is_err());
        assert!(verifier
            .verify_token(&token("secret", "u1", chrono::Utc::now().timestamp() - 3600))
            .is_err());
        assert!(verifier.verify_token("garbage").is_err());
    }

    #[test]
    fn test_constant_time_eq() {
        assert!(constant_time_eq(b"abc", b"abc"));
        assert!(!constant_time_eq(b"abc", b"abd"));
        assert!(!constant_time_eq(b"abc", b"ab"));
    }
}
