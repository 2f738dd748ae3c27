use crate::errors::AppError;
use crate::models::User;
use crate::state::AppState;
use axum::{extract::FromRequestParts, http::header, http::request::Parts};
use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AuthError {
    /// Expired, tampered, malformed and unresolvable tokens all collapse
    /// into this one signal; callers never learn which it was.
    #[error("Invalid token")]
    InvalidToken,

    #[error("Token signing failed: {0}")]
    Signing(#[from] jsonwebtoken::errors::Error),
}

/// Deterministic salted SHA-256 password digests. The salt is a single
/// application-wide secret injected from configuration.
#[derive(Clone)]
pub struct PasswordHasher {
    salt: String,
}

impl PasswordHasher {
    pub fn new(salt: String) -> Self {
        Self { salt }
    }

    /// Hex digest of SHA-256 over password followed by the salt.
    pub fn hash(&self, password: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(password.as_bytes());
        hasher.update(self.salt.as_bytes());
        hex::encode(hasher.finalize())
    }

    pub fn verify(&self, password: &str, digest: &str) -> bool {
        self.hash(password) == digest
    }
}

/// Claims carried by a session token: the subject user id and an
/// absolute expiry, nothing else.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: String,
    pub exp: u64,
}

impl Claims {
    pub fn subject_id(&self) -> Result<i64, AuthError> {
        self.sub.parse().map_err(|_| AuthError::InvalidToken)
    }
}

/// Issues and validates HS256 session tokens.
#[derive(Clone)]
pub struct TokenService {
    secret: String,
    ttl: Duration,
}

impl TokenService {
    pub fn new(secret: String, ttl: Duration) -> Self {
        Self { secret, ttl }
    }

    /// Signs a token for the given user, expiring after the configured TTL.
    pub fn issue(&self, user_id: i64) -> Result<String, AuthError> {
        let claims = Claims {
            sub: user_id.to_string(),
            exp: (Utc::now() + self.ttl).timestamp() as u64,
        };
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )?;
        Ok(token)
    }

    /// Verifies signature and expiry, with no leeway.
    pub fn validate(&self, token: &str) -> Result<Claims, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        let token_data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &validation,
        )
        .map_err(|_| AuthError::InvalidToken)?;

        Ok(token_data.claims)
    }
}

/// Extractor resolving the `Authorization: Bearer` header to the current
/// stored user record. Protected handlers take this as an argument.
#[derive(Debug, Clone)]
pub struct AuthUser(pub User);

impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let header_value = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or(AuthError::InvalidToken)?;
        let token = header_value
            .strip_prefix("Bearer ")
            .ok_or(AuthError::InvalidToken)?;

        let claims = state.token_service.validate(token)?;
        let user_id = claims.subject_id()?;

        // A token whose subject no longer resolves is treated exactly
        // like a bad token.
        let user = state
            .user_repo
            .get_by_id(user_id)
            .await?
            .ok_or(AuthError::InvalidToken)?;

        Ok(AuthUser(user))
    }
}
