//! Identity resolution: bearer credential in, subject + display claims out.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use serde::Serialize;
use thiserror::Error;

use stockroom_core::UserId;

use crate::claims::{JwtClaims, TokenValidationError, validate_claims};

/// The authenticated subject as the rest of the request sees it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Identity {
    pub subject: UserId,
    pub login: Option<String>,
    pub role: Option<String>,
}

impl Identity {
    pub fn new(subject: UserId) -> Self {
        Self {
            subject,
            login: None,
            role: None,
        }
    }

    /// Login identifier when the token carries one, the subject id otherwise.
    pub fn audit_name(&self) -> String {
        self.login
            .clone()
            .unwrap_or_else(|| self.subject.to_string())
    }
}

impl From<JwtClaims> for Identity {
    fn from(claims: JwtClaims) -> Self {
        Self {
            subject: claims.sub,
            login: claims.login,
            role: claims.role,
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IdentityError {
    #[error("authentication token not provided")]
    MissingCredential,

    #[error("malformed authorization header: {0}")]
    MalformedCredential(String),

    #[error("invalid authentication token: {0}")]
    InvalidToken(String),

    #[error(transparent)]
    Claims(#[from] TokenValidationError),
}

/// Verifies a bearer token.
pub trait IdentityResolver: Send + Sync {
    fn resolve(&self, token: &str, now: DateTime<Utc>) -> Result<Identity, IdentityError>;
}

impl<R> IdentityResolver for Arc<R>
where
    R: IdentityResolver + ?Sized,
{
    fn resolve(&self, token: &str, now: DateTime<Utc>) -> Result<Identity, IdentityError> {
        (**self).resolve(token, now)
    }
}

/// HMAC-SHA256 JWT verification with a shared secret.
///
/// The signature is checked by `jsonwebtoken`; the time window is checked by
/// [`validate_claims`] against the caller's clock so tests can pin `now`.
pub struct Hs256JwtValidator {
    key: DecodingKey,
    validation: Validation,
}

impl Hs256JwtValidator {
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.leeway = 0;

        Self {
            key: DecodingKey::from_secret(secret.as_ref()),
            validation,
        }
    }
}

impl IdentityResolver for Hs256JwtValidator {
    fn resolve(&self, token: &str, now: DateTime<Utc>) -> Result<Identity, IdentityError> {
        let claims = jsonwebtoken::decode::<JwtClaims>(token, &self.key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| IdentityError::InvalidToken(e.to_string()))?;

        validate_claims(&claims, now)?;
        Ok(Identity::from(claims))
    }
}

/// Pull the token out of an `Authorization: Bearer <token>` header value.
pub fn extract_bearer(header: Option<&str>) -> Result<&str, IdentityError> {
    let header = header.ok_or(IdentityError::MissingCredential)?;

    let token = header
        .strip_prefix("Bearer ")
        .ok_or_else(|| IdentityError::MalformedCredential("expected 'Bearer <token>'".to_string()))?
        .trim();

    if token.is_empty() {
        return Err(IdentityError::MalformedCredential("empty bearer token".to_string()));
    }

    Ok(token)
}
