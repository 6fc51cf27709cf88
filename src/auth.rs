use std::sync::Arc;

use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts},
};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{error::AppError, models::User};

/// Lifetime of every issued token.
pub const TOKEN_TTL_HOURS: i64 = 7 * 24;

/// Claims
///
/// Payload signed into every bearer token. Fields default to empty on decode so a
/// token missing `sub` surfaces as an authentication failure instead of a parse panic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (sub): the user's UUID, as a string.
    #[serde(default)]
    pub sub: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub name: String,
    /// The role at issuance. Not refreshed if the account's role later changes.
    #[serde(default)]
    pub role: String,
    /// Issued At (iat), seconds since the epoch.
    #[serde(default)]
    pub iat: i64,
    /// Expiration Time (exp), seconds since the epoch.
    pub exp: i64,
}

/// TokenCodec
///
/// HS256 signer/verifier built once from the configured secret and shared through
/// `AppState`. Verification only accepts HS256, so a token re-signed under another
/// algorithm is rejected before its signature is even considered.
#[derive(Clone)]
pub struct TokenCodec {
    inner: Arc<CodecKeys>,
}

struct CodecKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
}

impl TokenCodec {
    pub fn new(secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.leeway = 0;

        Self {
            inner: Arc::new(CodecKeys {
                encoding: EncodingKey::from_secret(secret.as_bytes()),
                decoding: DecodingKey::from_secret(secret.as_bytes()),
                validation,
            }),
        }
    }

    /// Signs a token for `user` valid for `TOKEN_TTL_HOURS` from now.
    pub fn issue(&self, user: &User) -> Result<String, AppError> {
        self.issue_at(user, Utc::now())
    }

    /// Signs a token as if issued at `issued_at`.
    pub fn issue_at(&self, user: &User, issued_at: DateTime<Utc>) -> Result<String, AppError> {
        let claims = Claims {
            sub: user.id.to_string(),
            email: user.email.clone(),
            name: user.name.clone(),
            role: user.role.to_string(),
            iat: issued_at.timestamp(),
            exp: (issued_at + Duration::hours(TOKEN_TTL_HOURS)).timestamp(),
        };
        self.sign(&claims)
    }

    /// Signs arbitrary claims with HS256.
    pub fn sign(&self, claims: &Claims) -> Result<String, AppError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.inner.encoding)
            .map_err(|_| AppError::internal("failed to generate token"))
    }

    /// Verifies signature, algorithm and expiry and returns the claims.
    pub fn verify(&self, token: &str) -> Result<Claims, AppError> {
        decode::<Claims>(token, &self.inner.decoding, &self.inner.validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => AppError::unauthorized("token expired"),
                _ => AppError::unauthorized("invalid token"),
            })
    }
}

/// AuthUser
///
/// The resolved identity of an authenticated request: subject id, email and role as
/// carried by the token. Downstream handlers and the RBAC gate read it from here.
/// The role is kept as the raw claim; matching it against `Role` is left to the gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub id: Uuid,
    pub email: String,
    pub role: Option<String>,
}

/// authenticate_request
///
/// Turns a raw `Authorization` header value into an `AuthUser`.
/// Fails with 401 when the header is absent, is not a `Bearer` credential, or carries a
/// token that is unsigned, mis-signed, expired, or without a usable subject.
pub fn authenticate_request(
    raw_header: Option<&str>,
    codec: &TokenCodec,
) -> Result<AuthUser, AppError> {
    let raw_header =
        raw_header.ok_or_else(|| AppError::unauthorized("authorization header required"))?;

    let token = raw_header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or_else(|| AppError::unauthorized("invalid token"))?;

    let claims = codec.verify(token)?;

    let sub = claims.sub.trim();
    if sub.is_empty() {
        return Err(AppError::unauthorized("invalid token (no sub)"));
    }
    let id = Uuid::parse_str(sub).map_err(|_| AppError::unauthorized("invalid token"))?;

    let role = Some(claims.role.trim())
        .filter(|role| !role.is_empty())
        .map(str::to_string);

    Ok(AuthUser {
        id,
        email: claims.email.trim().to_string(),
        role,
    })
}

/// AuthUser Extractor Implementation
///
/// Makes `AuthUser` usable as a handler argument. The first extraction per request
/// verifies the token and caches the result in the request extensions, so the
/// authentication layer and the handler share one verification.
///
/// Rejection: `AppError::Unauthorized` (401).
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    TokenCodec: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if let Some(user) = parts.extensions.get::<AuthUser>() {
            return Ok(user.clone());
        }

        let codec = TokenCodec::from_ref(state);
        let raw_header = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok());

        let user = authenticate_request(raw_header, &codec)?;
        parts.extensions.insert(user.clone());
        Ok(user)
    }
}
