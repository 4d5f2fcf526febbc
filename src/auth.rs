//! Bearer-token identity and password handling.
//!
//! Two verification policies coexist, matching the route surface rather
//! than unifying it: account and order-listing routes reject a bad token
//! with 401 ([`AuthUser`]), while cart and checkout routes treat a bad
//! token as "no user" and fall back to the caller's guest id
//! ([`MaybeUser`]).

use argon2::password_hash::{rand_core::OsRng, SaltString};
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::header;
use axum::http::request::Parts;
use chrono::Utc;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;
use crate::AppState;

/// Resolved cart owner.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Identity {
    User(Uuid),
    Guest(String),
}

impl Identity {
    /// Best-effort resolution: a verified user wins; otherwise the caller
    /// must have supplied a guest id.
    pub fn resolve(user: Option<Uuid>, guest_id: Option<String>) -> Result<Identity, AppError> {
        match (user, guest_id) {
            (Some(id), _) => Ok(Identity::User(id)),
            (None, Some(guest)) if !guest.is_empty() => Ok(Identity::Guest(guest)),
            _ => Err(AppError::BadRequest(
                "guestId required for guest cart".to_string(),
            )),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    id: Uuid,
    exp: i64,
}

/// HS256 token issue/verify. Expiry is baked into the claims; verification
/// rejects malformed tokens, bad signatures and expired claims alike.
pub struct TokenSigner {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl_secs: i64,
}

impl TokenSigner {
    pub fn new(secret: &str, ttl_secs: i64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl_secs,
        }
    }

    pub fn issue(&self, user_id: Uuid) -> Result<String, AppError> {
        let claims = Claims {
            id: user_id,
            exp: Utc::now().timestamp() + self.ttl_secs,
        };
        encode(&Header::default(), &claims, &self.encoding)
            .map_err(|e| AppError::Internal(e.into()))
    }

    /// `None` for anything that does not verify; callers decide whether
    /// that is a 401 or a guest fallback.
    pub fn verify(&self, token: &str) -> Option<Uuid> {
        decode::<Claims>(token, &self.decoding, &Validation::default())
            .ok()
            .map(|data| data.claims.id)
    }
}

pub fn hash_password(password: &str) -> Result<String, AppError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::Internal(anyhow::anyhow!("password hashing failed: {e}")))
}

pub fn verify_password(password: &str, hash: &str) -> bool {
    PasswordHash::new(hash)
        .map(|parsed| {
            Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok()
        })
        .unwrap_or(false)
}

fn bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}

/// Extractor for routes where authentication is mandatory.
pub struct AuthUser(pub Uuid);

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts).ok_or(AppError::Unauthorized)?;
        let user_id = state.tokens.verify(token).ok_or(AppError::Unauthorized)?;
        Ok(AuthUser(user_id))
    }
}

/// Extractor for cart and checkout routes: an absent or invalid token
/// degrades to an anonymous caller instead of failing the request.
pub struct MaybeUser(pub Option<Uuid>);

#[async_trait]
impl FromRequestParts<AppState> for MaybeUser {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        Ok(MaybeUser(
            bearer_token(parts).and_then(|token| state.tokens.verify(token)),
        ))
    }
}
