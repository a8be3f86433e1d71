use crate::error::AppError;
use crate::models::AuthUser;
use crate::state::AppState;
use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header, request::Parts, HeaderMap},
};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use bcrypt::{hash, verify, BcryptError, DEFAULT_COST};
use sha2::{Digest, Sha256};

pub const API_KEY_HEADER: &str = "x-api-key";

pub fn hash_password(password: &str) -> Result<String, BcryptError> {
    hash(password, DEFAULT_COST)
}

pub fn verify_password(password: &str, hash: &str) -> bool {
    verify(password, hash).unwrap_or(false)
}

/// Match a username and password against the configured users.
pub fn check_credentials<'a>(
    users: &'a [AuthUser],
    username: &str,
    password: &str,
) -> Option<&'a AuthUser> {
    users
        .iter()
        .find(|user| user.username == username)
        .filter(|user| verify_password(password, &user.password_hash))
}

/// Keys are compared by SHA-256 digest so the comparison time says nothing about the stored key.
pub fn check_api_key<'a>(users: &'a [AuthUser], key: &str) -> Option<&'a AuthUser> {
    if key.is_empty() {
        return None;
    }
    let presented = api_key_digest(key);
    users
        .iter()
        .find(|user| !user.api_key.is_empty() && api_key_digest(&user.api_key) == presented)
}

fn api_key_digest(key: &str) -> Vec<u8> {
    Sha256::digest(key.as_bytes()).to_vec()
}

/// Decode an `Authorization: Basic ...` value into `(username, password)`.
pub fn parse_basic(value: &str) -> Option<(String, String)> {
    let (scheme, encoded) = value.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("basic") {
        return None;
    }
    let decoded = STANDARD.decode(encoded.trim()).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (username, password) = decoded.split_once(':')?;
    Some((username.to_string(), password.to_string()))
}

/// Resolve the caller from an `x-api-key` header or HTTP Basic credentials.
pub fn authenticate<'a>(users: &'a [AuthUser], headers: &HeaderMap) -> Result<&'a AuthUser, AppError> {
    if let Some(key) = headers.get(API_KEY_HEADER).and_then(|v| v.to_str().ok()) {
        if let Some(user) = check_api_key(users, key) {
            return Ok(user);
        }
    }

    let basic = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(parse_basic);
    if let Some((username, password)) = basic {
        if let Some(user) = check_credentials(users, &username, &password) {
            return Ok(user);
        }
    }

    Err(AppError::auth_required())
}

/// Extractor for routes that require a configured user.
#[derive(Debug, Clone)]
pub struct Authenticated(pub AuthUser);

#[async_trait]
impl FromRequestParts<AppState> for Authenticated {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        match authenticate(&state.config.users, &parts.headers) {
            Ok(user) => Ok(Authenticated(user.clone())),
            Err(err) => {
                tracing::warn!("rejected unauthenticated request to {}", parts.uri.path());
                Err(err)
            }
        }
    }
}
