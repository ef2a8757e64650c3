use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use shared::domain::UserId;

/// CSRF tokens outlive a form but not a session.
const CSRF_TTL_SECONDS: i64 = 2 * 60 * 60;

#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub secret: String,
    pub ttl_seconds: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
enum Purpose {
    Session,
    Csrf,
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String,
    iat: i64,
    exp: i64,
    purpose: Purpose,
}

fn mint(
    cfg: &AuthConfig,
    user_id: UserId,
    purpose: Purpose,
    ttl_seconds: i64,
) -> Result<String, jsonwebtoken::errors::Error> {
    let now = Utc::now();
    let claims = Claims {
        sub: format!("user:{}", user_id.0),
        iat: now.timestamp(),
        exp: (now + Duration::seconds(ttl_seconds)).timestamp(),
        purpose,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(cfg.secret.as_bytes()),
    )
}

fn verify(cfg: &AuthConfig, token: &str, purpose: Purpose) -> Option<UserId> {
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(cfg.secret.as_bytes()),
        &Validation::default(),
    )
    .ok()?;
    if data.claims.purpose != purpose {
        return None;
    }
    data.claims
        .sub
        .strip_prefix("user:")
        .and_then(|id| id.parse().ok())
        .map(UserId)
}

pub fn mint_session_token(
    cfg: &AuthConfig,
    user_id: UserId,
) -> Result<String, jsonwebtoken::errors::Error> {
    mint(cfg, user_id, Purpose::Session, cfg.ttl_seconds)
}

/// The user a session token was issued to, if it is valid and unexpired.
pub fn verify_session_token(cfg: &AuthConfig, token: &str) -> Option<UserId> {
    verify(cfg, token, Purpose::Session)
}

pub fn mint_csrf_token(
    cfg: &AuthConfig,
    user_id: UserId,
) -> Result<String, jsonwebtoken::errors::Error> {
    mint(cfg, user_id, Purpose::Csrf, CSRF_TTL_SECONDS)
}

pub fn verify_csrf_token(cfg: &AuthConfig, user_id: UserId, token: &str) -> bool {
    verify(cfg, token, Purpose::Csrf) == Some(user_id)
}

#[cfg(test)]
#[path = "tests/auth_tests.rs"]
mod tests;
