use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use jwt::SignWithKey;
use jwt::VerifyWithKey;
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::database::schema::{Id, User};
use crate::error::ApiError;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SessionClaims {
    pub user_id: Id,
    iat: i64,
    exp: i64,
}

impl SessionClaims {
    pub fn new(user_id: Id, lifetime_hours: i64) -> Self {
        let now = Utc::now();
        let iat = now.timestamp();
        let exp = (now + Duration::hours(lifetime_hours)).timestamp();

        Self { user_id, iat, exp }
    }

    pub fn is_expired(&self) -> bool {
        self.exp <= Utc::now().timestamp()
    }
}

/// The authenticated caller, resolved from a token against the store.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct SessionData {
    pub user_id: Id,
    pub username: String,
    pub email: String,
}

impl From<&User> for SessionData {
    fn from(user: &User) -> Self {
        Self {
            user_id: user.id,
            username: user.username.to_owned(),
            email: user.email.to_owned(),
        }
    }
}

fn signing_key(secret: &str) -> Result<Hmac<Sha256>, ApiError> {
    Hmac::new_from_slice(secret.as_bytes())
        .map_err(|e| ApiError::Internal(format!("Invalid signing key: {e}")))
}

pub fn generate_jwt_session(user: &User, secret: &str, lifetime_hours: i64) -> Result<String, ApiError> {
    let key = signing_key(secret)?;
    let claims = SessionClaims::new(user.id, lifetime_hours);

    claims
        .sign_with_key(&key)
        .map_err(|e| ApiError::Internal(format!("Token signing failed: {e}")))
}

pub fn verify_jwt_session(token: &str, secret: &str) -> Result<SessionClaims, ApiError> {
    let key = signing_key(secret)?;

    let claims: SessionClaims = token
        .verify_with_key(&key)
        .map_err(|_| ApiError::InvalidToken)?;

    if claims.is_expired() {
        return Err(ApiError::InvalidToken);
    }
    Ok(claims)
}
