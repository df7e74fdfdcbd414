use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::account::{Account, Role};

#[derive(thiserror::Error, Debug)]
pub enum TokenError {
    #[error("Invalid or expired token")]
    Invalid(#[source] jsonwebtoken::errors::Error),

    #[error("Failed to sign token: {0}")]
    Signing(#[source] jsonwebtoken::errors::Error),
}

/// Claims carried by an access token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessClaims {
    pub sub: Uuid,
    pub name: String,
    pub role: Role,
    pub pwd_reset: bool,
    pub iat: i64,
    pub exp: i64,
}

impl AccessClaims {
    pub fn new(account_id: Uuid, name: &str, role: Role, pwd_reset: bool, ttl: Duration) -> Self {
        let now = Utc::now();

        Self {
            sub: account_id,
            name: name.to_string(),
            role,
            pwd_reset,
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
        }
    }

    pub fn for_account(account: &Account, ttl: Duration) -> Self {
        Self::new(
            account.id,
            &account.name,
            account.role,
            account.password_reset_required,
            ttl,
        )
    }
}

/// Signs the claims with HS256.
pub fn issue_access_token(claims: &AccessClaims, secret: &str) -> Result<String, TokenError> {
    let key = EncodingKey::from_secret(secret.as_bytes());
    encode(&Header::default(), claims, &key).map_err(TokenError::Signing)
}

/// Verifies signature and expiry and returns the claims.
pub fn verify_access_token(token: &str, secret: &str) -> Result<AccessClaims, TokenError> {
    let key = DecodingKey::from_secret(secret.as_bytes());

    decode::<AccessClaims>(token, &key, &Validation::default())
        .map(|data| data.claims)
        .map_err(TokenError::Invalid)
}
