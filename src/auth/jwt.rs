use axum::extract::FromRef;
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};
use time::{Date, Duration, OffsetDateTime};
use tracing::debug;

use crate::auth::repo_types::User;
use crate::config::JwtConfig;
use crate::state::AppState;

/// Payload carried by both token kinds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    pub id: i32,
    pub email: String,
    pub bod: Option<Date>,
    pub iat: usize,
    pub exp: usize,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum VerifyError {
    /// Signature valid, past expiry.
    #[error("token expired")]
    Expired,
    /// Bad signature, wrong secret or malformed token.
    #[error("token invalid")]
    Invalid,
}

/// Signs and verifies access and refresh tokens with independent secrets.
#[derive(Clone)]
pub struct TokenService {
    access_encoding: EncodingKey,
    access_decoding: DecodingKey,
    refresh_encoding: EncodingKey,
    refresh_decoding: DecodingKey,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl FromRef<AppState> for TokenService {
    fn from_ref(state: &AppState) -> Self {
        Self::new(&state.config.jwt)
    }
}

impl TokenService {
    pub fn new(cfg: &JwtConfig) -> Self {
        Self {
            access_encoding: EncodingKey::from_secret(cfg.access_secret.as_bytes()),
            access_decoding: DecodingKey::from_secret(cfg.access_secret.as_bytes()),
            refresh_encoding: EncodingKey::from_secret(cfg.refresh_secret.as_bytes()),
            refresh_decoding: DecodingKey::from_secret(cfg.refresh_secret.as_bytes()),
            access_ttl: Duration::minutes(cfg.access_ttl_minutes),
            refresh_ttl: Duration::minutes(cfg.refresh_ttl_minutes),
        }
    }

    fn sign(&self, user: &User, key: &EncodingKey, ttl: Duration) -> anyhow::Result<String> {
        let now = OffsetDateTime::now_utc();
        let claims = Claims {
            id: user.id,
            email: user.email.clone(),
            bod: user.bod,
            iat: now.unix_timestamp() as usize,
            exp: (now + ttl).unix_timestamp() as usize,
        };
        let token = encode(&Header::default(), &claims, key)?;
        debug!(user_id = user.id, "jwt signed");
        Ok(token)
    }

    pub fn sign_access(&self, user: &User) -> anyhow::Result<String> {
        self.sign(user, &self.access_encoding, self.access_ttl)
    }

    pub fn sign_refresh(&self, user: &User) -> anyhow::Result<String> {
        self.sign(user, &self.refresh_encoding, self.refresh_ttl)
    }

    fn verify(token: &str, key: &DecodingKey) -> Result<Claims, VerifyError> {
        decode::<Claims>(token, key, &Validation::default())
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => VerifyError::Expired,
                _ => VerifyError::Invalid,
            })
    }

    pub fn verify_access(&self, token: &str) -> Result<Claims, VerifyError> {
        Self::verify(token, &self.access_decoding)
    }

    pub fn verify_refresh(&self, token: &str) -> Result<Claims, VerifyError> {
        Self::verify(token, &self.refresh_decoding)
    }
}
