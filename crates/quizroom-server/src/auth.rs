//! Caller identity.
//!
//! Tokens are `"{user_id}.{hex hmac-sha256(user_id)}"`. They are accepted
//! from `Authorization: Bearer` or a `token` query parameter, since
//! `EventSource` clients cannot set headers.

use std::sync::Arc;

use axum::extract::{FromRequestParts, Query};
use axum::http::request::Parts;
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;

use quizroom_core::error::RoomError;
use quizroom_core::player::{User, UserId};

use crate::error::AppError;
use crate::state::AppState;

type HmacSha256 = Hmac<Sha256>;

#[derive(Clone)]
pub struct AuthConfig {
    token_secret: Arc<[u8]>,
}

impl AuthConfig {
    pub fn new(token_secret: &[u8]) -> Self {
        Self {
            token_secret: Arc::from(token_secret),
        }
    }

    /// A config with a random per-process key.
    pub fn ephemeral() -> Self {
        let secret: [u8; 32] = rand::random();
        Self::new(&secret)
    }

    fn mac(&self) -> HmacSha256 {
        // HMAC accepts keys of any length.
        match HmacSha256::new_from_slice(&self.token_secret) {
            Ok(mac) => mac,
            Err(_) => unreachable!("hmac key length is unrestricted"),
        }
    }

    pub fn issue_token(&self, user_id: UserId) -> String {
        let mut mac = self.mac();
        mac.update(user_id.to_string().as_bytes());
        format!("{user_id}.{}", hex::encode(mac.finalize().into_bytes()))
    }

    /// The user id a token was issued for, if its signature checks out.
    pub fn verify_token(&self, token: &str) -> Option<UserId> {
        let (id, signature) = token.split_once('.')?;
        let user_id = id.parse::<UserId>().ok()?;
        let expected = hex::decode(signature).ok()?;
        let mut mac = self.mac();
        mac.update(id.as_bytes());
        mac.verify_slice(&expected).ok()?;
        Some(user_id)
    }
}

#[derive(Deserialize)]
struct TokenQuery {
    token: Option<String>,
}

fn bearer_token(parts: &Parts) -> Option<String> {
    if let Some(token) = parts
        .headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
    {
        return Some(token.trim().to_string());
    }
    Query::<TokenQuery>::try_from_uri(&parts.uri)
        .ok()
        .and_then(|Query(q)| q.token)
}

/// The authenticated caller, resolved to a stored user.
#[derive(Debug, Clone)]
pub struct Identity(pub User);

impl FromRequestParts<AppState> for Identity {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, AppError> {
        let token = bearer_token(parts)
            .ok_or_else(|| AppError::Unauthorized("missing token".to_string()))?;
        let user_id = state
            .auth
            .verify_token(&token)
            .ok_or_else(|| AppError::Unauthorized("invalid token".to_string()))?;
        let user = state
            .store
            .find_user(user_id)
            .await?
            .ok_or(RoomError::UserNotFound)?;
        Ok(Self(user))
    }
}
