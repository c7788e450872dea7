use async_trait::async_trait;
use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use tracing::{debug, warn};

use super::claims::{Claims, TokenKind};
use crate::{error::ApiError, state::AppState, users::repo::User};

/// Raw bearer token from the `Authorization` header.
pub fn bearer_token(parts: &Parts) -> Result<&str, ApiError> {
    let header = parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| ApiError::unauthorized("Not authenticated"))?;

    header
        .strip_prefix("Bearer ")
        .or_else(|| header.strip_prefix("bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ApiError::unauthorized("Invalid authorization scheme"))
}

/// The user behind a valid access token.
pub struct CurrentUser(pub User);

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)?;
        let claims = state.jwt.verify(token, TokenKind::Access).map_err(|e| {
            warn!(error = %e, "access token rejected");
            ApiError::from(e)
        })?;

        if let Some(user) = state.user_cache.get(&claims.sub) {
            debug!(user_id = %user.id, "current user from cache");
            return Ok(CurrentUser(user));
        }

        let user = state
            .users
            .get_by_email(&claims.sub)
            .await?
            .ok_or_else(|| ApiError::unauthorized("Could not validate credentials"))?;
        state.user_cache.insert(user.clone());
        Ok(CurrentUser(user))
    }
}

/// Claims of a valid refresh token, for the token rotation endpoint.
pub struct RefreshClaims {
    pub token: String,
    pub claims: Claims,
}

#[async_trait]
impl FromRequestParts<AppState> for RefreshClaims {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)?.to_string();
        let claims = state.jwt.verify(&token, TokenKind::Refresh)?;
        Ok(RefreshClaims { token, claims })
    }
}
