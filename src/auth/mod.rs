pub mod password;
pub mod token;

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use axum_extra::headers::{authorization::Bearer, Authorization};
use axum_extra::TypedHeader;
use serde::{Deserialize, Serialize};

use crate::{auth::token::TokenError, error::AppError, state::AppState};

/// The verified identity attached to a request. Handlers take this extractor
/// instead of ever reading a user id out of the request payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthenticatedUser {
    pub user_id: i64,
    pub username: String,
}

#[async_trait]
impl FromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let TypedHeader(Authorization(bearer)) =
            TypedHeader::<Authorization<Bearer>>::from_request_parts(parts, state)
                .await
                .map_err(|_| AppError::unauthorized("unauthorized"))?;

        let claims = state.tokens.verify(bearer.token()).map_err(|err| match err {
            TokenError::BadSignature => AppError::unauthorized("unauthorized"),
            TokenError::Expired | TokenError::Malformed => {
                AppError::bad_request("invalid or expired token")
            }
        })?;

        Ok(AuthenticatedUser {
            user_id: claims.sub,
            username: claims.username,
        })
    }
}

/// Shared-secret gate for the raw bucket upload route. Orthogonal to the
/// bearer-token gate; checks `X-Api-Key` against the configured value.
pub struct StaticApiKey;

#[async_trait]
impl FromRequestParts<AppState> for StaticApiKey {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let expected = state
            .config
            .api_key
            .as_deref()
            .ok_or_else(|| AppError::unauthorized("unauthorized"))?;

        let provided = parts
            .headers
            .get("x-api-key")
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| AppError::unauthorized("unauthorized"))?;

        if provided != expected {
            return Err(AppError::unauthorized("unauthorized"));
        }

        Ok(StaticApiKey)
    }
}
