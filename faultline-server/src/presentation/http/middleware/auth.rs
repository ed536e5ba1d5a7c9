use axum::extract::FromRequestParts;
use axum::http::{HeaderMap, header, request::Parts};

use crate::application::failure::Failure;
use crate::domain::error::AppError;
use crate::presentation::AppState;

pub(crate) const NOT_LOGGED_IN_MESSAGE: &str = "You are not logged in! Please log in to get access.";

#[derive(Debug, Clone)]
pub(crate) struct AuthenticatedUser {
    pub(crate) user_id: i64,
    pub(crate) username: String,
}

impl FromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = Failure;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers)
            .ok_or_else(|| AppError::unauthorized(NOT_LOGGED_IN_MESSAGE))?;

        // token failures propagate untouched; the normalizer classifies them
        let claims = state.jwt.verify_token(token)?;

        Ok(Self {
            user_id: claims.user_id,
            username: claims.username,
        })
    }
}

/// Token from a well-formed `Authorization: Bearer <token>` header.
pub(crate) fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let auth_header = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())?;

    let mut parts = auth_header.split_whitespace();
    let scheme = parts.next()?;
    let token = parts.next()?;
    if parts.next().is_some() || !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }

    let token = token.trim();
    (!token.is_empty()).then_some(token)
}
