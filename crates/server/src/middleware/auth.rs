//! Bearer token authentication extractor.

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};

use kartica_core::UserId;

use crate::error::{AppError, set_sentry_user};
use crate::services::session::SessionError;
use crate::state::AppState;

const BEARER: &str = "Bearer ";

/// Extractor that requires a valid bearer token.
///
/// Missing or malformed tokens are rejected with 401 "invalid token";
/// expired ones with 401 "session expired".
///
/// # Example
///
/// ```rust,ignore
/// async fn protected_handler(RequireAuth(user_id): RequireAuth) -> String {
///     format!("Hello, user {user_id}!")
/// }
/// ```
#[derive(Debug, Clone, Copy)]
pub struct RequireAuth(pub UserId);

impl FromRequestParts<AppState> for RequireAuth {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts).ok_or(SessionError::Invalid)?;
        let user_id = state.sessions().validate(token)?;

        tracing::Span::current().record("user_id", user_id.get());
        set_sentry_user(&user_id);

        Ok(Self(user_id))
    }
}

/// Extract the token from an `Authorization: Bearer <token>` header.
fn bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix(BEARER)
        .map(str::trim)
        .filter(|token| !token.is_empty())
}
