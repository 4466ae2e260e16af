//! Account route handlers: registration, password and Google login, `me`.

use axum::{Json, extract::State, http::StatusCode};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::error::{AppError, Result};
use crate::middleware::RequireAuth;
use crate::models::user::{PublicUser, User};
use crate::services::auth::{AuthError, AuthService};
use crate::services::identity::IdentityService;
use crate::state::AppState;

/// Registration form data.
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

/// Login form data.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Google sign-in payload.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoogleLoginRequest {
    pub id_token: String,
}

/// Response for register and login.
#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub user: PublicUser,
    pub token: String,
}

/// Response for Google sign-in.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GoogleLoginResponse {
    pub message: &'static str,
    pub token: String,
    pub user: PublicUser,
    pub is_new_user: bool,
    pub needs_identity_link: bool,
}

/// Plain message response.
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}

fn session_for(state: &AppState, user: &User) -> Result<SessionResponse> {
    Ok(SessionResponse {
        token: state.sessions().issue(user)?,
        user: user.to_public(),
    })
}

/// Handle registration.
#[instrument(skip_all)]
pub async fn register(
    State(state): State<AppState>,
    Json(form): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<SessionResponse>)> {
    let user = AuthService::new(state.pool())
        .register(&form.username, &form.email, &form.password)
        .await?;

    Ok((StatusCode::CREATED, Json(session_for(&state, &user)?)))
}

/// Handle password login.
#[instrument(skip_all)]
pub async fn login(
    State(state): State<AppState>,
    Json(form): Json<LoginRequest>,
) -> Result<Json<SessionResponse>> {
    let user = AuthService::new(state.pool())
        .login(&form.email, &form.password)
        .await?;

    Ok(Json(session_for(&state, &user)?))
}

/// Handle Google sign-in.
#[instrument(skip_all)]
pub async fn google(
    State(state): State<AppState>,
    Json(form): Json<GoogleLoginRequest>,
) -> Result<Json<GoogleLoginResponse>> {
    let verifier = state
        .verifier()
        .ok_or_else(|| AppError::ServiceUnavailable("Google sign-in".to_string()))?;

    if form.id_token.trim().is_empty() {
        return Err(AppError::BadRequest("idToken is required".to_string()));
    }

    let assertion = verifier
        .verify(&form.id_token)
        .await
        .map_err(AuthError::from)?;
    let outcome = IdentityService::new(state.pool())
        .login_federated(assertion)
        .await?;

    Ok(Json(GoogleLoginResponse {
        message: google_login_message(outcome.is_new_user, outcome.needs_identity_link),
        token: state.sessions().issue(&outcome.user)?,
        user: outcome.user.to_public(),
        is_new_user: outcome.is_new_user,
        needs_identity_link: outcome.needs_identity_link,
    }))
}

const fn google_login_message(is_new_user: bool, needs_identity_link: bool) -> &'static str {
    if is_new_user {
        "Account created with Google"
    } else if needs_identity_link {
        "Google account linked"
    } else {
        "Signed in with Google"
    }
}

/// Return the authenticated user.
pub async fn me(
    State(state): State<AppState>,
    RequireAuth(user_id): RequireAuth,
) -> Result<Json<PublicUser>> {
    let user = AuthService::new(state.pool())
        .current_user(user_id)
        .await?;
    Ok(Json(user.to_public()))
}

/// Logout. Tokens are stateless; the client discards its copy.
pub async fn logout(RequireAuth(user_id): RequireAuth) -> Json<MessageResponse> {
    tracing::info!(%user_id, "User logged out");
    Json(MessageResponse {
        message: "Logged out",
    })
}
