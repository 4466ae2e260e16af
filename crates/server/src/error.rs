//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type that captures errors to Sentry before
//! responding to the client. All route handlers return `Result<T, AppError>`.
//! Responses carry a JSON body `{"message": …}`; server-side details are
//! logged, never sent.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::services::auth::AuthError;
use crate::services::identity::AssertionError;
use crate::services::progress::ProgressError;
use crate::services::quiz::QuizError;
use crate::services::session::SessionError;

const GENERIC_SERVER_MESSAGE: &str = "Something went wrong, please try again";

/// Application-level error type.
#[derive(Debug, Error)]
pub enum AppError {
    /// Authentication or identity operation failed.
    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    /// Bearer token missing, invalid or expired.
    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    /// Progress ledger operation failed.
    #[error("Progress error: {0}")]
    Progress(#[from] ProgressError),

    /// Quiz log operation failed.
    #[error("Quiz error: {0}")]
    Quiz(#[from] QuizError),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// A feature is not configured on this server.
    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),
}

impl AppError {
    /// HTTP status for this error.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Auth(err) => match err {
                AuthError::InvalidEmail(_)
                | AuthError::InvalidUsername(_)
                | AuthError::WeakPassword(_)
                | AuthError::Assertion(AssertionError::MissingClaims) => StatusCode::BAD_REQUEST,
                AuthError::InvalidCredentials | AuthError::Assertion(AssertionError::Invalid(_)) => {
                    StatusCode::UNAUTHORIZED
                }
                AuthError::IdentityConflict => StatusCode::FORBIDDEN,
                AuthError::UserNotFound => StatusCode::NOT_FOUND,
                AuthError::UserAlreadyExists | AuthError::UsernameExhausted => StatusCode::CONFLICT,
                AuthError::Assertion(AssertionError::Unavailable(_)) => StatusCode::BAD_GATEWAY,
                AuthError::Repository(_) | AuthError::PasswordHash => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            Self::Session(err) => match err {
                SessionError::Expired | SessionError::Invalid => StatusCode::UNAUTHORIZED,
                SessionError::Signing(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Progress(err) => match err {
                ProgressError::InvalidKey(_) | ProgressError::InvalidInput(_) => {
                    StatusCode::BAD_REQUEST
                }
                ProgressError::Repository(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Quiz(err) => match err {
                QuizError::InvariantViolation(_)
                | QuizError::InvalidKey(_)
                | QuizError::InvalidInput(_) => StatusCode::BAD_REQUEST,
                QuizError::Repository(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    /// Message safe to show to clients.
    #[must_use]
    pub fn public_message(&self) -> String {
        // Don't expose internal error details to clients
        if self.status().is_server_error() {
            return match self {
                Self::Auth(AuthError::Assertion(AssertionError::Unavailable(_))) => {
                    "Identity provider unavailable, please try again".to_string()
                }
                Self::ServiceUnavailable(feature) => format!("{feature} is not available"),
                _ => GENERIC_SERVER_MESSAGE.to_string(),
            };
        }

        match self {
            Self::Auth(err) => match err {
                AuthError::InvalidCredentials => "Invalid email or password".to_string(),
                AuthError::UserNotFound => "User not found".to_string(),
                AuthError::UserAlreadyExists => {
                    "This email or username is already in use".to_string()
                }
                AuthError::IdentityConflict => {
                    "This email is linked to a different Google account".to_string()
                }
                AuthError::UsernameExhausted => {
                    "Could not choose a username for this account".to_string()
                }
                AuthError::Assertion(AssertionError::Invalid(_)) => {
                    "Invalid Google credential".to_string()
                }
                AuthError::Assertion(AssertionError::MissingClaims) => {
                    "Google did not provide a usable account identity".to_string()
                }
                other => other.to_string(),
            },
            Self::Session(err) => err.to_string(),
            Self::Progress(err) => err.to_string(),
            Self::Quiz(err) => err.to_string(),
            Self::BadRequest(msg) => msg.clone(),
            _ => self.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Capture server errors to Sentry
        if status.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        (status, Json(json!({ "message": self.public_message() }))).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Set the Sentry user context from a user ID.
///
/// Called by the bearer extractor so errors are associated with users.
pub fn set_sentry_user(user_id: &impl ToString) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            ..Default::default()
        }));
    });
}
