//! User management commands.
//!
//! Accounts are created through the same service the HTTP API uses, so the
//! username, email and password rules are identical.

use kartica_server::services::auth::{AuthError, AuthService};
use thiserror::Error;

/// Errors that can occur during user operations.
#[derive(Debug, Error)]
pub enum UserCommandError {
    /// Required environment variable is missing.
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(&'static str),

    /// Database connection error.
    #[error("Database connection error: {0}")]
    Database(#[from] sqlx::Error),

    /// Registration was rejected.
    #[error(transparent)]
    Auth(#[from] AuthError),
}

/// Create a local user with a password.
///
/// # Errors
///
/// Returns an error if the input fails validation, the username or email is
/// taken, or the database is unreachable.
pub async fn create(username: &str, email: &str, password: &str) -> Result<i32, UserCommandError> {
    let database_url =
        super::database_url().ok_or(UserCommandError::MissingEnvVar("KARTICA_DATABASE_URL"))?;

    tracing::info!("Connecting to database...");
    let pool = kartica_server::db::create_pool(&database_url).await?;

    let user = AuthService::new(&pool)
        .register(username, email, password)
        .await?;

    tracing::info!(
        "User created successfully! ID: {}, Username: {}, Email: {}",
        user.id,
        user.username,
        user.email
    );

    Ok(user.id.get())
}
