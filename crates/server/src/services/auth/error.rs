//! Authentication error types.

use thiserror::Error;

use crate::db::RepositoryError;
use crate::services::identity::AssertionError;

/// Errors that can occur during authentication and identity reconciliation.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Invalid email format.
    #[error("invalid email: {0}")]
    InvalidEmail(#[from] kartica_core::EmailError),

    /// Invalid username format.
    #[error("invalid username: {0}")]
    InvalidUsername(#[from] kartica_core::UsernameError),

    /// Invalid credentials (wrong password or user not found).
    #[error("invalid credentials")]
    InvalidCredentials,

    /// User not found.
    #[error("user not found")]
    UserNotFound,

    /// Username or email already registered.
    #[error("user already exists")]
    UserAlreadyExists,

    /// Password too weak or invalid.
    #[error("password validation failed: {0}")]
    WeakPassword(String),

    /// The email belongs to an account linked to a different federated identity.
    #[error("email is linked to a different federated identity")]
    IdentityConflict,

    /// Every candidate username derived from the display name is taken.
    #[error("no free username could be derived")]
    UsernameExhausted,

    /// The federated assertion could not be verified.
    #[error("federated assertion rejected: {0}")]
    Assertion(#[from] AssertionError),

    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),

    /// Password hashing error.
    #[error("password hashing error")]
    PasswordHash,
}
