//! Credential store.
//!
//! Local accounts authenticate with an Argon2id password hash. Federated
//! sign-in goes through [`crate::services::identity`] instead and reuses the
//! hashing helpers here for its placeholder password.

mod error;

pub use error::AuthError;

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use sqlx::PgPool;

use kartica_core::{Email, UserId, Username};

use crate::db::{self, RepositoryError, UserRepository};
use crate::models::user::{NewUser, User};

/// Minimum password length.
pub const MIN_PASSWORD_LENGTH: usize = 6;

/// Maximum password length, bounding hashing cost.
const MAX_PASSWORD_LENGTH: usize = 128;

/// Authentication service for local accounts.
pub struct AuthService<'a> {
    pool: &'a PgPool,
}

impl<'a> AuthService<'a> {
    /// Create a new authentication service.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Register a new user with username, email and password.
    ///
    /// The existence check and the insert share one transaction; a unique
    /// violation from a concurrent registration is reported the same way.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidUsername` or `AuthError::InvalidEmail` for malformed input.
    /// Returns `AuthError::WeakPassword` if the password doesn't meet requirements.
    /// Returns `AuthError::UserAlreadyExists` if the username or email is taken.
    pub async fn register(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<User, AuthError> {
        let username = Username::parse(username)?;
        let email = Email::parse(email)?;
        validate_password(password)?;

        let password_hash = hash_password(password)?;

        let user = db::in_transaction(self.pool, move |conn| {
            Box::pin(async move {
                let mut users = UserRepository::new(conn);

                if users.username_or_email_exists(&username, &email).await? {
                    return Err(AuthError::UserAlreadyExists);
                }

                users
                    .create(&NewUser {
                        username,
                        email,
                        password_hash,
                        federated_id: None,
                        display_name: None,
                    })
                    .await
                    .map_err(map_duplicate)
            })
        })
        .await?;

        tracing::info!(user_id = %user.id, username = %user.username, "User registered");
        Ok(user)
    }

    /// Login with email and password.
    ///
    /// Unknown emails, accounts without a password and wrong passwords all
    /// produce the same error.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` if the email or password is wrong.
    pub async fn login(&self, email: &str, password: &str) -> Result<User, AuthError> {
        let email = Email::parse(email).map_err(|_| AuthError::InvalidCredentials)?;

        let mut conn = self.pool.acquire().await.map_err(RepositoryError::from)?;
        let user = UserRepository::new(&mut conn)
            .get_by_email(&email)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        let Some(hash) = user.password_hash.as_deref() else {
            tracing::debug!(user_id = %user.id, "Password login attempted on federated-only account");
            return Err(AuthError::InvalidCredentials);
        };
        verify_password(password, hash)?;

        tracing::info!(user_id = %user.id, "User logged in");
        Ok(user)
    }

    /// Get the user behind a validated session.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::UserNotFound` if the account no longer exists.
    pub async fn current_user(&self, user_id: UserId) -> Result<User, AuthError> {
        let mut conn = self.pool.acquire().await.map_err(RepositoryError::from)?;
        UserRepository::new(&mut conn)
            .get_by_id(user_id)
            .await?
            .ok_or(AuthError::UserNotFound)
    }
}

fn map_duplicate(e: RepositoryError) -> AuthError {
    match e {
        RepositoryError::Conflict(_) => AuthError::UserAlreadyExists,
        other => AuthError::Repository(other),
    }
}

/// Validate password requirements.
fn validate_password(password: &str) -> Result<(), AuthError> {
    let len = password.chars().count();
    if len < MIN_PASSWORD_LENGTH {
        return Err(AuthError::WeakPassword(format!(
            "password must be at least {MIN_PASSWORD_LENGTH} characters"
        )));
    }
    if len > MAX_PASSWORD_LENGTH {
        return Err(AuthError::WeakPassword(format!(
            "password must be at most {MAX_PASSWORD_LENGTH} characters"
        )));
    }
    Ok(())
}

/// Hash a password using Argon2id.
pub(crate) fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| AuthError::PasswordHash)
}

/// Verify a password against a hash.
fn verify_password(password: &str, hash: &str) -> Result<(), AuthError> {
    let parsed_hash = PasswordHash::new(hash).map_err(|_| AuthError::InvalidCredentials)?;
    let argon2 = Argon2::default();

    argon2
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| AuthError::InvalidCredentials)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify_password() {
        let hash = hash_password("tajna123").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password("tajna123", &hash).is_ok());
        assert!(matches!(
            verify_password("tajna124", &hash),
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[test]
    fn test_hashes_are_salted() {
        let a = hash_password("same-password").unwrap();
        let b = hash_password("same-password").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_verify_rejects_malformed_hash() {
        assert!(matches!(
            verify_password("anything", "not-a-phc-string"),
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[test]
    fn test_validate_password_length() {
        assert!(validate_password("123456").is_ok());
        assert!(matches!(
            validate_password("12345"),
            Err(AuthError::WeakPassword(_))
        ));
        assert!(matches!(
            validate_password(&"x".repeat(129)),
            Err(AuthError::WeakPassword(_))
        ));
    }

    #[test]
    fn test_map_duplicate() {
        assert!(matches!(
            map_duplicate(RepositoryError::Conflict("users_email_key".to_owned())),
            AuthError::UserAlreadyExists
        ));
        assert!(matches!(
            map_duplicate(RepositoryError::NotFound),
            AuthError::Repository(RepositoryError::NotFound)
        ));
    }
}
