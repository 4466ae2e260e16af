//! User repository for database operations.
//!
//! Lookups used by the identity reconciler have `_for_update` variants that
//! lock the matched row until the surrounding transaction ends.

use chrono::{DateTime, Utc};
use sqlx::{Connection, PgConnection};

use kartica_core::{Email, UserId, Username};

use super::{RepositoryError, map_constraint_violation};
use crate::models::user::{NewUser, User};

/// Unique constraint on `users.username`.
pub const USERNAME_CONSTRAINT: &str = "users_username_key";

const USER_COLUMNS: &str = "id, username, email, password_hash, federated_id, display_name, \
                            created_at, updated_at";

/// Raw `users` row.
#[derive(sqlx::FromRow)]
struct UserRow {
    id: i32,
    username: String,
    email: String,
    password_hash: Option<String>,
    federated_id: Option<String>,
    display_name: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = RepositoryError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let email = Email::parse(&row.email).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid email in database: {e}"))
        })?;
        let username = Username::parse(&row.username).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid username in database: {e}"))
        })?;

        Ok(Self {
            id: UserId::new(row.id),
            username,
            email,
            password_hash: row.password_hash,
            federated_id: row.federated_id,
            display_name: row.display_name,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn into_user(row: Option<UserRow>) -> Result<Option<User>, RepositoryError> {
    row.map(User::try_from).transpose()
}

/// Repository for user database operations.
pub struct UserRepository<'c> {
    conn: &'c mut PgConnection,
}

impl<'c> UserRepository<'c> {
    /// Create a new user repository over a connection or transaction.
    #[must_use]
    pub const fn new(conn: &'c mut PgConnection) -> Self {
        Self { conn }
    }

    /// Get a user by their ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if the stored row is invalid.
    pub async fn get_by_id(&mut self, id: UserId) -> Result<Option<User>, RepositoryError> {
        let row: Option<UserRow> =
            sqlx::query_as(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
                .bind(id)
                .fetch_optional(&mut *self.conn)
                .await?;
        into_user(row)
    }

    /// Get a user by their email address.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if the stored row is invalid.
    pub async fn get_by_email(&mut self, email: &Email) -> Result<Option<User>, RepositoryError> {
        let row: Option<UserRow> =
            sqlx::query_as(&format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1"))
                .bind(email)
                .fetch_optional(&mut *self.conn)
                .await?;
        into_user(row)
    }

    /// Get a user by email and lock the row for the rest of the transaction.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if the stored row is invalid.
    pub async fn get_by_email_for_update(
        &mut self,
        email: &Email,
    ) -> Result<Option<User>, RepositoryError> {
        let row: Option<UserRow> = sqlx::query_as(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1 FOR UPDATE"
        ))
        .bind(email)
        .fetch_optional(&mut *self.conn)
        .await?;
        into_user(row)
    }

    /// Get a user by federated identity and lock the row.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if the stored row is invalid.
    pub async fn get_by_federated_id_for_update(
        &mut self,
        federated_id: &str,
    ) -> Result<Option<User>, RepositoryError> {
        let row: Option<UserRow> = sqlx::query_as(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE federated_id = $1 FOR UPDATE"
        ))
        .bind(federated_id)
        .fetch_optional(&mut *self.conn)
        .await?;
        into_user(row)
    }

    /// Check whether a username or email is already taken.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn username_or_email_exists(
        &mut self,
        username: &Username,
        email: &Email,
    ) -> Result<bool, RepositoryError> {
        let (exists,): (bool,) = sqlx::query_as(
            "SELECT EXISTS (SELECT 1 FROM users WHERE username = $1 OR email = $2)",
        )
        .bind(username)
        .bind(email)
        .fetch_one(&mut *self.conn)
        .await?;
        Ok(exists)
    }

    /// List existing usernames starting with `prefix`.
    ///
    /// The prefix must already be restricted to `[a-z0-9]`, so it carries no
    /// `LIKE` metacharacters.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn usernames_with_prefix(
        &mut self,
        prefix: &str,
    ) -> Result<Vec<String>, RepositoryError> {
        let rows: Vec<(String,)> =
            sqlx::query_as("SELECT username FROM users WHERE username LIKE $1")
                .bind(format!("{prefix}%"))
                .fetch_all(&mut *self.conn)
                .await?;
        Ok(rows.into_iter().map(|(name,)| name).collect())
    }

    /// Insert a new user.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` (carrying the constraint name) if the
    /// username, email or federated id already exists.
    /// Returns `RepositoryError::Database` for other database errors.
    pub async fn create(&mut self, new_user: &NewUser) -> Result<User, RepositoryError> {
        let row: UserRow = sqlx::query_as(&format!(
            r"
            INSERT INTO users (username, email, password_hash, federated_id, display_name)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {USER_COLUMNS}
            "
        ))
        .bind(&new_user.username)
        .bind(&new_user.email)
        .bind(&new_user.password_hash)
        .bind(new_user.federated_id.as_deref())
        .bind(new_user.display_name.as_deref())
        .fetch_one(&mut *self.conn)
        .await
        .map_err(map_constraint_violation)?;

        User::try_from(row)
    }

    /// Insert a new user inside a savepoint.
    ///
    /// A constraint violation rolls back only this insert, so the surrounding
    /// transaction stays usable and the caller can retry with other values.
    ///
    /// # Errors
    ///
    /// Same as [`Self::create`].
    pub async fn create_guarded(&mut self, new_user: &NewUser) -> Result<User, RepositoryError> {
        let mut savepoint = self.conn.begin().await?;
        let created = UserRepository::new(&mut *savepoint).create(new_user).await;
        match created {
            Ok(user) => {
                savepoint.commit().await?;
                Ok(user)
            }
            Err(e) => {
                savepoint.rollback().await?;
                Err(e)
            }
        }
    }

    /// Attach a federated identity and set the display name.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the user does not exist.
    /// Returns `RepositoryError::Conflict` if the federated id is already in use.
    pub async fn attach_federated_identity(
        &mut self,
        id: UserId,
        federated_id: &str,
        display_name: Option<&str>,
    ) -> Result<User, RepositoryError> {
        let row: Option<UserRow> = sqlx::query_as(&format!(
            r"
            UPDATE users
            SET federated_id = $2, display_name = $3, updated_at = NOW()
            WHERE id = $1
            RETURNING {USER_COLUMNS}
            "
        ))
        .bind(id)
        .bind(federated_id)
        .bind(display_name)
        .fetch_optional(&mut *self.conn)
        .await
        .map_err(map_constraint_violation)?;

        into_user(row)?.ok_or(RepositoryError::NotFound)
    }

    /// Overwrite the display name.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the user does not exist.
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn update_display_name(
        &mut self,
        id: UserId,
        display_name: &str,
    ) -> Result<User, RepositoryError> {
        let row: Option<UserRow> = sqlx::query_as(&format!(
            r"
            UPDATE users
            SET display_name = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING {USER_COLUMNS}
            "
        ))
        .bind(id)
        .bind(display_name)
        .fetch_optional(&mut *self.conn)
        .await?;

        into_user(row)?.ok_or(RepositoryError::NotFound)
    }
}
