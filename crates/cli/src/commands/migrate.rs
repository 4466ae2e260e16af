//! Database migration command.
//!
//! Applies the server's embedded migrations (`crates/server/migrations/`).
//! Already-applied migrations are skipped, so running it twice is harmless.

use thiserror::Error;

/// Errors that can occur while migrating.
#[derive(Debug, Error)]
pub enum MigrationError {
    /// Required environment variable is missing.
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(&'static str),

    /// Database connection error.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A migration failed to apply.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// Run all pending migrations.
///
/// # Errors
///
/// Returns an error if the database URL is missing, the connection fails,
/// or a migration fails to apply.
pub async fn run() -> Result<(), MigrationError> {
    let database_url =
        super::database_url().ok_or(MigrationError::MissingEnvVar("KARTICA_DATABASE_URL"))?;

    tracing::info!("Connecting to database...");
    let pool = kartica_server::db::create_pool(&database_url).await?;

    tracing::info!("Running migrations...");
    sqlx::migrate!("../server/migrations").run(&pool).await?;

    tracing::info!("Migrations complete!");
    Ok(())
}
