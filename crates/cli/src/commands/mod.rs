//! CLI command implementations.

pub mod migrate;
pub mod user;

use secrecy::SecretString;

/// Read the database URL, preferring `KARTICA_DATABASE_URL` over `DATABASE_URL`.
pub fn database_url() -> Option<SecretString> {
    dotenvy::dotenv().ok();

    ["KARTICA_DATABASE_URL", "DATABASE_URL"]
        .into_iter()
        .find_map(|key| std::env::var(key).ok().filter(|v| !v.trim().is_empty()))
        .map(SecretString::from)
}
