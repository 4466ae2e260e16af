//! Server configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `KARTICA_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//! - `JWT_SECRET` - Token signing secret (min 32 chars, high entropy)
//!
//! ## Optional
//! - `KARTICA_HOST` - Bind address (default: 127.0.0.1)
//! - `KARTICA_PORT` - Listen port (default: 5001)
//! - `JWT_EXPIRES_IN_SECS` - Token lifetime in seconds (default: 86400, max: one year)
//! - `GOOGLE_CLIENT_ID` - OAuth client id; enables `POST /api/auth/google`
//! - `CORS_ALLOWED_ORIGIN` - Single allowed browser origin (default: any)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment tag
//! - `SENTRY_SAMPLE_RATE` / `SENTRY_TRACES_SAMPLE_RATE` - Sentry sampling (0.0-1.0)

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};

use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

const MIN_JWT_SECRET_LENGTH: usize = 32;
const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;
const DEFAULT_TOKEN_TTL_SECS: i64 = 24 * 60 * 60;
const MAX_TOKEN_TTL_SECS: i64 = 365 * 24 * 60 * 60;

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "secret",
    "password",
    "xxx",
    "todo",
    "fixme",
    "insert",
    "enter-",
    "put-your",
    "add-your",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Bearer token settings
    pub jwt: JwtConfig,
    /// Google OAuth client id for federated sign-in
    pub google_client_id: Option<String>,
    /// Browser origin allowed by CORS; `None` allows any origin
    pub cors_allowed_origin: Option<String>,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment name (e.g. "production")
    pub sentry_environment: Option<String>,
    /// Fraction of error events sent to Sentry
    pub sentry_sample_rate: f32,
    /// Fraction of transactions traced by Sentry
    pub sentry_traces_sample_rate: f32,
}

/// Bearer token configuration.
///
/// Implements `Debug` manually to redact the signing secret.
#[derive(Clone)]
pub struct JwtConfig {
    /// HMAC signing secret
    pub secret: SecretString,
    /// Token lifetime in seconds
    pub expires_in_secs: i64,
}

impl std::fmt::Debug for JwtConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtConfig")
            .field("secret", &"[REDACTED]")
            .field("expires_in_secs", &self.expires_in_secs)
            .finish()
    }
}

impl ServerConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if secrets fail validation (placeholder detection, entropy check).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let database_url = get_database_url("KARTICA_DATABASE_URL")?;
        let host = parse_env("KARTICA_HOST", "127.0.0.1")?;
        let port = parse_env("KARTICA_PORT", "5001")?;
        let jwt = JwtConfig::from_env()?;

        Ok(Self {
            database_url,
            host,
            port,
            jwt,
            google_client_id: get_optional_env("GOOGLE_CLIENT_ID"),
            cors_allowed_origin: get_optional_env("CORS_ALLOWED_ORIGIN"),
            sentry_dsn: get_optional_env("SENTRY_DSN"),
            sentry_environment: get_optional_env("SENTRY_ENVIRONMENT"),
            sentry_sample_rate: parse_env("SENTRY_SAMPLE_RATE", "1.0")?,
            sentry_traces_sample_rate: parse_env("SENTRY_TRACES_SAMPLE_RATE", "0.0")?,
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

impl JwtConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let secret = get_validated_secret("JWT_SECRET")?;
        validate_secret_length(&secret, "JWT_SECRET")?;

        let expires_in_secs = validate_token_ttl(parse_env(
            "JWT_EXPIRES_IN_SECS",
            &DEFAULT_TOKEN_TTL_SECS.to_string(),
        )?)?;

        Ok(Self {
            secret,
            expires_in_secs,
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Token lifetime must be positive and at most one year.
fn validate_token_ttl(secs: i64) -> Result<i64, ConfigError> {
    if secs <= 0 {
        return Err(ConfigError::InvalidEnvVar(
            "JWT_EXPIRES_IN_SECS".to_string(),
            "must be positive".to_string(),
        ));
    }
    if secs > MAX_TOKEN_TTL_SECS {
        return Err(ConfigError::InvalidEnvVar(
            "JWT_EXPIRES_IN_SECS".to_string(),
            format!("must be at most {MAX_TOKEN_TTL_SECS}"),
        ));
    }
    Ok(secs)
}

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get database URL with fallback to generic `DATABASE_URL`.
fn get_database_url(primary_key: &str) -> Result<SecretString, ConfigError> {
    if let Ok(value) = std::env::var(primary_key) {
        return Ok(SecretString::from(value));
    }
    if let Ok(value) = std::env::var("DATABASE_URL") {
        return Ok(SecretString::from(value));
    }
    Err(ConfigError::MissingEnvVar(primary_key.to_string()))
}

/// Get an optional environment variable, treating empty values as unset.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Parse an environment variable, falling back to a default literal.
fn parse_env<T>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let raw = std::env::var(key).unwrap_or_else(|_| default.to_string());
    raw.trim()
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

/// Validate that a signing secret meets minimum length requirements.
fn validate_secret_length(secret: &SecretString, var_name: &str) -> Result<(), ConfigError> {
    let value = secret.expose_secret();
    if value.len() < MIN_JWT_SECRET_LENGTH {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "must be at least {} characters (got {})",
                MIN_JWT_SECRET_LENGTH,
                value.len()
            ),
        ));
    }
    Ok(())
}

/// Calculate Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // String length will never exceed f64 precision
    let len = s.chars().count() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)]
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a secret is not a placeholder and has sufficient entropy.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    if let Some(pattern) = PLACEHOLDER_PATTERNS.iter().find(|p| lower.contains(*p)) {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!("appears to be a placeholder (contains '{pattern}')"),
        ));
    }

    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use a randomly generated secret."
            ),
        ));
    }

    Ok(())
}

/// Load and validate a secret from environment.
fn get_validated_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    validate_secret_strength(&value, key)?;
    Ok(SecretString::from(value))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_shannon_entropy_empty() {
        assert!((shannon_entropy("") - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_shannon_entropy_two_chars() {
        let entropy = shannon_entropy("ab");
        assert!((entropy - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_validate_secret_strength_placeholder() {
        let result = validate_secret_strength("changeme-jwt-signing-key-0123456789", "JWT_SECRET");
        assert!(matches!(result, Err(ConfigError::InsecureSecret(_, _))));
    }

    #[test]
    fn test_validate_secret_strength_low_entropy() {
        let result = validate_secret_strength(&"ab".repeat(20), "JWT_SECRET");
        assert!(matches!(result, Err(ConfigError::InsecureSecret(_, _))));
    }

    #[test]
    fn test_validate_secret_strength_valid() {
        let result = validate_secret_strength("aB3$xY9!mK2@nL5#pQ7&rT0*uW4^zC6", "JWT_SECRET");
        assert!(result.is_ok());
    }

    #[test]
    fn test_validate_secret_length() {
        assert!(validate_secret_length(&SecretString::from("short"), "JWT_SECRET").is_err());
        assert!(validate_secret_length(&SecretString::from("k".repeat(32)), "JWT_SECRET").is_ok());
    }

    #[test]
    fn test_parse_env_uses_default() {
        let port: u16 = parse_env("KARTICA_TEST_UNSET_PORT_VARIABLE", "5001").unwrap();
        assert_eq!(port, 5001);

        let bad: Result<u16, _> = parse_env("KARTICA_TEST_UNSET_PORT_VARIABLE", "not-a-port");
        assert!(matches!(bad, Err(ConfigError::InvalidEnvVar(_, _))));
    }

    #[test]
    fn test_validate_token_ttl_bounds() {
        assert_eq!(validate_token_ttl(60).unwrap(), 60);
        assert_eq!(validate_token_ttl(MAX_TOKEN_TTL_SECS).unwrap(), MAX_TOKEN_TTL_SECS);
        assert!(matches!(validate_token_ttl(0), Err(ConfigError::InvalidEnvVar(_, _))));
        assert!(matches!(validate_token_ttl(-5), Err(ConfigError::InvalidEnvVar(_, _))));
        assert!(matches!(
            validate_token_ttl(MAX_TOKEN_TTL_SECS + 1),
            Err(ConfigError::InvalidEnvVar(_, _))
        ));
        assert!(validate_token_ttl(i64::MAX).is_err());
    }

    #[test]
    fn test_jwt_config_debug_redacts_secret() {
        let config = JwtConfig {
            secret: SecretString::from("super_private_signing_material_1234"),
            expires_in_secs: 60,
        };

        let debug_output = format!("{config:?}");
        assert!(debug_output.contains("[REDACTED]"));
        assert!(debug_output.contains("60"));
        assert!(!debug_output.contains("super_private_signing_material"));
    }
}
