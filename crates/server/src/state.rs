//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;

use crate::config::ServerConfig;
use crate::services::identity::{AssertionVerifier, GoogleTokenInfoVerifier};
use crate::services::session::SessionIssuer;

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// shared resources like database connections and configuration.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: ServerConfig,
    pool: PgPool,
    sessions: SessionIssuer,
    verifier: Option<Arc<dyn AssertionVerifier>>,
}

impl AppState {
    /// Create a new application state.
    ///
    /// Federated sign-in is enabled only when `GOOGLE_CLIENT_ID` is configured.
    #[must_use]
    pub fn new(config: ServerConfig, pool: PgPool) -> Self {
        let verifier = config.google_client_id.as_deref().map(|client_id| {
            Arc::new(GoogleTokenInfoVerifier::new(client_id)) as Arc<dyn AssertionVerifier>
        });
        Self::with_verifier(config, pool, verifier)
    }

    /// Create application state with an explicit assertion verifier.
    #[must_use]
    pub fn with_verifier(
        config: ServerConfig,
        pool: PgPool,
        verifier: Option<Arc<dyn AssertionVerifier>>,
    ) -> Self {
        let sessions = SessionIssuer::new(&config.jwt);

        Self {
            inner: Arc::new(AppStateInner {
                config,
                pool,
                sessions,
                verifier,
            }),
        }
    }

    /// Get a reference to the server configuration.
    #[must_use]
    pub fn config(&self) -> &ServerConfig {
        &self.inner.config
    }

    /// Get a reference to the database connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.inner.pool
    }

    /// Get the bearer token issuer.
    #[must_use]
    pub fn sessions(&self) -> &SessionIssuer {
        &self.inner.sessions
    }

    /// Get the federated assertion verifier, if federated sign-in is enabled.
    #[must_use]
    pub fn verifier(&self) -> Option<&dyn AssertionVerifier> {
        self.inner.verifier.as_deref()
    }
}
