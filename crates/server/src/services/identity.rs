//! Identity reconciler.
//!
//! Turns a verified federated assertion into a local account: reuse the
//! account already linked to the provider id, link an existing password
//! account with the same email, or create a fresh account with a synthesized
//! username. An email already linked to a *different* provider id is
//! rejected.
//!
//! The create/link/reject decision is [`plan`], a pure function of the two
//! lookups. Everything around it runs in one transaction with the matched rows
//! locked. Row locks cannot cover an account that does not exist yet, so the
//! insert runs under a savepoint: a username collision moves on to the next
//! candidate, and an email or provider id collision means a concurrent sign-in
//! created the account first, so the lookups run again and find it.

use std::collections::HashSet;

use async_trait::async_trait;
use rand::Rng;
use rand::distr::Alphanumeric;
use serde::Deserialize;
use sqlx::PgPool;
use thiserror::Error;

use kartica_core::{Email, Username};

use crate::db::users::USERNAME_CONSTRAINT;
use crate::db::{self, RepositoryError, UserRepository};
use crate::models::user::{NewUser, User};
use crate::services::auth::{AuthError, hash_password};

/// Upper bound on username candidates tried for a new account.
pub const MAX_USERNAME_CANDIDATES: u32 = 1000;

/// Longest provider subject id or display name the users table stores.
const MAX_IDENTITY_FIELD_LENGTH: usize = 255;

/// Lookup passes before a sign-in that keeps racing concurrent creates gives up.
const RECONCILE_ATTEMPTS: usize = 3;

/// Fallback username base when neither display name nor email yields one.
const FALLBACK_USERNAME: &str = "user";

/// Length of the random password stored for accounts created by federation.
const PLACEHOLDER_PASSWORD_LENGTH: usize = 32;

const TOKENINFO_URL: &str = "https://oauth2.googleapis.com/tokeninfo";

// =============================================================================
// Assertion verification
// =============================================================================

/// A federated identity that the provider has vouched for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FederatedAssertion {
    /// Stable subject id at the provider.
    pub provider_id: String,
    pub email: Email,
    pub display_name: Option<String>,
}

/// Errors from verifying a provider credential.
#[derive(Debug, Error)]
pub enum AssertionError {
    /// The provider rejected the credential or it was issued for another client.
    #[error("invalid credential: {0}")]
    Invalid(String),

    /// The credential is valid but lacks a subject or usable email.
    #[error("credential is missing required claims")]
    MissingClaims,

    /// The provider could not be reached.
    #[error("identity provider unavailable: {0}")]
    Unavailable(String),
}

/// Verifies an opaque provider credential and extracts the assertion.
///
/// Signature, audience and expiry checking belong to the implementation;
/// the reconciler only ever sees verified assertions.
#[async_trait]
pub trait AssertionVerifier: Send + Sync {
    /// Verify `credential` and return the identity it asserts.
    async fn verify(&self, credential: &str) -> Result<FederatedAssertion, AssertionError>;
}

/// Verifies Google ID tokens through Google's `tokeninfo` endpoint.
#[derive(Clone)]
pub struct GoogleTokenInfoVerifier {
    client: reqwest::Client,
    client_id: String,
}

#[derive(Debug, Deserialize)]
struct TokenInfo {
    aud: String,
    sub: Option<String>,
    email: Option<String>,
    name: Option<String>,
}

impl GoogleTokenInfoVerifier {
    /// Create a verifier that accepts tokens issued for `client_id`.
    #[must_use]
    pub fn new(client_id: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            client_id: client_id.into(),
        }
    }
}

#[async_trait]
impl AssertionVerifier for GoogleTokenInfoVerifier {
    async fn verify(&self, credential: &str) -> Result<FederatedAssertion, AssertionError> {
        let url = reqwest::Url::parse_with_params(TOKENINFO_URL, &[("id_token", credential)])
            .map_err(|e| AssertionError::Invalid(e.to_string()))?;

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| AssertionError::Unavailable(e.to_string()))?;

        let status = response.status();
        if status.is_server_error() {
            return Err(AssertionError::Unavailable(format!(
                "tokeninfo returned {status}"
            )));
        }
        if !status.is_success() {
            return Err(AssertionError::Invalid(format!("tokeninfo returned {status}")));
        }

        let info: TokenInfo = response
            .json()
            .await
            .map_err(|e| AssertionError::Invalid(e.to_string()))?;

        assertion_from_token_info(info, &self.client_id)
    }
}

fn assertion_from_token_info(
    info: TokenInfo,
    client_id: &str,
) -> Result<FederatedAssertion, AssertionError> {
    if info.aud != client_id {
        return Err(AssertionError::Invalid("audience mismatch".to_owned()));
    }

    let provider_id = info
        .sub
        .filter(|s| !s.is_empty() && s.chars().count() <= MAX_IDENTITY_FIELD_LENGTH)
        .ok_or(AssertionError::MissingClaims)?;
    let email = info
        .email
        .as_deref()
        .and_then(|e| Email::parse(e).ok())
        .ok_or(AssertionError::MissingClaims)?;

    Ok(FederatedAssertion {
        provider_id,
        email,
        display_name: info
            .name
            .filter(|n| !n.trim().is_empty())
            .map(|n| n.chars().take(MAX_IDENTITY_FIELD_LENGTH).collect()),
    })
}

// =============================================================================
// Reconciliation
// =============================================================================

/// What to do with an assertion, given the two lookups.
#[derive(Debug, Clone)]
pub enum Decision {
    /// An account is already linked to the provider id.
    Matched(User),
    /// No account has the email; create one.
    NewUser,
    /// A password account has the email and no federated id; link it.
    LinkCandidate(User),
    /// The email is linked to a different provider id.
    Conflict,
}

/// Decide how to reconcile an assertion.
///
/// `by_provider` is the account whose federated id equals `provider_id`;
/// `by_email` is the account with the asserted email.
#[must_use]
pub fn plan(by_provider: Option<User>, by_email: Option<User>, provider_id: &str) -> Decision {
    if let Some(user) = by_provider {
        return Decision::Matched(user);
    }

    match by_email {
        None => Decision::NewUser,
        Some(user) => match user.federated_id.as_deref() {
            None | Some("") => Decision::LinkCandidate(user),
            Some(existing) if existing == provider_id => Decision::Matched(user),
            Some(_) => Decision::Conflict,
        },
    }
}

/// Outcome of a federated sign-in.
#[derive(Debug, Clone)]
pub struct ReconcileOutcome {
    pub user: User,
    /// The account was created by this sign-in.
    pub is_new_user: bool,
    /// An existing password account was linked by this sign-in.
    pub needs_identity_link: bool,
}

/// Prefer `existing`, falling back to `incoming`. Empty strings count as absent.
#[must_use]
pub fn merge_field<'a>(existing: Option<&'a str>, incoming: Option<&'a str>) -> Option<&'a str> {
    existing
        .filter(|s| !s.is_empty())
        .or_else(|| incoming.filter(|s| !s.is_empty()))
}

fn username_fragment(source: &str) -> String {
    source
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_lowercase())
        .take(Username::MAX_LENGTH)
        .collect()
}

/// Derive a username base from the display name, then the email local part.
///
/// Only `[a-z0-9]` survive. A source yielding fewer than
/// [`Username::MIN_LENGTH`] characters is skipped; if both are skipped the
/// base is `user`.
#[must_use]
pub fn synthesize_username(display_name: Option<&str>, email: &Email) -> String {
    [display_name, Some(email.local_part())]
        .into_iter()
        .flatten()
        .map(username_fragment)
        .find(|fragment| fragment.len() >= Username::MIN_LENGTH)
        .unwrap_or_else(|| FALLBACK_USERNAME.to_owned())
}

/// Prefix shared by every candidate [`candidate_username`] can produce.
#[must_use]
pub fn candidate_prefix(base: &str) -> &str {
    let digits = MAX_USERNAME_CANDIDATES.saturating_sub(1).to_string().len();
    let keep = base.len().min(Username::MAX_LENGTH - digits);
    base.get(..keep).unwrap_or(base)
}

/// The `n`th username candidate: `base` itself, then `base1`, `base2`, …
///
/// The numeric suffix replaces trailing characters of `base` so the result
/// never exceeds [`Username::MAX_LENGTH`].
#[must_use]
pub fn candidate_username(base: &str, n: u32) -> String {
    if n == 0 {
        return base.to_owned();
    }
    let suffix = n.to_string();
    let keep = base
        .len()
        .min(Username::MAX_LENGTH.saturating_sub(suffix.len()));
    format!("{}{suffix}", base.get(..keep).unwrap_or(base))
}

/// Pick the first candidate not in `taken`.
///
/// # Errors
///
/// Returns `AuthError::UsernameExhausted` if all [`MAX_USERNAME_CANDIDATES`]
/// candidates are taken.
pub fn pick_username(base: &str, taken: &HashSet<String>) -> Result<Username, AuthError> {
    (0..MAX_USERNAME_CANDIDATES)
        .map(|n| candidate_username(base, n))
        .find(|candidate| !taken.contains(candidate))
        .ok_or(AuthError::UsernameExhausted)
        .and_then(|candidate| Username::parse(&candidate).map_err(AuthError::from))
}

fn placeholder_password() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(PLACEHOLDER_PASSWORD_LENGTH)
        .map(char::from)
        .collect()
}

/// Federated sign-in service.
pub struct IdentityService<'a> {
    pool: &'a PgPool,
}

impl<'a> IdentityService<'a> {
    /// Create a new identity service.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Reconcile a verified assertion with the local accounts.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::IdentityConflict` if the email is linked to another
    /// provider id, `AuthError::UsernameExhausted` if no username could be
    /// derived, and `AuthError::Repository` on storage failure. Every error
    /// leaves the database untouched.
    pub async fn login_federated(
        &self,
        assertion: FederatedAssertion,
    ) -> Result<ReconcileOutcome, AuthError> {
        let outcome = db::in_transaction(self.pool, move |conn| {
            Box::pin(async move {
                let mut users = UserRepository::new(conn);
                reconcile(&mut users, assertion).await
            })
        })
        .await?;

        tracing::info!(
            user_id = %outcome.user.id,
            is_new_user = outcome.is_new_user,
            linked = outcome.needs_identity_link,
            "Federated sign-in"
        );
        Ok(outcome)
    }
}

async fn reconcile(
    users: &mut UserRepository<'_>,
    assertion: FederatedAssertion,
) -> Result<ReconcileOutcome, AuthError> {
    for _ in 0..RECONCILE_ATTEMPTS {
        let by_provider = users
            .get_by_federated_id_for_update(&assertion.provider_id)
            .await?;
        let by_email = if by_provider.is_none() {
            users.get_by_email_for_update(&assertion.email).await?
        } else {
            None
        };

        match plan(by_provider, by_email, &assertion.provider_id) {
            Decision::Matched(user) => {
                let user =
                    backfill_display_name(users, user, assertion.display_name.as_deref()).await?;
                return Ok(ReconcileOutcome {
                    user,
                    is_new_user: false,
                    needs_identity_link: false,
                });
            }
            Decision::LinkCandidate(user) => {
                let display_name =
                    merge_field(user.display_name.as_deref(), assertion.display_name.as_deref());
                let user = users
                    .attach_federated_identity(user.id, &assertion.provider_id, display_name)
                    .await
                    .map_err(|e| match e {
                        RepositoryError::Conflict(_) => AuthError::IdentityConflict,
                        other => AuthError::Repository(other),
                    })?;
                return Ok(ReconcileOutcome {
                    user,
                    is_new_user: false,
                    needs_identity_link: true,
                });
            }
            Decision::Conflict => {
                tracing::warn!(
                    email = %assertion.email,
                    "Federated sign-in rejected: email linked to another identity"
                );
                return Err(AuthError::IdentityConflict);
            }
            Decision::NewUser => {
                if let Some(user) = create_federated_user(users, &assertion).await? {
                    return Ok(ReconcileOutcome {
                        user,
                        is_new_user: true,
                        needs_identity_link: false,
                    });
                }
                tracing::debug!(
                    email = %assertion.email,
                    "Account created concurrently, reconciling again"
                );
            }
        }
    }
    Err(AuthError::UserAlreadyExists)
}

async fn backfill_display_name(
    users: &mut UserRepository<'_>,
    user: User,
    incoming: Option<&str>,
) -> Result<User, AuthError> {
    let has_name = user.display_name.as_deref().is_some_and(|s| !s.is_empty());
    let merged = merge_field(user.display_name.as_deref(), incoming).map(str::to_owned);
    match merged {
        Some(name) if !has_name => Ok(users.update_display_name(user.id, &name).await?),
        _ => Ok(user),
    }
}

/// Which unique constraint a failed account insert ran into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertConflict {
    /// The username was taken since the candidates were chosen.
    Username,
    /// Another account now holds the email or provider id.
    Identity,
}

/// Classify the constraint name carried by `RepositoryError::Conflict`.
#[must_use]
pub fn classify_insert_conflict(constraint: &str) -> InsertConflict {
    if constraint == USERNAME_CONSTRAINT {
        InsertConflict::Username
    } else {
        InsertConflict::Identity
    }
}

/// Insert an account for `assertion`.
///
/// Returns `Ok(None)` if a concurrent sign-in claimed the email or provider
/// id first.
async fn create_federated_user(
    users: &mut UserRepository<'_>,
    assertion: &FederatedAssertion,
) -> Result<Option<User>, AuthError> {
    let base = synthesize_username(assertion.display_name.as_deref(), &assertion.email);
    let mut taken: HashSet<String> = users
        .usernames_with_prefix(candidate_prefix(&base))
        .await?
        .into_iter()
        .collect();

    let mut new_user = NewUser {
        username: pick_username(&base, &taken)?,
        email: assertion.email.clone(),
        password_hash: hash_password(&placeholder_password())?,
        federated_id: Some(assertion.provider_id.clone()),
        display_name: assertion.display_name.clone(),
    };

    loop {
        match users.create_guarded(&new_user).await {
            Ok(user) => return Ok(Some(user)),
            Err(RepositoryError::Conflict(constraint)) => {
                match classify_insert_conflict(&constraint) {
                    InsertConflict::Username => {
                        tracing::debug!(
                            username = %new_user.username,
                            "Username taken concurrently, trying next candidate"
                        );
                        taken.insert(new_user.username.as_str().to_owned());
                        new_user.username = pick_username(&base, &taken)?;
                    }
                    InsertConflict::Identity => return Ok(None),
                }
            }
            Err(other) => return Err(AuthError::Repository(other)),
        }
    }
}
