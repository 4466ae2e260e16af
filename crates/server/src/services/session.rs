//! Session issuer: stateless HS256 bearer tokens.
//!
//! Tokens are never stored server-side, so logout is a client-side discard.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, errors::ErrorKind};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use kartica_core::UserId;

use crate::config::JwtConfig;
use crate::models::user::User;

/// Errors produced when minting or validating a bearer token.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The token's `exp` lies in the past.
    #[error("session expired")]
    Expired,

    /// Bad signature, malformed token or unexpected claims.
    #[error("invalid token")]
    Invalid,

    /// Token could not be signed.
    #[error("failed to sign token: {0}")]
    Signing(String),
}

/// Claims embedded in every token.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Claims {
    /// User id, as a string per RFC 7519.
    pub sub: String,
    pub username: String,
    pub email: String,
    pub iat: i64,
    pub exp: i64,
}

/// Mints and validates bearer tokens.
#[derive(Clone)]
pub struct SessionIssuer {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    ttl: Duration,
}

impl std::fmt::Debug for SessionIssuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionIssuer")
            .field("keys", &"[REDACTED]")
            .field("ttl", &self.ttl)
            .finish()
    }
}

impl SessionIssuer {
    /// Build an issuer from configuration.
    #[must_use]
    pub fn new(config: &JwtConfig) -> Self {
        let secret = config.secret.expose_secret().as_bytes();

        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            validation,
            ttl: Duration::try_seconds(config.expires_in_secs).unwrap_or(Duration::MAX),
        }
    }

    /// Issue a token for `user`, valid for the configured lifetime.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Signing` if encoding fails or the expiry is
    /// not representable.
    pub fn issue(&self, user: &User) -> Result<String, SessionError> {
        self.issue_at(user, Utc::now())
    }

    fn issue_at(&self, user: &User, now: DateTime<Utc>) -> Result<String, SessionError> {
        let claims = Claims {
            sub: user.id.to_string(),
            username: user.username.to_string(),
            email: user.email.to_string(),
            iat: now.timestamp(),
            exp: now
                .checked_add_signed(self.ttl)
                .ok_or_else(|| SessionError::Signing("token expiry out of range".to_owned()))?
                .timestamp(),
        };

        jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| SessionError::Signing(e.to_string()))
    }

    /// Validate a token and return the user id it was issued for.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Expired` for expired tokens and
    /// `SessionError::Invalid` for everything else that fails validation.
    pub fn validate(&self, token: &str) -> Result<UserId, SessionError> {
        let data = jsonwebtoken::decode::<Claims>(token, &self.decoding, &self.validation)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => SessionError::Expired,
                _ => SessionError::Invalid,
            })?;

        data.claims
            .sub
            .parse::<i32>()
            .map(UserId::new)
            .map_err(|_| SessionError::Invalid)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use secrecy::SecretString;

    use kartica_core::{Email, Username};

    use super::*;

    fn issuer(secret: &str) -> SessionIssuer {
        SessionIssuer::new(&JwtConfig {
            secret: SecretString::from(secret.to_owned()),
            expires_in_secs: 3600,
        })
    }

    fn user(id: i32) -> User {
        User {
            id: UserId::new(id),
            username: Username::parse("ana").unwrap(),
            email: Email::parse("ana@x.com").unwrap(),
            password_hash: None,
            federated_id: None,
            display_name: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    const SECRET: &str = "q7Vx2LmP9sKd4RtZ8wNb3YhC6jFg1UeA";

    #[test]
    fn test_issue_then_validate_returns_user_id() {
        let issuer = issuer(SECRET);
        let token = issuer.issue(&user(42)).unwrap();
        assert_eq!(issuer.validate(&token).unwrap(), UserId::new(42));
    }

    #[test]
    fn test_expired_token() {
        let issuer = issuer(SECRET);
        let two_hours_ago = Utc::now() - Duration::hours(2);
        let token = issuer.issue_at(&user(1), two_hours_ago).unwrap();
        assert!(matches!(issuer.validate(&token), Err(SessionError::Expired)));
    }

    #[test]
    fn test_token_signed_with_other_secret_is_invalid() {
        let token = issuer("Zr5Kp8Wq2Xn6Bv9Mc3Lt7Hj4Gf1Ds0Ay").issue(&user(1)).unwrap();
        assert!(matches!(
            issuer(SECRET).validate(&token),
            Err(SessionError::Invalid)
        ));
    }

    #[test]
    fn test_garbage_is_invalid() {
        assert!(matches!(
            issuer(SECRET).validate("not.a.jwt"),
            Err(SessionError::Invalid)
        ));
        assert!(matches!(issuer(SECRET).validate(""), Err(SessionError::Invalid)));
    }

    #[test]
    fn test_unrepresentable_expiry_is_an_error() {
        let issuer = SessionIssuer::new(&JwtConfig {
            secret: SecretString::from(SECRET.to_owned()),
            expires_in_secs: i64::MAX,
        });
        assert!(matches!(
            issuer.issue(&user(1)),
            Err(SessionError::Signing(_))
        ));
    }

    #[test]
    fn test_claims_carry_identity() {
        let issuer = issuer(SECRET);
        let now = Utc::now();
        let token = issuer.issue_at(&user(5), now).unwrap();
        let data =
            jsonwebtoken::decode::<Claims>(&token, &issuer.decoding, &issuer.validation).unwrap();
        assert_eq!(data.claims.sub, "5");
        assert_eq!(data.claims.username, "ana");
        assert_eq!(data.claims.email, "ana@x.com");
        assert_eq!(data.claims.exp - data.claims.iat, 3600);
    }
}
