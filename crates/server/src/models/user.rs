//! User domain types.
//!
//! These types represent validated domain objects separate from database row types.

use chrono::{DateTime, Utc};
use serde::Serialize;

use kartica_core::{Email, UserId, Username};

/// A Kartica account (domain type).
///
/// An account may hold a local password, a federated identity, or both.
/// `Debug` is implemented manually so the password hash never reaches logs.
#[derive(Clone)]
pub struct User {
    /// Unique user ID.
    pub id: UserId,
    /// Unique username.
    pub username: Username,
    /// Unique, lower-cased email address.
    pub email: Email,
    /// Argon2 PHC string, absent for accounts that never set a password.
    pub password_hash: Option<String>,
    /// Subject id from the federated identity provider.
    pub federated_id: Option<String>,
    /// Display name reported by the identity provider.
    pub display_name: Option<String>,
    /// When the user was created.
    pub created_at: DateTime<Utc>,
    /// When the user was last updated.
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Public view of this user, without credential material.
    #[must_use]
    pub fn to_public(&self) -> PublicUser {
        PublicUser {
            id: self.id,
            username: self.username.clone(),
            email: self.email.clone(),
            display_name: self.display_name.clone(),
            has_federated_identity: self.federated_id.is_some(),
            created_at: self.created_at,
        }
    }
}

impl std::fmt::Debug for User {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("User")
            .field("id", &self.id)
            .field("username", &self.username)
            .field("email", &self.email)
            .field(
                "password_hash",
                &self.password_hash.as_ref().map(|_| "[REDACTED]"),
            )
            .field("federated_id", &self.federated_id)
            .field("display_name", &self.display_name)
            .field("created_at", &self.created_at)
            .field("updated_at", &self.updated_at)
            .finish()
    }
}

/// Fields for inserting a new user row.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: Username,
    pub email: Email,
    pub password_hash: String,
    pub federated_id: Option<String>,
    pub display_name: Option<String>,
}

/// User as returned over the API.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PublicUser {
    pub id: UserId,
    pub username: Username,
    pub email: Email,
    pub display_name: Option<String>,
    pub has_federated_identity: bool,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn sample_user() -> User {
        User {
            id: UserId::new(7),
            username: Username::parse("ana").unwrap(),
            email: Email::parse("ana@x.com").unwrap(),
            password_hash: Some("$argon2id$v=19$m=19456,t=2,p=1$c2FsdA$aGFzaA".to_owned()),
            federated_id: Some("g-1".to_owned()),
            display_name: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_debug_redacts_password_hash() {
        let output = format!("{:?}", sample_user());
        assert!(output.contains("[REDACTED]"));
        assert!(!output.contains("argon2id"));
    }

    #[test]
    fn test_public_user_omits_credentials() {
        let json = serde_json::to_value(sample_user().to_public()).unwrap();
        assert_eq!(json["id"], 7);
        assert_eq!(json["username"], "ana");
        assert_eq!(json["hasFederatedIdentity"], true);
        assert!(json.get("passwordHash").is_none());
        assert!(json.get("federatedId").is_none());
    }
}
