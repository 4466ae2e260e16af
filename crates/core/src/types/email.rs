//! Email address type.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Errors that can occur when parsing an [`Email`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum EmailError {
    /// The input string is empty after trimming.
    #[error("email cannot be empty")]
    Empty,
    /// The input string is too long.
    #[error("email must be at most {max} characters")]
    TooLong {
        /// Maximum allowed length.
        max: usize,
    },
    /// The input does not have exactly one @ symbol.
    #[error("email must contain exactly one @ symbol")]
    MalformedAt,
    /// The local part (before @) is empty.
    #[error("email local part cannot be empty")]
    EmptyLocalPart,
    /// The domain part (after @) is empty or has no dot.
    #[error("email domain must contain a dot")]
    InvalidDomain,
    /// The input contains whitespace inside the address.
    #[error("email cannot contain whitespace")]
    Whitespace,
}

/// A normalized email address.
///
/// Emails are the join key between local accounts and federated identities,
/// so they are compared case-insensitively: parsing trims surrounding
/// whitespace and lower-cases the whole address.
///
/// ## Constraints
///
/// - Length: 1-254 characters (RFC 5321 limit)
/// - Exactly one @ symbol, non-empty local part
/// - Domain contains a dot that is neither first nor last
///
/// ## Examples
///
/// ```
/// use kartica_core::Email;
///
/// let email = Email::parse("  Ana@Example.COM ").unwrap();
/// assert_eq!(email.as_str(), "ana@example.com");
///
/// assert!(Email::parse("").is_err());
/// assert!(Email::parse("no-at-symbol").is_err());
/// assert!(Email::parse("user@localhost").is_err());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct Email(String);

impl Email {
    /// Maximum length of an email address (RFC 5321).
    pub const MAX_LENGTH: usize = 254;

    /// Parse and normalize an `Email`.
    ///
    /// # Errors
    ///
    /// Returns an [`EmailError`] describing the first constraint violated.
    pub fn parse(s: &str) -> Result<Self, EmailError> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(EmailError::Empty);
        }

        if trimmed.len() > Self::MAX_LENGTH {
            return Err(EmailError::TooLong {
                max: Self::MAX_LENGTH,
            });
        }

        if trimmed.chars().any(char::is_whitespace) {
            return Err(EmailError::Whitespace);
        }

        let (local, domain) = trimmed.split_once('@').ok_or(EmailError::MalformedAt)?;
        if domain.contains('@') {
            return Err(EmailError::MalformedAt);
        }

        if local.is_empty() {
            return Err(EmailError::EmptyLocalPart);
        }

        let dot_ok = domain
            .find('.')
            .is_some_and(|pos| pos > 0 && !domain.ends_with('.'));
        if !dot_ok {
            return Err(EmailError::InvalidDomain);
        }

        Ok(Self(trimmed.to_lowercase()))
    }

    /// Returns the email address as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the `Email` and returns its inner string.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }

    /// Returns the local part of the email (before the @).
    #[must_use]
    pub fn local_part(&self) -> &str {
        self.0.split('@').next().unwrap_or("")
    }
}

impl fmt::Display for Email {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for Email {
    type Err = EmailError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl AsRef<str> for Email {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Type<sqlx::Postgres> for Email {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <String as sqlx::Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
        <String as sqlx::Type<sqlx::Postgres>>::compatible(ty)
    }
}

#[cfg(feature = "postgres")]
impl<'r> sqlx::Decode<'r, sqlx::Postgres> for Email {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <String as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
        Ok(Self(s))
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Encode<'_, sqlx::Postgres> for Email {
    fn encode_by_ref(
        &self,
        buf: &mut sqlx::postgres::PgArgumentBuffer,
    ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
        <String as sqlx::Encode<sqlx::Postgres>>::encode_by_ref(&self.0, buf)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_normalizes_case_and_whitespace() {
        let email = Email::parse("  Ana@X.com\n").unwrap();
        assert_eq!(email.as_str(), "ana@x.com");
    }

    #[test]
    fn test_parse_valid_emails() {
        assert!(Email::parse("user.name+tag@example.co.uk").is_ok());
        assert!(Email::parse("a@b.c").is_ok());
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert_eq!(Email::parse("   "), Err(EmailError::Empty));
        assert_eq!(Email::parse("nobody"), Err(EmailError::MalformedAt));
        assert_eq!(Email::parse("a@b@c.com"), Err(EmailError::MalformedAt));
        assert_eq!(Email::parse("@x.com"), Err(EmailError::EmptyLocalPart));
        assert_eq!(Email::parse("ana@x"), Err(EmailError::InvalidDomain));
        assert_eq!(Email::parse("ana@.com"), Err(EmailError::InvalidDomain));
        assert_eq!(Email::parse("ana@x."), Err(EmailError::InvalidDomain));
        assert_eq!(Email::parse("a na@x.com"), Err(EmailError::Whitespace));
    }

    #[test]
    fn test_parse_too_long() {
        let long = format!("{}@example.com", "a".repeat(250));
        assert!(matches!(
            Email::parse(&long),
            Err(EmailError::TooLong { .. })
        ));
    }

    #[test]
    fn test_local_part() {
        let email = Email::parse("marko.petrovic@example.com").unwrap();
        assert_eq!(email.local_part(), "marko.petrovic");
    }
}
