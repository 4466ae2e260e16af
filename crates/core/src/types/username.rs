//! Username type.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Errors that can occur when parsing a [`Username`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum UsernameError {
    /// Shorter than [`Username::MIN_LENGTH`].
    #[error("username must be at least {min} characters")]
    TooShort {
        /// Minimum allowed length.
        min: usize,
    },
    /// Longer than [`Username::MAX_LENGTH`].
    #[error("username must be at most {max} characters")]
    TooLong {
        /// Maximum allowed length.
        max: usize,
    },
    /// Contains something other than ASCII letters, digits or underscore.
    #[error("username may only contain letters, digits and underscores")]
    InvalidCharacter,
}

/// A lower-cased account username.
///
/// Usernames are either chosen at registration or synthesized from a
/// federated display name, and are unique across all accounts.
///
/// ```
/// use kartica_core::Username;
///
/// assert_eq!(Username::parse("Ana_91").unwrap().as_str(), "ana_91");
/// assert!(Username::parse("al").is_err());
/// assert!(Username::parse("ana-maria").is_err());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct Username(String);

impl Username {
    /// Minimum username length.
    pub const MIN_LENGTH: usize = 3;
    /// Maximum username length.
    pub const MAX_LENGTH: usize = 15;

    /// Parse a username, trimming whitespace and lower-casing it.
    ///
    /// # Errors
    ///
    /// Returns a [`UsernameError`] if the length or alphabet is invalid.
    pub fn parse(s: &str) -> Result<Self, UsernameError> {
        let candidate = s.trim().to_ascii_lowercase();

        if !candidate
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
        {
            return Err(UsernameError::InvalidCharacter);
        }

        // All characters are ASCII here, so byte length equals char count.
        if candidate.len() < Self::MIN_LENGTH {
            return Err(UsernameError::TooShort {
                min: Self::MIN_LENGTH,
            });
        }
        if candidate.len() > Self::MAX_LENGTH {
            return Err(UsernameError::TooLong {
                max: Self::MAX_LENGTH,
            });
        }

        Ok(Self(candidate))
    }

    /// Returns the username as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the `Username` and returns its inner string.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for Username {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Username {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Type<sqlx::Postgres> for Username {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <String as sqlx::Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
        <String as sqlx::Type<sqlx::Postgres>>::compatible(ty)
    }
}

#[cfg(feature = "postgres")]
impl<'r> sqlx::Decode<'r, sqlx::Postgres> for Username {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <String as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
        Ok(Self(s))
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Encode<'_, sqlx::Postgres> for Username {
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
    fn test_parse_lowercases() {
        assert_eq!(Username::parse(" Marko ").unwrap().as_str(), "marko");
    }

    #[test]
    fn test_length_bounds() {
        assert!(Username::parse("abc").is_ok());
        assert!(Username::parse("a".repeat(15).as_str()).is_ok());
        assert_eq!(
            Username::parse("ab"),
            Err(UsernameError::TooShort { min: 3 })
        );
        assert_eq!(
            Username::parse(&"a".repeat(16)),
            Err(UsernameError::TooLong { max: 15 })
        );
    }

    #[test]
    fn test_rejects_non_ascii_and_punctuation() {
        assert_eq!(
            Username::parse("ćamil"),
            Err(UsernameError::InvalidCharacter)
        );
        assert_eq!(
            Username::parse("ana.b"),
            Err(UsernameError::InvalidCharacter)
        );
    }
}
