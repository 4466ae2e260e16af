//! String keys for entities owned by the external card catalog.
//!
//! Cards, categories and quizzes are identified by opaque strings chosen by
//! the catalog (e.g. `a1-greetings-003`). The backend never interprets them,
//! it only bounds their length so they fit the storage columns.

use thiserror::Error;

/// Errors that can occur when parsing a catalog key.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KeyError {
    /// The key is shorter than allowed after trimming.
    #[error("{kind} must be at least {min} characters")]
    TooShort {
        /// Which key type was being parsed.
        kind: &'static str,
        /// Minimum allowed length.
        min: usize,
    },
    /// The key is longer than allowed.
    #[error("{kind} must be at most {max} characters")]
    TooLong {
        /// Which key type was being parsed.
        kind: &'static str,
        /// Maximum allowed length.
        max: usize,
    },
}

/// Macro to define a length-bounded string key.
///
/// Input is trimmed before validation. Keys decoded from the database are
/// trusted and not re-validated.
#[macro_export]
macro_rules! define_key {
    ($name:ident, $kind:literal, $min:expr, $max:expr) => {
        #[derive(
            Debug,
            Clone,
            PartialEq,
            Eq,
            PartialOrd,
            Ord,
            Hash,
            ::serde::Serialize,
            ::serde::Deserialize
        )]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Minimum key length in characters.
            pub const MIN_LENGTH: usize = $min;
            /// Maximum key length in characters.
            pub const MAX_LENGTH: usize = $max;

            /// Parse and validate a key.
            ///
            /// # Errors
            ///
            /// Returns [`KeyError`] if the trimmed input is outside the
            /// allowed length range.
            pub fn parse(s: &str) -> Result<Self, $crate::types::key::KeyError> {
                let trimmed = s.trim();
                let len = trimmed.chars().count();
                if len < Self::MIN_LENGTH {
                    return Err($crate::types::key::KeyError::TooShort {
                        kind: $kind,
                        min: Self::MIN_LENGTH,
                    });
                }
                if len > Self::MAX_LENGTH {
                    return Err($crate::types::key::KeyError::TooLong {
                        kind: $kind,
                        max: Self::MAX_LENGTH,
                    });
                }
                Ok(Self(trimmed.to_owned()))
            }

            /// Returns the key as a string slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consumes the key and returns its inner string.
            #[must_use]
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl ::core::fmt::Display for $name {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        #[cfg(feature = "postgres")]
        impl ::sqlx::Type<::sqlx::Postgres> for $name {
            fn type_info() -> ::sqlx::postgres::PgTypeInfo {
                <String as ::sqlx::Type<::sqlx::Postgres>>::type_info()
            }

            fn compatible(ty: &::sqlx::postgres::PgTypeInfo) -> bool {
                <String as ::sqlx::Type<::sqlx::Postgres>>::compatible(ty)
            }
        }

        #[cfg(feature = "postgres")]
        impl<'r> ::sqlx::Decode<'r, ::sqlx::Postgres> for $name {
            fn decode(
                value: ::sqlx::postgres::PgValueRef<'r>,
            ) -> ::core::result::Result<Self, ::sqlx::error::BoxDynError> {
                let s = <String as ::sqlx::Decode<::sqlx::Postgres>>::decode(value)?;
                Ok(Self(s))
            }
        }

        #[cfg(feature = "postgres")]
        impl ::sqlx::Encode<'_, ::sqlx::Postgres> for $name {
            fn encode_by_ref(
                &self,
                buf: &mut ::sqlx::postgres::PgArgumentBuffer,
            ) -> ::std::result::Result<::sqlx::encode::IsNull, ::sqlx::error::BoxDynError> {
                <String as ::sqlx::Encode<::sqlx::Postgres>>::encode_by_ref(&self.0, buf)
            }
        }
    };
}

define_key!(CardId, "card id", 1, 255);
define_key!(CategoryId, "category id", 5, 255);
define_key!(QuizKey, "quiz id", 1, 255);

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_card_id_trims_input() {
        let id = CardId::parse("  a1-greet-01 ").unwrap();
        assert_eq!(id.as_str(), "a1-greet-01");
    }

    #[test]
    fn test_card_id_rejects_blank() {
        assert_eq!(
            CardId::parse("  "),
            Err(KeyError::TooShort {
                kind: "card id",
                min: 1
            })
        );
        assert!(CardId::parse("c1").is_ok());
    }

    #[test]
    fn test_category_id_too_short() {
        assert!(matches!(
            CategoryId::parse("a1"),
            Err(KeyError::TooShort { min: 5, .. })
        ));
    }

    #[test]
    fn test_category_id_too_long() {
        let long = "x".repeat(256);
        assert!(matches!(
            CategoryId::parse(&long),
            Err(KeyError::TooLong { max: 255, .. })
        ));
    }

    #[test]
    fn test_quiz_key_allows_single_character() {
        assert!(QuizKey::parse("q").is_ok());
        assert!(QuizKey::parse("   ").is_err());
    }

    #[test]
    fn test_error_message_names_the_key() {
        let err = CategoryId::parse("").unwrap_err();
        assert_eq!(err.to_string(), "category id must be at least 5 characters");
    }
}
