//! Newtype IDs for database-assigned entity references.
//!
//! Use the `define_id!` macro to create type-safe ID wrappers so a user id can
//! never be passed where a quiz result id is expected.

/// Macro to define a type-safe numeric ID wrapper.
///
/// Creates a newtype wrapper around the given integer type with:
/// - `Serialize`/`Deserialize` with `#[serde(transparent)]`
/// - `Debug`, `Clone`, `Copy`, `PartialEq`, `Eq`, `Hash`, `Ord`
/// - `new()` / `get()` accessors, `Display`, and `From` conversions
/// - `sqlx` `Type`, `Encode`, and `Decode` implementations (with `postgres` feature)
///
/// # Example
///
/// ```rust
/// # use kartica_core::define_id;
/// define_id!(DeckId: i32);
/// define_id!(ReviewId: i64);
///
/// let deck = DeckId::new(1);
/// assert_eq!(deck.get(), 1);
///
/// // These are different types, so this won't compile:
/// // let _: DeckId = ReviewId::new(1);
/// ```
#[macro_export]
macro_rules! define_id {
    ($name:ident : $inner:ty) => {
        #[derive(
            Debug,
            Clone,
            Copy,
            PartialEq,
            Eq,
            PartialOrd,
            Ord,
            Hash,
            ::serde::Serialize,
            ::serde::Deserialize
        )]
        #[serde(transparent)]
        pub struct $name($inner);

        impl $name {
            /// Wrap a raw database id.
            #[must_use]
            pub const fn new(id: $inner) -> Self {
                Self(id)
            }

            /// Get the raw database id.
            #[must_use]
            pub const fn get(&self) -> $inner {
                self.0
            }
        }

        impl ::core::fmt::Display for $name {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<$inner> for $name {
            fn from(id: $inner) -> Self {
                Self(id)
            }
        }

        impl From<$name> for $inner {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        #[cfg(feature = "postgres")]
        impl ::sqlx::Type<::sqlx::Postgres> for $name {
            fn type_info() -> ::sqlx::postgres::PgTypeInfo {
                <$inner as ::sqlx::Type<::sqlx::Postgres>>::type_info()
            }

            fn compatible(ty: &::sqlx::postgres::PgTypeInfo) -> bool {
                <$inner as ::sqlx::Type<::sqlx::Postgres>>::compatible(ty)
            }
        }

        #[cfg(feature = "postgres")]
        impl<'r> ::sqlx::Decode<'r, ::sqlx::Postgres> for $name {
            fn decode(
                value: ::sqlx::postgres::PgValueRef<'r>,
            ) -> ::core::result::Result<Self, ::sqlx::error::BoxDynError> {
                let id = <$inner as ::sqlx::Decode<::sqlx::Postgres>>::decode(value)?;
                Ok(Self(id))
            }
        }

        #[cfg(feature = "postgres")]
        impl ::sqlx::Encode<'_, ::sqlx::Postgres> for $name {
            fn encode_by_ref(
                &self,
                buf: &mut ::sqlx::postgres::PgArgumentBuffer,
            ) -> ::std::result::Result<::sqlx::encode::IsNull, ::sqlx::error::BoxDynError> {
                <$inner as ::sqlx::Encode<::sqlx::Postgres>>::encode_by_ref(&self.0, buf)
            }
        }
    };
}

define_id!(UserId: i32);
define_id!(QuizResultId: i64);

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_transparent_in_json() {
        let json = serde_json::to_string(&UserId::new(42)).unwrap();
        assert_eq!(json, "42");

        let parsed: QuizResultId = serde_json::from_str("7").unwrap();
        assert_eq!(parsed.get(), 7);
    }

    #[test]
    fn test_display_matches_inner() {
        assert_eq!(UserId::new(12).to_string(), "12");
    }
}
