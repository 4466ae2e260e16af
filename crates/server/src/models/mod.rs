//! Domain models for the Kartica server.
//!
//! Repositories return these types; routes serialize the public views
//! (`PublicUser`, `CategoryCompletion`, `QuizResultEntry`) as camelCase JSON.

pub mod progress;
pub mod quiz;
pub mod user;

pub use progress::CategoryCompletion;
pub use quiz::{NewQuizResult, QuizResult, QuizResultEntry};
pub use user::{NewUser, PublicUser, User};
