//! Core types for Kartica.
//!
//! This module provides type-safe wrappers for the learning domain.

pub mod email;
pub mod id;
pub mod key;
pub mod username;

pub use email::{Email, EmailError};
pub use id::*;
pub use key::*;
pub use username::{Username, UsernameError};
