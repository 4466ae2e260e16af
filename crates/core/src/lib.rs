//! Kartica Core - Shared types library.
//!
//! This crate provides the domain types used across all Kartica components:
//! - `server` - HTTP API for accounts, learning progress and quiz results
//! - `cli` - Command-line tools for migrations and user management
//!
//! # Architecture
//!
//! The core crate contains only types and validation - no I/O, no database
//! access, no HTTP clients. Database encoding is opt-in via the `postgres`
//! feature.
//!
//! # Modules
//!
//! - [`types`] - Typed ids, card/category keys, emails and usernames

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
