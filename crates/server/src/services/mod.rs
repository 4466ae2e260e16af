//! Business logic services.
//!
//! # Services
//!
//! - `auth` - Credential store (local registration and password login)
//! - `identity` - Federated sign-in and account reconciliation
//! - `session` - Bearer token issue and validation
//! - `progress` - Learned/difficult marks and category completion
//! - `quiz` - Append-only quiz result log

pub mod auth;
pub mod identity;
pub mod progress;
pub mod quiz;
pub mod session;
