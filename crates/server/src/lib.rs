//! Kartica API server library.
//!
//! Accounts with password and Google sign-in, per-user learning progress
//! and quiz results, served over a JSON HTTP API. The binary in `main.rs`
//! wires this up; integration tests and the CLI reuse it directly.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;
