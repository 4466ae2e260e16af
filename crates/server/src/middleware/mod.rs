//! HTTP middleware and extractors.
//!
//! # Middleware Order (outermost first)
//!
//! 1. Sentry layers (capture errors, transactions)
//! 2. `TraceLayer` (request span with method, uri, status, latency)
//! 3. CORS
//! 4. Request ID (record `x-request-id` into the span and Sentry scope)
//!
//! Authentication is an extractor ([`RequireAuth`]), not a layer, so public
//! routes need no opt-out.

pub mod auth;
pub mod request_id;

pub use auth::RequireAuth;
pub use request_id::request_id_middleware;
