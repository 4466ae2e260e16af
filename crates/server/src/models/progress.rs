//! Progress ledger types.

use chrono::{DateTime, Utc};
use serde::Serialize;

use kartica_core::CategoryId;

/// A completed category for one user.
///
/// `completed_at` is set by the first completion and never changes after.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CategoryCompletion {
    pub category_id: CategoryId,
    pub category_title: Option<String>,
    pub level: Option<String>,
    pub completed_at: DateTime<Utc>,
}
