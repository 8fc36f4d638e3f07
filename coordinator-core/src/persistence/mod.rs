//! Persistence abstraction: a collection/key store with identical semantics
//! across the file and embedded-SQL backends.
//!
//! Every operation may fail with [`crate::error::Error::StorageFailure`].
//! Callers that can tolerate staleness wrap calls in
//! [`crate::resilience::with_fallback`] so a storage outage degrades rather
//! than crashes the coordinator.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::error::Result;

/// Names of the collections the coordinator writes to. Backends are
/// collection-agnostic; this list documents the contract other modules rely
/// on.
pub mod collections {
    pub const EVENTS: &str = "events";
    pub const DECISIONS: &str = "decisions";
    pub const IMPLEMENTATIONS: &str = "implementations";
    pub const TASK_OUTCOMES: &str = "task_outcomes";
    pub const AGENT_PROFILES: &str = "agent_profiles";
    pub const PROJECT_TASKS: &str = "project_tasks";
    pub const ANALYSIS_RESULTS: &str = "analysis_results";
    pub const CONVERSATION_INDEX: &str = "conversation_index";
}

/// A stored record: the caller's JSON value plus the `_stored_at` timestamp
/// the backend attaches on write.
#[derive(Debug, Clone)]
pub struct StoredRecord {
    pub key: String,
    pub value: Value,
    pub stored_at: DateTime<Utc>,
}

/// Predicate applied to query results after backend-level ordering.
pub type QueryFilter = dyn Fn(&Value) -> bool + Send + Sync;

/// Unified storage backend trait implemented by the file and embedded-SQL
/// crates. All operations are async so both a purely local (file) and a
/// driver-backed (SQL) implementation share one interface.
#[async_trait]
pub trait PersistenceBackend: Send + Sync {
    async fn store(&self, collection: &str, key: &str, value: Value) -> Result<()>;

    async fn retrieve(&self, collection: &str, key: &str) -> Result<Option<Value>>;

    /// Returns entries newest-first; `filter` is applied after ordering,
    /// `limit` caps the final list.
    async fn query(
        &self,
        collection: &str,
        filter: Option<&QueryFilter>,
        limit: usize,
    ) -> Result<Vec<StoredRecord>>;

    async fn delete(&self, collection: &str, key: &str) -> Result<bool>;

    /// Deletes entries older than `days`, returning the count removed.
    async fn clear_older_than(&self, collection: &str, days: i64) -> Result<usize>;

    /// SQL-median duration over `task_outcomes` where `success = true` and
    /// `actual_hours > 0`. Backends without a native median computation may
    /// return `Ok(None)`; callers fall back to an in-memory computation.
    async fn calculate_median_task_duration(&self) -> Result<Option<f64>> {
        Ok(None)
    }
}
