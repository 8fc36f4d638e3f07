#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

//! File-backed [`PersistenceBackend`] implementation: one JSON file per
//! collection, `{ key: { ...value, _stored_at } }`, written atomically via a
//! temp-sibling-then-rename so a crash mid-write never corrupts the file.
//!
//! A per-collection lock serializes writers within the process; reads take
//! the same lock only to avoid racing an in-flight write, matching
//! [`coordinator_core::persistence`]'s documented ordering guarantee.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use tracing::{debug, warn};

use coordinator_core::error::{Error, Result};
use coordinator_core::persistence::{PersistenceBackend, QueryFilter, StoredRecord};

const STORED_AT_FIELD: &str = "_stored_at";

/// A file-per-collection JSON store rooted at `base_dir`.
pub struct FileBackend {
    base_dir: PathBuf,
    locks: RwLock<HashMap<String, Arc<Mutex<()>>>>,
}

impl FileBackend {
    /// Creates the backend, creating `base_dir` if it does not exist.
    pub fn new(base_dir: impl Into<PathBuf>) -> Result<Self> {
        let base_dir = base_dir.into();
        std::fs::create_dir_all(&base_dir)?;
        Ok(Self {
            base_dir,
            locks: RwLock::new(HashMap::new()),
        })
    }

    fn collection_path(&self, collection: &str) -> PathBuf {
        self.base_dir.join(format!("{collection}.json"))
    }

    fn lock_for(&self, collection: &str) -> Arc<Mutex<()>> {
        if let Some(lock) = self.locks.read().get(collection) {
            return lock.clone();
        }
        self.locks
            .write()
            .entry(collection.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    fn read_collection(path: &Path) -> Result<HashMap<String, Value>> {
        if !path.exists() {
            return Ok(HashMap::new());
        }
        let data = std::fs::read_to_string(path)?;
        if data.trim().is_empty() {
            return Ok(HashMap::new());
        }
        serde_json::from_str(&data).map_err(|e| Error::StorageFailure(format!("corrupt collection file {path:?}: {e}")))
    }

    fn write_collection(path: &Path, contents: &HashMap<String, Value>) -> Result<()> {
        let serialized = serde_json::to_vec_pretty(contents)?;
        let tmp_path = path.with_extension("json.tmp");
        std::fs::write(&tmp_path, &serialized)?;
        std::fs::rename(&tmp_path, path)?;
        Ok(())
    }

    fn stored_at(entry: &Value) -> DateTime<Utc> {
        entry
            .get(STORED_AT_FIELD)
            .and_then(Value::as_str)
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(Utc::now)
    }

    fn strip_stored_at(mut entry: Value) -> Value {
        if let Some(obj) = entry.as_object_mut() {
            obj.remove(STORED_AT_FIELD);
        }
        entry
    }
}

#[async_trait]
impl PersistenceBackend for FileBackend {
    async fn store(&self, collection: &str, key: &str, value: Value) -> Result<()> {
        let path = self.collection_path(collection);
        let lock = self.lock_for(collection);
        let _guard = lock.lock();

        let mut contents = Self::read_collection(&path)?;
        let mut stamped = value;
        match stamped.as_object_mut() {
            Some(obj) => {
                obj.insert(STORED_AT_FIELD.to_string(), Value::from(Utc::now().to_rfc3339()));
            }
            None => {
                return Err(Error::ValidationFailure(format!(
                    "collection {collection} requires object-shaped values, got {stamped}"
                )));
            }
        }
        contents.insert(key.to_string(), stamped);
        Self::write_collection(&path, &contents)?;
        debug!(collection, key, "stored record");
        Ok(())
    }

    async fn retrieve(&self, collection: &str, key: &str) -> Result<Option<Value>> {
        let path = self.collection_path(collection);
        let lock = self.lock_for(collection);
        let _guard = lock.lock();

        let contents = Self::read_collection(&path)?;
        Ok(contents.get(key).cloned().map(Self::strip_stored_at))
    }

    async fn query(&self, collection: &str, filter: Option<&QueryFilter>, limit: usize) -> Result<Vec<StoredRecord>> {
        let path = self.collection_path(collection);
        let lock = self.lock_for(collection);
        let _guard = lock.lock();

        let contents = Self::read_collection(&path)?;
        let mut records: Vec<StoredRecord> = contents
            .into_iter()
            .map(|(key, entry)| StoredRecord {
                key,
                stored_at: Self::stored_at(&entry),
                value: Self::strip_stored_at(entry),
            })
            .collect();
        records.sort_by(|a, b| b.stored_at.cmp(&a.stored_at));

        if let Some(predicate) = filter {
            records.retain(|record| predicate(&record.value));
        }
        records.truncate(limit);
        Ok(records)
    }

    async fn delete(&self, collection: &str, key: &str) -> Result<bool> {
        let path = self.collection_path(collection);
        let lock = self.lock_for(collection);
        let _guard = lock.lock();

        let mut contents = Self::read_collection(&path)?;
        let removed = contents.remove(key).is_some();
        if removed {
            Self::write_collection(&path, &contents)?;
        }
        Ok(removed)
    }

    async fn clear_older_than(&self, collection: &str, days: i64) -> Result<usize> {
        let path = self.collection_path(collection);
        let lock = self.lock_for(collection);
        let _guard = lock.lock();

        let cutoff = Utc::now() - chrono::Duration::days(days);
        let mut contents = Self::read_collection(&path)?;
        let before = contents.len();
        contents.retain(|_, entry| Self::stored_at(entry) >= cutoff);
        let removed = before - contents.len();
        if removed > 0 {
            Self::write_collection(&path, &contents)?;
            warn!(collection, removed, "pruned aged records");
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn store_then_retrieve_round_trips_the_value() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FileBackend::new(dir.path()).unwrap();

        backend.store("events", "e1", json!({"kind": "task_started"})).await.unwrap();
        let retrieved = backend.retrieve("events", "e1").await.unwrap().unwrap();
        assert_eq!(retrieved["kind"], "task_started");
        assert!(retrieved.get("_stored_at").is_none());
    }

    #[tokio::test]
    async fn query_orders_newest_first_and_respects_limit() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FileBackend::new(dir.path()).unwrap();

        backend.store("events", "a", json!({"n": 1})).await.unwrap();
        backend.store("events", "b", json!({"n": 2})).await.unwrap();

        let records = backend.query("events", None, 1).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].key, "b");
    }

    #[tokio::test]
    async fn delete_removes_the_key() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FileBackend::new(dir.path()).unwrap();

        backend.store("decisions", "d1", json!({"text": "use rust"})).await.unwrap();
        assert!(backend.delete("decisions", "d1").await.unwrap());
        assert!(backend.retrieve("decisions", "d1").await.unwrap().is_none());
        assert!(!backend.delete("decisions", "d1").await.unwrap());
    }

    #[tokio::test]
    async fn non_object_values_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FileBackend::new(dir.path()).unwrap();
        let err = backend.store("events", "e1", json!("not an object")).await;
        assert!(err.is_err());
    }
}
