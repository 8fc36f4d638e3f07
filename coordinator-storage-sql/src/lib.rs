#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

//! Embedded-SQL [`PersistenceBackend`] implementation: a single
//! `(collection, key, data, stored_at)` table with a `stored_at` index.
//!
//! `rusqlite::Connection` is neither `Send` nor `Sync`, so all SQL runs on a
//! dedicated worker thread; the async trait methods only send a command over
//! a channel and await the worker's reply.

use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::Connection;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tracing::warn;

use coordinator_core::error::{Error, Result};
use coordinator_core::persistence::{PersistenceBackend, QueryFilter, StoredRecord};

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS records (
        collection TEXT NOT NULL,
        key TEXT NOT NULL,
        data TEXT NOT NULL,
        stored_at TEXT NOT NULL,
        PRIMARY KEY (collection, key)
    );
    CREATE INDEX IF NOT EXISTS records_stored_at ON records(stored_at);
";

enum Command {
    Store {
        collection: String,
        key: String,
        data: String,
        stored_at: String,
        resp: oneshot::Sender<rusqlite::Result<()>>,
    },
    Retrieve {
        collection: String,
        key: String,
        resp: oneshot::Sender<rusqlite::Result<Option<String>>>,
    },
    Query {
        collection: String,
        resp: oneshot::Sender<rusqlite::Result<Vec<(String, String, String)>>>,
    },
    Delete {
        collection: String,
        key: String,
        resp: oneshot::Sender<rusqlite::Result<bool>>,
    },
    ClearOlderThan {
        collection: String,
        cutoff: String,
        resp: oneshot::Sender<rusqlite::Result<usize>>,
    },
    Median {
        resp: oneshot::Sender<rusqlite::Result<Vec<f64>>>,
    },
}

fn run_worker(conn: Connection, mut rx: mpsc::Receiver<Command>) {
    while let Some(command) = rx.blocking_recv() {
        match command {
            Command::Store { collection, key, data, stored_at, resp } => {
                let result = conn.execute(
                    "INSERT INTO records (collection, key, data, stored_at) VALUES (?1, ?2, ?3, ?4)
                     ON CONFLICT(collection, key) DO UPDATE SET data = excluded.data, stored_at = excluded.stored_at",
                    rusqlite::params![collection, key, data, stored_at],
                ).map(|_| ());
                let _ = resp.send(result);
            }
            Command::Retrieve { collection, key, resp } => {
                let result = conn.query_row(
                    "SELECT data FROM records WHERE collection = ?1 AND key = ?2",
                    rusqlite::params![collection, key],
                    |row| row.get::<_, String>(0),
                );
                let mapped = match result {
                    Ok(data) => Ok(Some(data)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e),
                };
                let _ = resp.send(mapped);
            }
            Command::Query { collection, resp } => {
                let result = (|| -> rusqlite::Result<Vec<(String, String, String)>> {
                    let mut stmt = conn.prepare(
                        "SELECT key, data, stored_at FROM records WHERE collection = ?1 ORDER BY stored_at DESC",
                    )?;
                    let rows = stmt
                        .query_map(rusqlite::params![collection], |row| {
                            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?, row.get::<_, String>(2)?))
                        })?
                        .collect::<rusqlite::Result<Vec<_>>>()?;
                    Ok(rows)
                })();
                let _ = resp.send(result);
            }
            Command::Delete { collection, key, resp } => {
                let result = conn
                    .execute("DELETE FROM records WHERE collection = ?1 AND key = ?2", rusqlite::params![collection, key])
                    .map(|count| count > 0);
                let _ = resp.send(result);
            }
            Command::ClearOlderThan { collection, cutoff, resp } => {
                let result = conn.execute(
                    "DELETE FROM records WHERE collection = ?1 AND stored_at < ?2",
                    rusqlite::params![collection, cutoff],
                );
                let _ = resp.send(result);
            }
            Command::Median { resp } => {
                let result = (|| -> rusqlite::Result<Vec<f64>> {
                    let mut stmt = conn.prepare("SELECT data FROM records WHERE collection = 'task_outcomes'")?;
                    let rows = stmt.query_map([], |row| row.get::<_, String>(0))?.collect::<rusqlite::Result<Vec<_>>>()?;
                    Ok(rows
                        .into_iter()
                        .filter_map(|raw| serde_json::from_str::<Value>(&raw).ok())
                        .filter(|v| v.get("success").and_then(Value::as_bool).unwrap_or(false))
                        .filter_map(|v| v.get("actual_hours").and_then(Value::as_f64))
                        .filter(|hours| *hours > 0.0)
                        .collect())
                })();
                let _ = resp.send(result);
            }
        }
    }
}

/// A SQLite-backed store rooted at a single database file.
pub struct SqlBackend {
    tx: mpsc::Sender<Command>,
}

impl SqlBackend {
    /// Opens (or creates) the database at `path` and spawns its worker
    /// thread.
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path.as_ref())?;
        conn.execute_batch(SCHEMA)?;
        let (tx, rx) = mpsc::channel(64);
        std::thread::spawn(move || run_worker(conn, rx));
        Ok(Self { tx })
    }

    /// Opens an in-memory database, primarily for tests.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        let (tx, rx) = mpsc::channel(64);
        std::thread::spawn(move || run_worker(conn, rx));
        Ok(Self { tx })
    }

    async fn send<T>(&self, build: impl FnOnce(oneshot::Sender<rusqlite::Result<T>>) -> Command) -> Result<T> {
        let (resp_tx, resp_rx) = oneshot::channel();
        self.tx
            .send(build(resp_tx))
            .await
            .map_err(|_| Error::StorageFailure("sql worker thread is gone".to_string()))?;
        resp_rx
            .await
            .map_err(|_| Error::StorageFailure("sql worker dropped the response channel".to_string()))?
            .map_err(Error::from)
    }
}

#[async_trait]
impl PersistenceBackend for SqlBackend {
    async fn store(&self, collection: &str, key: &str, value: Value) -> Result<()> {
        let data = serde_json::to_string(&value)?;
        let stored_at = Utc::now().to_rfc3339();
        self.send(|resp| Command::Store {
            collection: collection.to_string(),
            key: key.to_string(),
            data,
            stored_at,
            resp,
        })
        .await
    }

    async fn retrieve(&self, collection: &str, key: &str) -> Result<Option<Value>> {
        let raw = self
            .send(|resp| Command::Retrieve { collection: collection.to_string(), key: key.to_string(), resp })
            .await?;
        raw.map(|s| serde_json::from_str(&s).map_err(Error::from)).transpose()
    }

    async fn query(&self, collection: &str, filter: Option<&QueryFilter>, limit: usize) -> Result<Vec<StoredRecord>> {
        let rows = self.send(|resp| Command::Query { collection: collection.to_string(), resp }).await?;

        let mut records = Vec::with_capacity(rows.len());
        for (key, data, stored_at) in rows {
            let value: Value = match serde_json::from_str(&data) {
                Ok(v) => v,
                Err(e) => {
                    warn!(collection, key, error = %e, "skipping corrupt row");
                    continue;
                }
            };
            let stored_at: DateTime<Utc> = DateTime::parse_from_rfc3339(&stored_at).map(|dt| dt.with_timezone(&Utc)).unwrap_or_else(|_| Utc::now());
            records.push(StoredRecord { key, value, stored_at });
        }

        if let Some(predicate) = filter {
            records.retain(|record| predicate(&record.value));
        }
        records.truncate(limit);
        Ok(records)
    }

    async fn delete(&self, collection: &str, key: &str) -> Result<bool> {
        self.send(|resp| Command::Delete { collection: collection.to_string(), key: key.to_string(), resp }).await
    }

    async fn clear_older_than(&self, collection: &str, days: i64) -> Result<usize> {
        let cutoff = (Utc::now() - chrono::Duration::days(days)).to_rfc3339();
        self.send(|resp| Command::ClearOlderThan { collection: collection.to_string(), cutoff, resp }).await
    }

    async fn calculate_median_task_duration(&self) -> Result<Option<f64>> {
        let mut durations = self.send(|resp| Command::Median { resp }).await?;
        if durations.is_empty() {
            return Ok(None);
        }
        durations.sort_by(|a, b| a.partial_cmp(b).unwrap());
        let mid = durations.len() / 2;
        let median = if durations.len() % 2 == 0 {
            (durations[mid - 1] + durations[mid]) / 2.0
        } else {
            durations[mid]
        };
        Ok(Some(median))
    }
}
