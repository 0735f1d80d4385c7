use super::traits::{Invocation, Storer, StorageError};
use crate::timeseries::Window;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use duckdb::{params, Connection, OptionalExt};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// DuckDB-backed store that keeps watermarks across restarts.
pub struct DuckDbStore {
    conn: Arc<Mutex<Connection>>,
    closed: AtomicBool,
}

fn micros_to_datetime(collector: &str, us: i64) -> Result<DateTime<Utc>, StorageError> {
    DateTime::from_timestamp(us.div_euclid(1_000_000), (us.rem_euclid(1_000_000) * 1_000) as u32)
        .ok_or_else(|| StorageError::Corrupt {
            collector: collector.to_string(),
            reason: format!("timestamp out of range: {}", us),
        })
}

fn lock(conn: &Mutex<Connection>) -> Result<std::sync::MutexGuard<'_, Connection>, StorageError> {
    conn.lock()
        .map_err(|e| StorageError::Database(format!("connection lock poisoned: {}", e)))
}

impl DuckDbStore {
    /// Open (or create) the database file and make sure the schema exists.
    pub async fn open<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    StorageError::Database(format!(
                        "failed to create directory {}: {}",
                        parent.display(),
                        e
                    ))
                })?;
            }
        }

        tracing::info!(path = %path.display(), "Opening DuckDB state store");
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
            closed: AtomicBool::new(false),
        };
        store.init_schema().await?;
        Ok(store)
    }

    /// In-memory database, for tests.
    pub async fn in_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
            closed: AtomicBool::new(false),
        };
        store.init_schema().await?;
        Ok(store)
    }

    async fn init_schema(&self) -> Result<(), StorageError> {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let conn = lock(&conn)?;
            conn.execute(
                "CREATE TABLE IF NOT EXISTS invocations (
                    collector_name VARCHAR PRIMARY KEY,
                    invoked_at_us BIGINT NOT NULL,
                    window_start_us BIGINT,
                    window_end_us BIGINT
                )",
                [],
            )?;
            Ok::<(), StorageError>(())
        })
        .await
        .map_err(|e| StorageError::Database(format!("Task join error: {}", e)))?
    }

    fn check_open(&self) -> Result<(), StorageError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(StorageError::Closed);
        }
        Ok(())
    }
}

#[async_trait]
impl Storer for DuckDbStore {
    async fn most_recent_invocation(
        &self,
        collector_name: &str,
    ) -> Result<Option<Invocation>, StorageError> {
        self.check_open()?;
        let conn = self.conn.clone();
        let name = collector_name.to_string();

        tokio::task::spawn_blocking(move || -> Result<Option<Invocation>, StorageError> {
            let conn = lock(&conn)?;
            let row = conn
                .query_row(
                    "SELECT invoked_at_us, window_start_us, window_end_us
                     FROM invocations WHERE collector_name = ?",
                    params![name],
                    |row| {
                        Ok((
                            row.get::<_, i64>(0)?,
                            row.get::<_, Option<i64>>(1)?,
                            row.get::<_, Option<i64>>(2)?,
                        ))
                    },
                )
                .optional()?;

            let Some((invoked_at, start, end)) = row else {
                return Ok(None);
            };

            let window = match (start, end) {
                (Some(start), Some(end)) => Some(
                    Window::new(
                        micros_to_datetime(&name, start)?,
                        micros_to_datetime(&name, end)?,
                    )
                    .map_err(|e| StorageError::Corrupt {
                        collector: name.clone(),
                        reason: e.to_string(),
                    })?,
                ),
                (None, None) => None,
                _ => {
                    return Err(StorageError::Corrupt {
                        collector: name.clone(),
                        reason: "window has only one bound".to_string(),
                    })
                }
            };

            Ok(Some(Invocation {
                time: micros_to_datetime(&name, invoked_at)?,
                collector_name: name,
                window,
            }))
        })
        .await
        .map_err(|e| StorageError::Database(format!("Task join error: {}", e)))?
    }

    async fn save_invocation(&self, invocation: &Invocation) -> Result<(), StorageError> {
        self.check_open()?;
        let conn = self.conn.clone();
        let invocation = invocation.clone();

        tokio::task::spawn_blocking(move || -> Result<(), StorageError> {
            let conn = lock(&conn)?;

            let stored: Option<i64> = conn
                .query_row(
                    "SELECT invoked_at_us FROM invocations WHERE collector_name = ?",
                    params![invocation.collector_name],
                    |row| row.get(0),
                )
                .optional()?;

            let incoming = invocation.time.timestamp_micros();
            if matches!(stored, Some(stored) if stored > incoming) {
                tracing::debug!(
                    collector = %invocation.collector_name,
                    "Ignoring stale invocation"
                );
                return Ok(());
            }

            conn.execute(
                "INSERT OR REPLACE INTO invocations
                    (collector_name, invoked_at_us, window_start_us, window_end_us)
                 VALUES (?, ?, ?, ?)",
                params![
                    invocation.collector_name,
                    incoming,
                    invocation.window.map(|w| w.start().timestamp_micros()),
                    invocation.window.map(|w| w.end().timestamp_micros()),
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(|e| StorageError::Database(format!("Task join error: {}", e)))?
    }

    async fn close(&self) -> Result<(), StorageError> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let conn = lock(&conn)?;
            conn.execute_batch("CHECKPOINT")?;
            Ok::<(), StorageError>(())
        })
        .await
        .map_err(|e| StorageError::Database(format!("Task join error: {}", e)))?
    }
}
