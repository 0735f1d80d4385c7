use crate::timeseries::Window;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    Database(String),

    #[error("corrupt invocation record for collector {collector}: {reason}")]
    Corrupt { collector: String, reason: String },

    #[error("state store is closed")]
    Closed,
}

impl From<::duckdb::Error> for StorageError {
    fn from(e: ::duckdb::Error) -> Self {
        StorageError::Database(e.to_string())
    }
}

/// The last point at which a collector completed a run.
///
/// `window` is set only for windowed collectors; its end is the collector's
/// watermark.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invocation {
    pub collector_name: String,
    pub time: DateTime<Utc>,
    pub window: Option<Window>,
}

impl Invocation {
    pub fn end(&self) -> Option<DateTime<Utc>> {
        self.window.map(|w| w.end())
    }
}

/// Store of the most recent invocation per collector.
///
/// One instance is shared by every collector in the process, so
/// implementations must tolerate concurrent calls for different collector
/// names. A reader sees either the full previous record or none at all.
#[async_trait]
pub trait Storer: Send + Sync {
    async fn most_recent_invocation(
        &self,
        collector_name: &str,
    ) -> Result<Option<Invocation>, StorageError>;

    /// Upsert by collector name.
    async fn save_invocation(&self, invocation: &Invocation) -> Result<(), StorageError>;

    async fn close(&self) -> Result<(), StorageError>;
}
