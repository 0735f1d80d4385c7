use super::traits::{Invocation, Storer, StorageError};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;

/// Process-lifetime store. Nothing survives a restart.
#[derive(Debug, Default)]
pub struct MemoryStore {
    invocations: RwLock<HashMap<String, Invocation>>,
    closed: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn check_open(&self) -> Result<(), StorageError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(StorageError::Closed);
        }
        Ok(())
    }
}

#[async_trait]
impl Storer for MemoryStore {
    async fn most_recent_invocation(
        &self,
        collector_name: &str,
    ) -> Result<Option<Invocation>, StorageError> {
        self.check_open()?;
        let invocations = self
            .invocations
            .read()
            .map_err(|e| StorageError::Database(format!("lock poisoned: {}", e)))?;
        Ok(invocations.get(collector_name).cloned())
    }

    async fn save_invocation(&self, invocation: &Invocation) -> Result<(), StorageError> {
        self.check_open()?;
        let mut invocations = self
            .invocations
            .write()
            .map_err(|e| StorageError::Database(format!("lock poisoned: {}", e)))?;

        match invocations.get(&invocation.collector_name) {
            // An older write never replaces a newer one
            Some(existing) if existing.time > invocation.time => {
                tracing::debug!(
                    collector = %invocation.collector_name,
                    stored = %existing.time,
                    incoming = %invocation.time,
                    "Ignoring stale invocation"
                );
            }
            _ => {
                invocations.insert(invocation.collector_name.clone(), invocation.clone());
            }
        }
        Ok(())
    }

    async fn close(&self) -> Result<(), StorageError> {
        self.closed.store(true, Ordering::Release);
        Ok(())
    }
}
