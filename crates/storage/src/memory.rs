//! In-process `RequestStore` used by tests and `--dry-run` mode.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::StorageError;
use crate::record::{ProvisioningOutcome, ProvisioningRecord};
use crate::traits::RequestStore;

/// A `RequestStore` backed by a mutex-guarded `HashMap`.
///
/// Records do not survive the process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: Mutex<HashMap<String, ProvisioningRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// All stored records, in no particular order.
    pub fn records(&self) -> Vec<ProvisioningRecord> {
        self.lock().values().cloned().collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, ProvisioningRecord>> {
        // Every write is a single insert or field update; poisoning leaves no partial record.
        self.records.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl RequestStore for MemoryStore {
    async fn put(&self, record: &ProvisioningRecord) -> Result<(), StorageError> {
        let mut records = self.lock();
        if records.contains_key(&record.request_id) {
            return Err(StorageError::AlreadyExists {
                request_id: record.request_id.clone(),
            });
        }
        records.insert(record.request_id.clone(), record.clone());
        Ok(())
    }

    async fn record_outcome(
        &self,
        request_id: &str,
        outcome: &ProvisioningOutcome,
        completed_at: &str,
    ) -> Result<(), StorageError> {
        let mut records = self.lock();
        let record = records
            .get_mut(request_id)
            .ok_or_else(|| StorageError::NotFound {
                request_id: request_id.to_string(),
            })?;
        if record.outcome.is_some() {
            return Err(StorageError::OutcomeAlreadyRecorded {
                request_id: request_id.to_string(),
            });
        }
        record.outcome = Some(outcome.clone());
        record.completed_at = Some(completed_at.to_string());
        Ok(())
    }

    async fn get(&self, request_id: &str) -> Result<ProvisioningRecord, StorageError> {
        self.lock()
            .get(request_id)
            .cloned()
            .ok_or_else(|| StorageError::NotFound {
                request_id: request_id.to_string(),
            })
    }
}
