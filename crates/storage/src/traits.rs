use async_trait::async_trait;

use crate::error::StorageError;
use crate::record::{ProvisioningOutcome, ProvisioningRecord};

/// The storage trait for provisioning request backends.
///
/// A `RequestStore` is a durable mapping from request id to the request
/// payload plus its provisioning outcome.
///
/// ## Write-once semantics
///
/// 1. `put()` records the intent. A second `put()` for the same id MUST fail
///    with `StorageError::AlreadyExists` and leave the stored record untouched.
/// 2. `record_outcome()` attaches the outcome to an existing record exactly
///    once. It MUST fail with `NotFound` when no record exists and with
///    `OutcomeAlreadyRecorded` when an outcome is already attached.
///
/// No other mutation exists; records are never deleted through this trait.
///
/// ## Thread Safety
///
/// Implementations must be `Send + Sync + 'static` to be shared through axum
/// application state and across spawned tasks. Writes for distinct request ids
/// must not require coordination between callers.
#[async_trait]
pub trait RequestStore: Send + Sync + 'static {
    /// Persist a new record. The record's `outcome` is expected to be `None`.
    async fn put(&self, record: &ProvisioningRecord) -> Result<(), StorageError>;

    /// Attach the final outcome and completion timestamp to an existing record.
    async fn record_outcome(
        &self,
        request_id: &str,
        outcome: &ProvisioningOutcome,
        completed_at: &str,
    ) -> Result<(), StorageError>;

    /// Read a record by request id.
    ///
    /// Returns `Err(StorageError::NotFound)` if no record exists.
    async fn get(&self, request_id: &str) -> Result<ProvisioningRecord, StorageError>;
}
