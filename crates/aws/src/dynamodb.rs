//! DynamoDB-backed [`RequestStore`].
//!
//! Item layout, keyed by `requestId` (S):
//!
//! | attribute     | type | written by       |
//! |---------------|------|------------------|
//! | `requestId`   | S    | `put`            |
//! | `record`      | S    | `put` (intent record as JSON) |
//! | `outcome`     | S    | `record_outcome` (outcome as JSON) |
//! | `completedAt` | S    | `record_outcome` |
//!
//! Write-once semantics are enforced with condition expressions, so concurrent
//! writers for the same id cannot overwrite each other.

use std::collections::HashMap;

use async_trait::async_trait;
use aws_sdk_dynamodb::types::AttributeValue;
use aws_sdk_dynamodb::Client;
use provisioner_storage::{ProvisioningOutcome, ProvisioningRecord, RequestStore, StorageError};
use tracing::debug;

use crate::context::AwsContext;
use crate::error;

const KEY: &str = "requestId";
const RECORD: &str = "record";
const OUTCOME: &str = "outcome";
const COMPLETED_AT: &str = "completedAt";

pub struct DynamoDbStore {
    client: Client,
    table_name: String,
}

impl DynamoDbStore {
    /// Actions the store performs against its table.
    pub const PERMISSIONS: &'static [&'static str] =
        &["dynamodb:GetItem", "dynamodb:PutItem", "dynamodb:UpdateItem"];

    pub fn new(client: Client, table_name: impl Into<String>) -> Self {
        Self {
            client,
            table_name: table_name.into(),
        }
    }

    pub fn from_context(ctx: &AwsContext, table_name: impl Into<String>) -> Self {
        Self::new(ctx.dynamodb_client(), table_name)
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    async fn get_item(
        &self,
        request_id: &str,
    ) -> Result<Option<HashMap<String, AttributeValue>>, StorageError> {
        let output = self
            .client
            .get_item()
            .table_name(&self.table_name)
            .key(KEY, AttributeValue::S(request_id.to_string()))
            .consistent_read(true)
            .send()
            .await
            .map_err(|e| StorageError::Backend(error::describe("GetItem", &e)))?;
        Ok(output.item)
    }
}

fn string_attr<'a>(
    item: &'a HashMap<String, AttributeValue>,
    name: &str,
) -> Result<Option<&'a str>, StorageError> {
    match item.get(name) {
        None => Ok(None),
        Some(value) => value.as_s().map(|s| Some(s.as_str())).map_err(|_| {
            StorageError::Serialization(format!("attribute '{name}' is not a string"))
        }),
    }
}

/// Rebuild a [`ProvisioningRecord`] from a stored item.
fn record_from_item(item: &HashMap<String, AttributeValue>) -> Result<ProvisioningRecord, StorageError> {
    let json = string_attr(item, RECORD)?
        .ok_or_else(|| StorageError::Serialization(format!("item has no '{RECORD}' attribute")))?;
    let mut record: ProvisioningRecord = serde_json::from_str(json)?;

    if let Some(outcome) = string_attr(item, OUTCOME)? {
        record.outcome = Some(serde_json::from_str::<ProvisioningOutcome>(outcome)?);
    }
    record.completed_at = string_attr(item, COMPLETED_AT)?.map(str::to_string);
    Ok(record)
}

#[async_trait]
impl RequestStore for DynamoDbStore {
    async fn put(&self, record: &ProvisioningRecord) -> Result<(), StorageError> {
        let intent = ProvisioningRecord {
            completed_at: None,
            outcome: None,
            ..record.clone()
        };
        let json = serde_json::to_string(&intent)?;

        self.client
            .put_item()
            .table_name(&self.table_name)
            .item(KEY, AttributeValue::S(record.request_id.clone()))
            .item(RECORD, AttributeValue::S(json))
            .condition_expression("attribute_not_exists(requestId)")
            .send()
            .await
            .map_err(|e| {
                let err = e.into_service_error();
                if err.is_conditional_check_failed_exception() {
                    StorageError::AlreadyExists {
                        request_id: record.request_id.clone(),
                    }
                } else {
                    StorageError::Backend(error::describe("PutItem", &err))
                }
            })?;

        debug!(request_id = %record.request_id, table = %self.table_name, "Stored request");
        Ok(())
    }

    async fn record_outcome(
        &self,
        request_id: &str,
        outcome: &ProvisioningOutcome,
        completed_at: &str,
    ) -> Result<(), StorageError> {
        let json = serde_json::to_string(outcome)?;

        let result = self
            .client
            .update_item()
            .table_name(&self.table_name)
            .key(KEY, AttributeValue::S(request_id.to_string()))
            .update_expression("SET #outcome = :outcome, #completed = :completed")
            .condition_expression("attribute_exists(requestId) AND attribute_not_exists(#outcome)")
            .expression_attribute_names("#outcome", OUTCOME)
            .expression_attribute_names("#completed", COMPLETED_AT)
            .expression_attribute_values(":outcome", AttributeValue::S(json))
            .expression_attribute_values(":completed", AttributeValue::S(completed_at.to_string()))
            .send()
            .await;

        match result {
            Ok(_) => {
                debug!(request_id = %request_id, table = %self.table_name, "Stored outcome");
                Ok(())
            }
            Err(e) => {
                let err = e.into_service_error();
                if !err.is_conditional_check_failed_exception() {
                    return Err(StorageError::Backend(error::describe("UpdateItem", &err)));
                }
                // The condition covers two cases; look at the item to tell them apart.
                match self.get_item(request_id).await? {
                    None => Err(StorageError::NotFound {
                        request_id: request_id.to_string(),
                    }),
                    Some(_) => Err(StorageError::OutcomeAlreadyRecorded {
                        request_id: request_id.to_string(),
                    }),
                }
            }
        }
    }

    async fn get(&self, request_id: &str) -> Result<ProvisioningRecord, StorageError> {
        match self.get_item(request_id).await? {
            Some(item) => record_from_item(&item),
            None => Err(StorageError::NotFound {
                request_id: request_id.to_string(),
            }),
        }
    }
}

impl std::fmt::Debug for DynamoDbStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DynamoDbStore")
            .field("table_name", &self.table_name)
            .finish_non_exhaustive()
    }
}
