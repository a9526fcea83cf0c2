//! `object-store`: one S3 bucket per request.

use async_trait::async_trait;
use aws_sdk_s3::types::{BucketLocationConstraint, CreateBucketConfiguration};
use aws_sdk_s3::Client;
use provisioner_core::{RoutineError, ServiceRoutine};
use provisioner_storage::ResourceHandle;
use serde_json::{Map, Value};
use tracing::{info, warn};

use crate::context::AwsContext;
use crate::error;

pub const DEFAULT_BUCKET_PREFIX: &str = "demo-bucket";

/// Handle key for the created bucket's name.
pub const HANDLE_KEY: &str = "s3Bucket";

/// The bucket name for a request: `"{prefix}-{request_id}"`, lowercased.
///
/// S3 bucket names must be lowercase; a UUID request id already is, but a
/// configured prefix might not be.
pub fn bucket_name(prefix: &str, request_id: &str) -> String {
    format!("{prefix}-{request_id}").to_ascii_lowercase()
}

pub struct ObjectStoreRoutine {
    client: Client,
    region: String,
    bucket_prefix: String,
}

impl ObjectStoreRoutine {
    pub fn from_context(ctx: &AwsContext, bucket_prefix: impl Into<String>) -> Self {
        Self {
            client: ctx.s3_client(),
            region: ctx.region().to_string(),
            bucket_prefix: bucket_prefix.into(),
        }
    }

    /// `us-east-1` rejects an explicit location constraint.
    fn bucket_configuration(&self) -> Option<CreateBucketConfiguration> {
        if self.region == "us-east-1" {
            return None;
        }
        Some(
            CreateBucketConfiguration::builder()
                .location_constraint(BucketLocationConstraint::from(self.region.as_str()))
                .build(),
        )
    }
}

#[async_trait]
impl ServiceRoutine for ObjectStoreRoutine {
    async fn provision(
        &self,
        request_id: &str,
        _extra: &Map<String, Value>,
    ) -> Result<ResourceHandle, RoutineError> {
        let bucket = bucket_name(&self.bucket_prefix, request_id);
        info!(request_id = %request_id, bucket = %bucket, region = %self.region, "Creating S3 bucket");

        self.client
            .create_bucket()
            .bucket(&bucket)
            .set_create_bucket_configuration(self.bucket_configuration())
            .send()
            .await
            .map_err(|e| {
                let reason = error::describe("CreateBucket", &e);
                warn!(request_id = %request_id, bucket = %bucket, reason = %reason, "Bucket creation failed");
                RoutineError::failed(reason)
            })?;

        Ok(ResourceHandle::from([(HANDLE_KEY.to_string(), bucket)]))
    }

    fn routine_id(&self) -> &str {
        "s3-bucket"
    }

    fn permissions(&self) -> &'static [&'static str] {
        &["s3:CreateBucket"]
    }
}
