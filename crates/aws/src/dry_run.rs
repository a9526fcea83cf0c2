//! Side-effect-free routines for `--dry-run`.
//!
//! Each returns the handle the real routine would return for the same
//! request id, without calling AWS.

use async_trait::async_trait;
use provisioner_core::{RoutineError, ServiceRoutine};
use provisioner_storage::ResourceHandle;
use serde_json::{Map, Value};
use tracing::info;

use crate::{object_store, rest_api};

#[derive(Debug, Clone)]
enum Kind {
    ObjectStore { bucket_prefix: String },
    RestApi,
}

#[derive(Debug, Clone)]
pub struct DryRunRoutine {
    kind: Kind,
}

impl DryRunRoutine {
    pub fn object_store(bucket_prefix: impl Into<String>) -> Self {
        Self {
            kind: Kind::ObjectStore {
                bucket_prefix: bucket_prefix.into(),
            },
        }
    }

    pub fn rest_api() -> Self {
        Self { kind: Kind::RestApi }
    }
}

#[async_trait]
impl ServiceRoutine for DryRunRoutine {
    async fn provision(
        &self,
        request_id: &str,
        _extra: &Map<String, Value>,
    ) -> Result<ResourceHandle, RoutineError> {
        let handle = match &self.kind {
            Kind::ObjectStore { bucket_prefix } => ResourceHandle::from([(
                object_store::HANDLE_KEY.to_string(),
                object_store::bucket_name(bucket_prefix, request_id),
            )]),
            Kind::RestApi => ResourceHandle::from([
                (rest_api::ID_KEY.to_string(), format!("dry-run-{request_id}")),
                (
                    rest_api::NAME_KEY.to_string(),
                    rest_api::rest_api_name(request_id),
                ),
            ]),
        };
        info!(request_id = %request_id, routine = self.routine_id(), "Dry run, nothing created");
        Ok(handle)
    }

    fn routine_id(&self) -> &str {
        match self.kind {
            Kind::ObjectStore { .. } => "dry-run-s3-bucket",
            Kind::RestApi => "dry-run-apigateway-rest-api",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn object_store_handle_matches_real_naming() {
        let routine = DryRunRoutine::object_store("demo-bucket");
        let handle = routine.provision("abc-123", &Map::new()).await.unwrap();
        assert_eq!(handle["s3Bucket"], "demo-bucket-abc-123");
        assert_eq!(handle.len(), 1);
    }

    #[tokio::test]
    async fn rest_api_handle_has_id_and_name() {
        let routine = DryRunRoutine::rest_api();
        let handle = routine.provision("abc-123", &Map::new()).await.unwrap();
        assert_eq!(handle["apiGatewayId"], "dry-run-abc-123");
        assert_eq!(handle["apiName"], "API-abc-123");
    }

    #[test]
    fn dry_run_declares_no_permissions() {
        assert!(DryRunRoutine::rest_api().permissions().is_empty());
    }
}
