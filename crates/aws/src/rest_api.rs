//! `rest-api`: one API Gateway REST API per request.

use async_trait::async_trait;
use aws_sdk_apigateway::Client;
use provisioner_core::{RoutineError, ServiceRoutine};
use provisioner_storage::ResourceHandle;
use serde_json::{Map, Value};
use tracing::{info, warn};

use crate::context::AwsContext;
use crate::error;

pub const ID_KEY: &str = "apiGatewayId";
pub const NAME_KEY: &str = "apiName";

pub fn rest_api_name(request_id: &str) -> String {
    format!("API-{request_id}")
}

pub struct RestApiRoutine {
    client: Client,
}

impl RestApiRoutine {
    pub fn from_context(ctx: &AwsContext) -> Self {
        Self {
            client: ctx.apigateway_client(),
        }
    }
}

#[async_trait]
impl ServiceRoutine for RestApiRoutine {
    async fn provision(
        &self,
        request_id: &str,
        _extra: &Map<String, Value>,
    ) -> Result<ResourceHandle, RoutineError> {
        let name = rest_api_name(request_id);
        info!(request_id = %request_id, api_name = %name, "Creating REST API");

        let output = self
            .client
            .create_rest_api()
            .name(&name)
            .send()
            .await
            .map_err(|e| {
                let reason = error::describe("CreateRestApi", &e);
                warn!(request_id = %request_id, api_name = %name, reason = %reason, "REST API creation failed");
                RoutineError::failed(reason)
            })?;

        let id = output
            .id()
            .ok_or_else(|| RoutineError::failed("CreateRestApi failed: response carried no API id"))?;

        Ok(ResourceHandle::from([
            (ID_KEY.to_string(), id.to_string()),
            (NAME_KEY.to_string(), name),
        ]))
    }

    fn routine_id(&self) -> &str {
        "apigateway-rest-api"
    }

    fn permissions(&self) -> &'static [&'static str] {
        &["apigateway:POST"]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_name_is_derived_from_request_id() {
        assert_eq!(rest_api_name("4b1d"), "API-4b1d");
    }

    #[tokio::test]
    #[ignore = "requires AWS credentials"]
    async fn creates_rest_api_named_after_request() {
        let ctx = AwsContext::new("us-east-2").await;
        let routine = RestApiRoutine::from_context(&ctx);
        let id = uuid::Uuid::new_v4().to_string();

        let handle = routine.provision(&id, &Map::new()).await.unwrap();
        assert_eq!(handle[NAME_KEY], rest_api_name(&id));

        ctx.apigateway_client()
            .delete_rest_api()
            .rest_api_id(&handle[ID_KEY])
            .send()
            .await
            .unwrap();
    }
}
