//! Secrets Manager-backed [`SecretSource`].

use async_trait::async_trait;
use aws_sdk_secretsmanager::Client;
use provisioner_core::{SecretError, SecretSource, SecretString};
use tracing::debug;

use crate::context::AwsContext;
use crate::error;

pub struct SecretsManagerSource {
    client: Client,
}

impl SecretsManagerSource {
    pub const PERMISSIONS: &'static [&'static str] = &["secretsmanager:GetSecretValue"];

    pub fn new(client: Client) -> Self {
        Self { client }
    }

    pub fn from_context(ctx: &AwsContext) -> Self {
        Self::new(ctx.secretsmanager_client())
    }
}

#[async_trait]
impl SecretSource for SecretsManagerSource {
    async fn get_secret(&self, name: &str) -> Result<SecretString, SecretError> {
        debug!(secret = %name, "Fetching secret");
        let output = self
            .client
            .get_secret_value()
            .secret_id(name)
            .send()
            .await
            .map_err(|e| {
                let err = e.into_service_error();
                if err.is_resource_not_found_exception() {
                    SecretError::NotFound {
                        name: name.to_string(),
                    }
                } else {
                    SecretError::Backend(error::describe("GetSecretValue", &err))
                }
            })?;

        // Binary secrets are not supported.
        output
            .secret_string()
            .map(SecretString::new)
            .ok_or_else(|| SecretError::NotFound {
                name: name.to_string(),
            })
    }

    fn source_id(&self) -> &str {
        "secretsmanager"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    #[ignore = "requires AWS credentials"]
    async fn missing_secret_is_not_found() {
        let ctx = AwsContext::new("us-east-2").await;
        let source = SecretsManagerSource::from_context(&ctx);
        let name = format!("provisioner-missing-{}", uuid::Uuid::new_v4());
        assert!(matches!(
            source.get_secret(&name).await,
            Err(SecretError::NotFound { .. })
        ));
    }
}
