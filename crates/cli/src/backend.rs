//! Wiring of the orchestrator to its collaborators.
//!
//! Live mode uses AWS for everything: routines, the DynamoDB request store,
//! and Secrets Manager. Dry-run mode swaps in side-effect-free routines, an
//! in-memory store, and environment-variable secrets.

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use provisioner_aws::{
    aws_registry, dry_run_registry, AwsContext, DynamoDbStore, SecretsManagerSource,
};
use provisioner_core::{
    EnvSecretSource, Orchestrator, ScopedSecrets, SecretSource, SecretString, ServiceRegistry,
};
use provisioner_storage::{MemoryStore, RequestStore};
use tracing::info;

use crate::config::ServerConfig;

pub(crate) struct Backend {
    pub(crate) orchestrator: Orchestrator,
    pub(crate) secrets: Arc<dyn SecretSource>,
}

impl Backend {
    pub(crate) async fn build(config: &ServerConfig, dry_run: bool) -> Result<Self> {
        config.validate()?;
        let options = config.registry_options();

        let (registry, store, secrets): (ServiceRegistry, Arc<dyn RequestStore>, Arc<dyn SecretSource>) =
            if dry_run {
                info!("Dry run: no AWS resources will be created");
                (
                    dry_run_registry(&options)?,
                    Arc::new(MemoryStore::new()),
                    Arc::new(EnvSecretSource::default()),
                )
            } else {
                let Some(table) = config.table_name.as_deref() else {
                    bail!("no request table configured (set --table, PROVISIONER_TABLE, or table_name)");
                };
                let ctx = AwsContext::new(&config.region).await;
                info!(region = %ctx.region(), table = %table, "Using AWS backend");
                (
                    aws_registry(&ctx, &options).await?,
                    Arc::new(DynamoDbStore::from_context(&ctx, table)),
                    Arc::new(SecretsManagerSource::from_context(&ctx)),
                )
            };

        let orchestrator = Orchestrator::new(registry, store).with_timeout(config.timeout());
        Ok(Self {
            orchestrator,
            secrets,
        })
    }

    /// Resolve the configured API key, if any.
    ///
    /// The key is read through a scope that only admits the configured
    /// secret name.
    pub(crate) async fn api_key(&self, config: &ServerConfig) -> Result<Option<SecretString>> {
        let Some(name) = config.api_key_secret.as_deref() else {
            return Ok(None);
        };
        let scoped = ScopedSecrets::new(Arc::clone(&self.secrets), [name]);
        let key = scoped
            .get(name)
            .await
            .with_context(|| format!("failed to resolve API key secret '{name}'"))?;
        Ok(Some(key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn dry_run_backend_needs_no_table() {
        let backend = Backend::build(&ServerConfig::default(), true).await.unwrap();
        assert!(backend
            .orchestrator
            .registry()
            .contains(&"object-store".into()));
        assert_eq!(backend.secrets.source_id(), "env");
    }

    #[tokio::test]
    async fn live_backend_requires_table() {
        let err = Backend::build(&ServerConfig::default(), false)
            .await
            .err()
            .unwrap();
        assert!(err.to_string().contains("no request table configured"));
    }

    #[tokio::test]
    async fn no_api_key_without_secret_name() {
        let backend = Backend::build(&ServerConfig::default(), true).await.unwrap();
        assert!(backend
            .api_key(&ServerConfig::default())
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn api_key_is_resolved_from_secret_source() {
        std::env::set_var("PROVISIONER_SECRET_BACKEND_TEST_KEY", "s3cret");
        let config = ServerConfig {
            api_key_secret: Some("backend-test-key".to_string()),
            ..ServerConfig::default()
        };
        let backend = Backend::build(&config, true).await.unwrap();
        let key = backend.api_key(&config).await.unwrap().unwrap();
        assert_eq!(key.expose(), "s3cret");
    }

    #[tokio::test]
    async fn missing_api_key_secret_fails_startup() {
        let config = ServerConfig {
            api_key_secret: Some("backend-test-absent".to_string()),
            ..ServerConfig::default()
        };
        let backend = Backend::build(&config, true).await.unwrap();
        assert!(backend.api_key(&config).await.is_err());
    }
}
