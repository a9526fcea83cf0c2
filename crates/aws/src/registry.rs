//! The default service tag table.
//!
//! Canonical tags are `object-store` and `rest-api`. The legacy tags `s3` and
//! `apigateway` are registered as aliases of the same routines.

use std::collections::BTreeMap;
use std::sync::Arc;

use provisioner_core::{RegistryError, ServiceRegistry, ServiceRegistryBuilder};
use tracing::info;

use crate::context::AwsContext;
use crate::dry_run::DryRunRoutine;
use crate::object_store::{ObjectStoreRoutine, DEFAULT_BUCKET_PREFIX};
use crate::rest_api::RestApiRoutine;

pub const OBJECT_STORE: &str = "object-store";
pub const REST_API: &str = "rest-api";

const ALIASES: &[(&str, &str)] = &[("s3", OBJECT_STORE), ("apigateway", REST_API)];

/// Routine settings for the default registry.
#[derive(Debug, Clone)]
pub struct RegistryOptions {
    pub bucket_prefix: String,
    /// IAM role to assume per canonical tag. Tags without an entry use the
    /// base credentials.
    pub role_arns: BTreeMap<String, String>,
}

impl Default for RegistryOptions {
    fn default() -> Self {
        Self {
            bucket_prefix: DEFAULT_BUCKET_PREFIX.to_string(),
            role_arns: BTreeMap::new(),
        }
    }
}

impl RegistryOptions {
    /// The role configured for canonical `tag`, falling back to a role
    /// configured under one of its legacy aliases.
    pub fn role_for(&self, tag: &str) -> Option<&str> {
        self.role_arns
            .get(tag)
            .or_else(|| {
                ALIASES
                    .iter()
                    .filter(|(_, target)| *target == tag)
                    .find_map(|(alias, _)| self.role_arns.get(*alias))
            })
            .map(String::as_str)
    }
}

/// Registry of the AWS routines, each with its own credential scope.
pub async fn aws_registry(
    ctx: &AwsContext,
    options: &RegistryOptions,
) -> Result<ServiceRegistry, RegistryError> {
    let s3_ctx = ctx
        .scoped(options.role_for(OBJECT_STORE), "provisioner-object-store")
        .await;
    let apigw_ctx = ctx
        .scoped(options.role_for(REST_API), "provisioner-rest-api")
        .await;

    let mut builder = ServiceRegistry::builder();
    builder
        .register(
            OBJECT_STORE,
            Arc::new(ObjectStoreRoutine::from_context(
                &s3_ctx,
                options.bucket_prefix.clone(),
            )),
        )?
        .register(REST_API, Arc::new(RestApiRoutine::from_context(&apigw_ctx)))?;
    finish(builder)
}

/// Registry of dry-run stand-ins with the same tags as [`aws_registry`].
pub fn dry_run_registry(options: &RegistryOptions) -> Result<ServiceRegistry, RegistryError> {
    let mut builder = ServiceRegistry::builder();
    builder
        .register(
            OBJECT_STORE,
            Arc::new(DryRunRoutine::object_store(options.bucket_prefix.clone())),
        )?
        .register(REST_API, Arc::new(DryRunRoutine::rest_api()))?;
    finish(builder)
}

fn finish(mut builder: ServiceRegistryBuilder) -> Result<ServiceRegistry, RegistryError> {
    for (alias, target) in ALIASES {
        builder.alias(*alias, *target)?;
    }
    let registry = builder.build();
    info!(registry = ?registry, "Service registry ready");
    Ok(registry)
}
