//! Shared AWS configuration context.
//!
//! The base config is loaded once at startup. Routines that run under their
//! own IAM role get a scoped copy whose credentials come from an STS
//! assume-role provider, so each routine only holds the permissions of its
//! own role.

use std::sync::Arc;

use aws_config::sts::AssumeRoleProvider;
use aws_config::{BehaviorVersion, Region, SdkConfig};
use tracing::debug;

#[derive(Clone)]
pub struct AwsContext {
    config: Arc<SdkConfig>,
    region: String,
}

impl AwsContext {
    /// Load AWS configuration for `region` from the environment, config
    /// files, and instance/task roles.
    pub async fn new(region: &str) -> Self {
        let config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(region.to_string()))
            .load()
            .await;

        Self {
            config: Arc::new(config),
            region: region.to_string(),
        }
    }

    /// Derive a context whose credentials are obtained by assuming `role_arn`.
    ///
    /// The base credentials are only used to call STS.
    pub async fn assume_role(&self, role_arn: &str, session_name: &str) -> Self {
        debug!(role_arn = %role_arn, session = %session_name, "Scoping credentials to role");
        let provider = AssumeRoleProvider::builder(role_arn)
            .session_name(session_name)
            .configure(&self.config)
            .build()
            .await;

        let config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(self.region.clone()))
            .credentials_provider(provider)
            .load()
            .await;

        Self {
            config: Arc::new(config),
            region: self.region.clone(),
        }
    }

    /// Return `self`, or a role-scoped copy when `role_arn` is set.
    pub async fn scoped(&self, role_arn: Option<&str>, session_name: &str) -> Self {
        match role_arn {
            Some(arn) => self.assume_role(arn, session_name).await,
            None => self.clone(),
        }
    }

    pub fn sdk_config(&self) -> &SdkConfig {
        &self.config
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    pub fn s3_client(&self) -> aws_sdk_s3::Client {
        aws_sdk_s3::Client::new(self.sdk_config())
    }

    pub fn apigateway_client(&self) -> aws_sdk_apigateway::Client {
        aws_sdk_apigateway::Client::new(self.sdk_config())
    }

    pub fn dynamodb_client(&self) -> aws_sdk_dynamodb::Client {
        aws_sdk_dynamodb::Client::new(self.sdk_config())
    }

    pub fn secretsmanager_client(&self) -> aws_sdk_secretsmanager::Client {
        aws_sdk_secretsmanager::Client::new(self.sdk_config())
    }
}

impl std::fmt::Debug for AwsContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AwsContext")
            .field("region", &self.region)
            .finish_non_exhaustive()
    }
}
