//! `provisioner policy` -- least-privilege IAM policy for a deployment.
//!
//! The deployment policy grants the actions of every routine that runs on the
//! base credentials, `sts:AssumeRole` on the roles of routines that have their
//! own, plus what the request store (and the secret source, when an API key is
//! configured) need. A role-scoped routine's actions are granted only by that
//! role's policy, printed with `provisioner policy --routine <tag>`.

use std::collections::BTreeSet;

use provisioner_aws::{DynamoDbStore, SecretsManagerSource};
use provisioner_core::ServiceRegistry;
use provisioner_storage::ServiceTag;
use serde_json::{json, Value};

use crate::config::ServerConfig;

const POLICY_VERSION: &str = "2012-10-17";

pub(crate) fn policy_document(registry: &ServiceRegistry, config: &ServerConfig) -> Value {
    let options = config.registry_options();
    let mut routine_actions: BTreeSet<&str> = BTreeSet::new();
    let mut roles: BTreeSet<&str> = BTreeSet::new();
    for tag in registry.canonical_tags() {
        match options.role_for(tag.as_str()) {
            Some(role) => {
                roles.insert(role);
            }
            None => routine_actions.extend(routine_permissions(registry, tag)),
        }
    }

    let mut statements = Vec::new();
    if !routine_actions.is_empty() {
        statements.push(json!({
            "Sid": "ProvisionServices",
            "Effect": "Allow",
            "Action": routine_actions,
            "Resource": "*",
        }));
    }
    if !roles.is_empty() {
        statements.push(json!({
            "Sid": "AssumeRoutineRoles",
            "Effect": "Allow",
            "Action": ["sts:AssumeRole"],
            "Resource": roles,
        }));
    }

    let table_resource = match &config.table_name {
        Some(table) => format!("arn:aws:dynamodb:{}:*:table/{}", config.region, table),
        None => "*".to_string(),
    };
    statements.push(json!({
        "Sid": "RecordRequests",
        "Effect": "Allow",
        "Action": DynamoDbStore::PERMISSIONS,
        "Resource": table_resource,
    }));

    if let Some(secret) = &config.api_key_secret {
        statements.push(json!({
            "Sid": "ReadApiKey",
            "Effect": "Allow",
            "Action": SecretsManagerSource::PERMISSIONS,
            "Resource": format!("arn:aws:secretsmanager:{}:*:secret:{}*", config.region, secret),
        }));
    }

    json!({
        "Version": POLICY_VERSION,
        "Statement": statements,
    })
}

/// Permission policy for the role a single routine assumes. `None` when the
/// tag is not registered.
pub(crate) fn routine_policy_document(registry: &ServiceRegistry, tag: &str) -> Option<Value> {
    let tag = ServiceTag::from(tag);
    let canonical = registry.canonical(&tag);
    registry.lookup(canonical)?;
    Some(json!({
        "Version": POLICY_VERSION,
        "Statement": [{
            "Sid": "ProvisionService",
            "Effect": "Allow",
            "Action": routine_permissions(registry, canonical),
            "Resource": "*",
        }],
    }))
}

fn routine_permissions(registry: &ServiceRegistry, tag: &ServiceTag) -> Vec<&'static str> {
    registry
        .lookup(tag)
        .map(|r| r.permissions().to_vec())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RoutineConfig;
    use async_trait::async_trait;
    use provisioner_core::{RoutineError, ServiceRoutine};
    use provisioner_storage::ResourceHandle;
    use serde_json::Map;
    use std::sync::Arc;

    struct Declares(&'static [&'static str]);

    #[async_trait]
    impl ServiceRoutine for Declares {
        async fn provision(
            &self,
            _request_id: &str,
            _extra: &Map<String, Value>,
        ) -> Result<ResourceHandle, RoutineError> {
            Ok(ResourceHandle::new())
        }

        fn routine_id(&self) -> &str {
            "declares"
        }

        fn permissions(&self) -> &'static [&'static str] {
            self.0
        }
    }

    fn registry() -> ServiceRegistry {
        let mut builder = ServiceRegistry::builder();
        builder
            .register("object-store", Arc::new(Declares(&["s3:CreateBucket"])))
            .unwrap()
            .register("rest-api", Arc::new(Declares(&["apigateway:POST"])))
            .unwrap()
            .alias("s3", "object-store")
            .unwrap();
        builder.build()
    }

    fn with_role(tag: &str, arn: &str) -> ServerConfig {
        let mut config = ServerConfig::default();
        config.routines.insert(
            tag.to_string(),
            RoutineConfig {
                role_arn: Some(arn.to_string()),
            },
        );
        config
    }

    #[test]
    fn grants_routine_and_store_actions() {
        let config = ServerConfig {
            table_name: Some("requests".to_string()),
            region: "us-east-2".to_string(),
            ..ServerConfig::default()
        };
        let doc = policy_document(&registry(), &config);
        let statements = doc["Statement"].as_array().unwrap();
        assert_eq!(statements.len(), 2);
        assert_eq!(
            statements[0]["Action"],
            json!(["apigateway:POST", "s3:CreateBucket"])
        );
        assert_eq!(
            statements[1]["Action"],
            json!(["dynamodb:GetItem", "dynamodb:PutItem", "dynamodb:UpdateItem"])
        );
        assert_eq!(
            statements[1]["Resource"],
            "arn:aws:dynamodb:us-east-2:*:table/requests"
        );
    }

    #[test]
    fn role_scoped_routine_gets_assume_role_instead_of_its_actions() {
        let arn = "arn:aws:iam::123456789012:role/s3-creator";
        let doc = policy_document(&registry(), &with_role("object-store", arn));
        let statements = doc["Statement"].as_array().unwrap();

        assert_eq!(statements[0]["Sid"], "ProvisionServices");
        assert_eq!(statements[0]["Action"], json!(["apigateway:POST"]));
        assert_eq!(statements[1]["Sid"], "AssumeRoutineRoles");
        assert_eq!(statements[1]["Action"], json!(["sts:AssumeRole"]));
        assert_eq!(statements[1]["Resource"], json!([arn]));
        assert!(!doc.to_string().contains("s3:CreateBucket"));
    }

    #[test]
    fn role_configured_under_legacy_tag_is_honored() {
        let arn = "arn:aws:iam::123456789012:role/s3-creator";
        let doc = policy_document(&registry(), &with_role("s3", arn));
        assert!(doc.to_string().contains("sts:AssumeRole"));
        assert!(!doc.to_string().contains("s3:CreateBucket"));
    }

    #[test]
    fn routine_policy_grants_only_that_routines_actions() {
        let doc = routine_policy_document(&registry(), "s3").unwrap();
        assert_eq!(doc["Statement"][0]["Action"], json!(["s3:CreateBucket"]));
        assert!(routine_policy_document(&registry(), "queue").is_none());
    }

    #[test]
    fn api_key_secret_adds_read_statement() {
        let config = ServerConfig {
            api_key_secret: Some("provisioner/api-key".to_string()),
            ..ServerConfig::default()
        };
        let doc = policy_document(&registry(), &config);
        let statements = doc["Statement"].as_array().unwrap();
        assert_eq!(statements.len(), 3);
        assert_eq!(
            statements[2]["Action"],
            json!(["secretsmanager:GetSecretValue"])
        );
    }
}
