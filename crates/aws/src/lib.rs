//! AWS backend for the provisioner.
//!
//! - [`ObjectStoreRoutine`] and [`RestApiRoutine`]: the shipped service routines
//! - [`DryRunRoutine`]: side-effect-free stand-ins for `--dry-run`
//! - [`DynamoDbStore`]: a [`RequestStore`](provisioner_storage::RequestStore) on DynamoDB
//! - [`SecretsManagerSource`]: a [`SecretSource`](provisioner_core::SecretSource) on Secrets Manager
//! - [`aws_registry`] / [`dry_run_registry`]: the default tag table

pub mod context;
pub mod dry_run;
pub mod dynamodb;
pub mod error;
pub mod object_store;
pub mod registry;
pub mod rest_api;
pub mod secrets;

pub use context::AwsContext;
pub use dry_run::DryRunRoutine;
pub use dynamodb::DynamoDbStore;
pub use object_store::{bucket_name, ObjectStoreRoutine, DEFAULT_BUCKET_PREFIX};
pub use registry::{aws_registry, dry_run_registry, RegistryOptions, OBJECT_STORE, REST_API};
pub use rest_api::{rest_api_name, RestApiRoutine};
pub use secrets::SecretsManagerSource;
