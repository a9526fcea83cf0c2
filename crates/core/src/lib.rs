//! provisioner-core: request-driven resource provisioning.
//!
//! Given a [`ProvisioningRequest`] naming one or more service tags, the
//! [`Orchestrator`] records the request in a
//! [`RequestStore`](provisioner_storage::RequestStore), runs the routine the
//! [`ServiceRegistry`] holds for each tag, and returns the aggregated
//! [`ProvisioningRecord`](provisioner_storage::ProvisioningRecord).
//!
//! # Public API
//!
//! - [`Orchestrator`] / [`Provisioned`] -- the provisioning entry point
//! - [`ServiceRegistry`] / [`ServiceRegistryBuilder`] / [`ServiceRoutine`] --
//!   tag to routine dispatch table, closed at startup
//! - [`SecretSource`] / [`ScopedSecrets`] -- runtime secret lookup
//! - error types: [`OrchestratorError`], [`ValidationError`], [`RoutineError`],
//!   [`PersistenceWarning`], [`RegistryError`], [`SecretError`]

pub mod error;
pub mod orchestrator;
pub mod registry;
pub mod request;
pub mod secrets;

pub use error::{
    OrchestratorError, PersistenceWarning, RegistryError, RoutineError, ValidationError,
};
pub use orchestrator::{Orchestrator, Provisioned, DEFAULT_TIMEOUT};
pub use registry::{ServiceRegistry, ServiceRegistryBuilder, ServiceRoutine};
pub use request::ProvisioningRequest;
pub use secrets::{EnvSecretSource, ScopedSecrets, SecretError, SecretSource, SecretString};

/// Format the current UTC time as an RFC 3339 timestamp.
pub(crate) fn now_rfc3339() -> String {
    let now = time::OffsetDateTime::now_utc();
    now.format(&time::format_description::well_known::Rfc3339)
        .unwrap_or_else(|_| "unknown".to_string())
}
