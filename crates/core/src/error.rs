//! Error taxonomy for provisioning.
//!
//! Only [`ValidationError`] and [`OrchestratorError::Internal`] fail a request
//! as a whole. [`RoutineError`] is captured per tag in the outcome, and
//! [`PersistenceWarning`] travels next to a successful result.

use provisioner_storage::ServiceTag;

/// The request was malformed; rejected before any side effect.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("request body must be a JSON object")]
    NotAnObject,

    #[error("missing 'services' field")]
    MissingServices,

    #[error("'services' must be an array of strings")]
    ServicesNotArray,

    #[error("'services[{index}]' must be a string")]
    InvalidServiceTag { index: usize },

    #[error("'services' must not be empty")]
    EmptyServices,
}

/// Failure of a whole provisioning request.
#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Anything unexpected. `request_id` is set once an id was generated.
    #[error("internal error: {message}")]
    Internal {
        request_id: Option<String>,
        message: String,
    },
}

impl OrchestratorError {
    pub fn request_id(&self) -> Option<&str> {
        match self {
            OrchestratorError::Validation(_) => None,
            OrchestratorError::Internal { request_id, .. } => request_id.as_deref(),
        }
    }
}

/// Failure of a single provisioning routine.
///
/// The `Display` text is what ends up in the outcome's failure reason.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RoutineError {
    /// No routine is registered for the tag.
    #[error("unsupported service tag")]
    Unsupported,

    /// The routine reported a failure.
    #[error("{0}")]
    Failed(String),

    /// The routine did not finish before the orchestrator deadline.
    #[error("timeout")]
    Timeout,

    #[error("routine panicked")]
    Panicked,
}

impl RoutineError {
    pub fn failed(reason: impl Into<String>) -> Self {
        RoutineError::Failed(reason.into())
    }
}

/// The final outcome could not be persisted after provisioning completed.
///
/// Non-fatal: the caller still receives the authoritative outcome.
#[derive(Debug, Clone, thiserror::Error)]
#[error("outcome for request {request_id} was not persisted: {message}")]
pub struct PersistenceWarning {
    pub request_id: String,
    pub message: String,
}

impl PersistenceWarning {
    pub(crate) fn new(request_id: &str, reason: impl std::fmt::Display) -> Self {
        Self {
            request_id: request_id.to_string(),
            message: reason.to_string(),
        }
    }
}

/// Startup-time registry construction errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("service tag '{0}' is already registered")]
    DuplicateTag(ServiceTag),

    #[error("cannot alias '{alias}': target tag '{target}' is not registered")]
    UnknownAliasTarget { alias: ServiceTag, target: ServiceTag },
}
