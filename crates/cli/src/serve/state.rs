//! Application state shared across request handlers.

use provisioner_core::{Orchestrator, SecretString};

pub(crate) struct AppState {
    pub(crate) orchestrator: Orchestrator,
    /// Expected API key. None = no auth required.
    pub(crate) api_key: Option<SecretString>,
}
