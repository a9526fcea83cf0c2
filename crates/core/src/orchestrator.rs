//! The provisioning orchestrator.
//!
//! One call to [`Orchestrator::provision`] handles one request:
//!
//! 1. reject an empty service list (no side effects)
//! 2. generate a fresh request id (UUID v4)
//! 3. persist the intent record before any routine runs
//! 4. run every distinct routine concurrently; aliases of one tag share a run
//! 5. attach the outcome and persist it; a failed write becomes a
//!    [`PersistenceWarning`], not an error
//!
//! All steps share one deadline, so a stalled store or routine cannot hold the
//! invocation past the configured timeout. A tag's failure, timeout, or panic
//! only affects that tag's entry.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use provisioner_storage::{
    ProvisioningOutcome, ProvisioningRecord, RequestStore, ServiceTag, TagResult,
};
use serde_json::{Map, Value};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::error::{OrchestratorError, PersistenceWarning, RoutineError, ValidationError};
use crate::registry::ServiceRegistry;
use crate::request::ProvisioningRequest;

/// Default bound on a provisioning invocation: two minutes.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// Result of a completed provisioning call.
#[derive(Debug, Clone)]
pub struct Provisioned {
    /// The record with its outcome attached.
    pub record: ProvisioningRecord,
    /// Set when the final outcome could not be written back to the store.
    pub warning: Option<PersistenceWarning>,
    outcome: ProvisioningOutcome,
}

impl Provisioned {
    pub fn request_id(&self) -> &str {
        &self.record.request_id
    }

    pub fn outcome(&self) -> &ProvisioningOutcome {
        &self.outcome
    }
}

/// Accepts provisioning requests and drives them to a recorded outcome.
#[derive(Clone)]
pub struct Orchestrator {
    registry: Arc<ServiceRegistry>,
    store: Arc<dyn RequestStore>,
    timeout: Duration,
}

impl Orchestrator {
    pub fn new(registry: ServiceRegistry, store: Arc<dyn RequestStore>) -> Self {
        Self {
            registry: Arc::new(registry),
            store,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Override the per-invocation deadline.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn registry(&self) -> &ServiceRegistry {
        &self.registry
    }

    pub fn store(&self) -> &Arc<dyn RequestStore> {
        &self.store
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub async fn provision(
        &self,
        request: ProvisioningRequest,
    ) -> Result<Provisioned, OrchestratorError> {
        if request.services().is_empty() {
            return Err(ValidationError::EmptyServices.into());
        }

        let deadline = Instant::now() + self.timeout;
        let request_id = Uuid::new_v4().to_string();
        let mut record = ProvisioningRecord {
            request_id: request_id.clone(),
            requested_services: request.services().to_vec(),
            extra: request.extra().clone(),
            created_at: crate::now_rfc3339(),
            completed_at: None,
            outcome: None,
        };

        let written = match tokio::time::timeout_at(deadline, self.store.put(&record)).await {
            Ok(result) => result.map_err(|e| e.to_string()),
            Err(_) => Err("timed out".to_string()),
        };
        if let Err(reason) = written {
            error!(request_id = %request_id, error = %reason, "Failed to record provisioning request");
            return Err(OrchestratorError::Internal {
                request_id: Some(request_id),
                message: format!("failed to record request: {}", reason),
            });
        }
        info!(
            request_id = %request_id,
            services = ?request.services(),
            "Recorded provisioning request"
        );

        // Routines stop early enough to leave a tenth of the budget for the
        // outcome write.
        let routines_deadline = deadline - self.timeout / 10;
        let outcome = self
            .dispatch(&request_id, &request, routines_deadline)
            .await;
        let completed_at = crate::now_rfc3339();

        let written = tokio::time::timeout_at(
            deadline,
            self.store
                .record_outcome(&request_id, &outcome, &completed_at),
        )
        .await;
        let warning = match written {
            Ok(Ok(())) => None,
            Ok(Err(e)) => Some(PersistenceWarning::new(&request_id, e)),
            Err(_) => Some(PersistenceWarning::new(&request_id, "timed out")),
        };
        if let Some(w) = &warning {
            warn!(request_id = %request_id, error = %w.message, "Provisioning outcome not persisted");
        }

        let failed = outcome.failures().count();
        info!(
            request_id = %request_id,
            succeeded = outcome.len() - failed,
            failed,
            "Provisioning finished"
        );

        record.outcome = Some(outcome.clone());
        record.completed_at = Some(completed_at);
        Ok(Provisioned {
            record,
            warning,
            outcome,
        })
    }

    /// Run each distinct routine once and record its result under every
    /// requested tag that resolves to it.
    async fn dispatch(
        &self,
        request_id: &str,
        request: &ProvisioningRequest,
        deadline: Instant,
    ) -> ProvisioningOutcome {
        let extra: Arc<Map<String, Value>> = Arc::new(request.extra().clone());
        let mut outcome = ProvisioningOutcome::new();
        let mut pending: Vec<(ServiceTag, Vec<ServiceTag>, JoinHandle<_>)> = Vec::new();
        let mut by_canonical: HashMap<ServiceTag, usize> = HashMap::new();

        for tag in request.services() {
            let routine = match self.registry.lookup(tag) {
                Some(r) => r,
                None => {
                    warn!(request_id = %request_id, tag = %tag, "Unsupported service tag");
                    outcome.insert(
                        tag.clone(),
                        TagResult::failure(RoutineError::Unsupported.to_string()),
                    );
                    continue;
                }
            };

            let canonical = self.registry.canonical(tag);
            if let Some(&i) = by_canonical.get(canonical) {
                debug!(request_id = %request_id, tag = %tag, canonical = %canonical, "Sharing routine result");
                pending[i].1.push(tag.clone());
                continue;
            }

            debug!(
                request_id = %request_id,
                tag = %tag,
                routine = routine.routine_id(),
                "Dispatching routine"
            );
            let id = request_id.to_string();
            let extra = Arc::clone(&extra);
            let handle = tokio::spawn(async move {
                match tokio::time::timeout_at(deadline, routine.provision(&id, &extra)).await {
                    Ok(result) => result,
                    Err(_) => Err(RoutineError::Timeout),
                }
            });
            by_canonical.insert(canonical.clone(), pending.len());
            pending.push((canonical.clone(), vec![tag.clone()], handle));
        }

        for (canonical, tags, handle) in pending {
            let result = match handle.await {
                Ok(result) => result,
                Err(e) => {
                    error!(request_id = %request_id, tag = %canonical, error = %e, "Routine task failed");
                    Err(RoutineError::Panicked)
                }
            };

            let tag_result = match result {
                Ok(handle) => {
                    info!(request_id = %request_id, tag = %canonical, handle = ?handle, "Provisioned");
                    TagResult::Success { handle }
                }
                Err(e) => {
                    warn!(request_id = %request_id, tag = %canonical, reason = %e, "Provisioning failed");
                    TagResult::failure(e.to_string())
                }
            };
            for tag in tags {
                outcome.insert(tag, tag_result.clone());
            }
        }

        outcome
    }
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("registry", &self.registry)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────
