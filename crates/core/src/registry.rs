//! Service provisioner registry: the dispatch table from service tag to
//! provisioning routine.
//!
//! Built once at startup through [`ServiceRegistryBuilder`] and immutable
//! afterwards. Adding a provisionable service type means registering a new
//! routine, not editing the orchestrator.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use provisioner_storage::{ResourceHandle, ServiceTag};
use serde_json::{Map, Value};

use crate::error::{RegistryError, RoutineError};

// ──────────────────────────────────────────────
// ServiceRoutine trait
// ──────────────────────────────────────────────

/// Performs one concrete external side effect for one service tag.
///
/// Implementations must be safe to call concurrently for different requests.
/// They need not enforce their own timeout; the orchestrator bounds every call
/// and drops the future when the deadline passes.
#[async_trait]
pub trait ServiceRoutine: Send + Sync {
    /// Create the resource for `request_id` and describe it.
    async fn provision(
        &self,
        request_id: &str,
        extra: &Map<String, Value>,
    ) -> Result<ResourceHandle, RoutineError>;

    /// Returns this routine's identifier (e.g. "s3-bucket", "dry-run").
    fn routine_id(&self) -> &str;

    /// The exact external actions this routine performs, e.g.
    /// `["s3:CreateBucket"]`. Used to derive a least-privilege policy.
    fn permissions(&self) -> &'static [&'static str] {
        &[]
    }
}

// ──────────────────────────────────────────────
// ServiceRegistry
// ──────────────────────────────────────────────

/// Immutable mapping from [`ServiceTag`] to routine.
#[derive(Clone, Default)]
pub struct ServiceRegistry {
    routines: HashMap<ServiceTag, Arc<dyn ServiceRoutine>>,
    /// alias -> canonical tag
    aliases: HashMap<ServiceTag, ServiceTag>,
}

impl ServiceRegistry {
    pub fn builder() -> ServiceRegistryBuilder {
        ServiceRegistryBuilder::default()
    }

    /// Create an empty registry (every tag is unsupported).
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn lookup(&self, tag: &ServiceTag) -> Option<Arc<dyn ServiceRoutine>> {
        self.routines.get(tag).cloned()
    }

    pub fn contains(&self, tag: &ServiceTag) -> bool {
        self.routines.contains_key(tag)
    }

    /// The tag `tag` was registered under, following aliases. Unknown tags
    /// map to themselves.
    pub fn canonical<'a>(&'a self, tag: &'a ServiceTag) -> &'a ServiceTag {
        self.aliases.get(tag).unwrap_or(tag)
    }

    /// Tags registered directly (no aliases), sorted.
    pub fn canonical_tags(&self) -> Vec<&ServiceTag> {
        let mut tags: Vec<&ServiceTag> = self
            .routines
            .keys()
            .filter(|t| !self.aliases.contains_key(*t))
            .collect();
        tags.sort();
        tags
    }

    /// Registered tags (aliases included), sorted.
    pub fn tags(&self) -> Vec<&ServiceTag> {
        let mut tags: Vec<&ServiceTag> = self.routines.keys().collect();
        tags.sort();
        tags
    }

    /// Union of the actions declared by every registered routine.
    pub fn permissions(&self) -> BTreeSet<&'static str> {
        self.routines
            .values()
            .flat_map(|r| r.permissions().iter().copied())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.routines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routines.is_empty()
    }
}

impl std::fmt::Debug for ServiceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let entries: Vec<(&str, &str)> = self
            .tags()
            .into_iter()
            .filter_map(|t| self.routines.get(t).map(|r| (t.as_str(), r.routine_id())))
            .collect();
        f.debug_struct("ServiceRegistry")
            .field("routines", &entries)
            .finish()
    }
}

/// Collects tag/routine pairs before the registry is frozen.
#[derive(Default)]
pub struct ServiceRegistryBuilder {
    routines: HashMap<ServiceTag, Arc<dyn ServiceRoutine>>,
    aliases: HashMap<ServiceTag, ServiceTag>,
}

impl ServiceRegistryBuilder {
    /// Register `routine` under `tag`. Each tag may be registered once.
    pub fn register(
        &mut self,
        tag: impl Into<ServiceTag>,
        routine: Arc<dyn ServiceRoutine>,
    ) -> Result<&mut Self, RegistryError> {
        let tag = tag.into();
        if self.routines.contains_key(&tag) {
            return Err(RegistryError::DuplicateTag(tag));
        }
        self.routines.insert(tag, routine);
        Ok(self)
    }

    /// Make `alias` resolve to the routine already registered under `target`.
    pub fn alias(
        &mut self,
        alias: impl Into<ServiceTag>,
        target: impl Into<ServiceTag>,
    ) -> Result<&mut Self, RegistryError> {
        let alias = alias.into();
        let target = target.into();
        let routine = match self.routines.get(&target) {
            Some(r) => r.clone(),
            None => return Err(RegistryError::UnknownAliasTarget { alias, target }),
        };
        let canonical = self.aliases.get(&target).cloned().unwrap_or(target);
        self.register(alias.clone(), routine)?;
        self.aliases.insert(alias, canonical);
        Ok(self)
    }

    pub fn build(self) -> ServiceRegistry {
        ServiceRegistry {
            routines: self.routines,
            aliases: self.aliases,
        }
    }
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────
