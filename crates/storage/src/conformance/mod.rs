//! Conformance test suite for `RequestStore` implementations.
//!
//! This module provides a backend-agnostic test suite that any `RequestStore`
//! implementation can run to verify correctness. The suite covers:
//!
//! - **Put**: intent records are readable back unchanged
//! - **Write-once**: a second `put` for the same id is rejected
//! - **Outcome**: outcomes attach once, only to existing records
//! - **Errors**: correct error variants and fields
//! - **Concurrency**: distinct ids never interfere; same-id races have one winner
//!
//! # Usage
//!
//! Backend crates call [`run_conformance_suite`] with a factory function that
//! creates a fresh, empty storage instance for each test:
//!
//! ```ignore
//! use provisioner_storage::conformance::run_conformance_suite;
//!
//! #[tokio::test]
//! async fn dynamodb_conformance() {
//!     let report = run_conformance_suite(|| async {
//!         create_test_table_store().await
//!     }).await;
//!     assert!(report.is_conformant(), "{report}");
//! }
//! ```

mod concurrent;
mod error;
mod outcome;
mod put;

use std::fmt;
use std::future::Future;

use crate::record::{ProvisioningOutcome, ProvisioningRecord, ServiceTag, TagResult};
use crate::RequestStore;

/// One conformance check and, if it failed, why.
#[derive(Debug, Clone)]
pub struct Check {
    /// Area of the contract exercised, e.g. "put" or "outcome".
    pub group: &'static str,
    pub name: &'static str,
    pub failure: Option<String>,
}

impl Check {
    fn new(group: &'static str, name: &'static str, result: Result<(), String>) -> Self {
        Self {
            group,
            name,
            failure: result.err(),
        }
    }

    pub fn passed(&self) -> bool {
        self.failure.is_none()
    }
}

/// Every check from one suite run, in execution order.
#[derive(Debug, Clone, Default)]
pub struct ConformanceReport {
    pub checks: Vec<Check>,
}

impl ConformanceReport {
    pub fn is_conformant(&self) -> bool {
        self.checks.iter().all(Check::passed)
    }

    pub fn failures(&self) -> impl Iterator<Item = &Check> {
        self.checks.iter().filter(|c| !c.passed())
    }

    pub fn len(&self) -> usize {
        self.checks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.checks.is_empty()
    }
}

/// One line per group with its pass count, followed by each failing check.
impl fmt::Display for ConformanceReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "RequestStore conformance: {} checks, {} failing",
            self.len(),
            self.failures().count()
        )?;
        let mut groups: Vec<&str> = Vec::new();
        for check in &self.checks {
            if !groups.contains(&check.group) {
                groups.push(check.group);
            }
        }
        for group in groups {
            let in_group: Vec<&Check> = self.checks.iter().filter(|c| c.group == group).collect();
            let ok = in_group.iter().filter(|c| c.passed()).count();
            writeln!(f, "  {:<12}{}/{}", group, ok, in_group.len())?;
            for check in in_group.iter().filter(|c| !c.passed()) {
                writeln!(
                    f,
                    "    x {}: {}",
                    check.name,
                    check.failure.as_deref().unwrap_or_default()
                )?;
            }
        }
        Ok(())
    }
}

/// Run the full conformance suite against a storage backend.
///
/// `factory` is called once per check and must return a fresh, empty store.
pub async fn run_conformance_suite<S, F, Fut>(factory: F) -> ConformanceReport
where
    S: RequestStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut checks = Vec::new();
    checks.extend(put::run_put_tests(&factory).await);
    checks.extend(outcome::run_outcome_tests(&factory).await);
    checks.extend(error::run_error_tests(&factory).await);
    checks.extend(concurrent::run_concurrent_tests(&factory).await);
    ConformanceReport { checks }
}

// ── Helpers: record constructors with sensible defaults ──────────────────────

fn make_record(request_id: &str, services: &[&str]) -> ProvisioningRecord {
    let mut extra = serde_json::Map::new();
    extra.insert("owner".to_string(), serde_json::json!("team-a"));
    extra.insert("nested".to_string(), serde_json::json!({"k": [1, 2, 3]}));
    ProvisioningRecord {
        request_id: request_id.to_string(),
        requested_services: services.iter().map(|s| ServiceTag::from(*s)).collect(),
        extra,
        created_at: "2025-01-01T00:00:00Z".to_string(),
        completed_at: None,
        outcome: None,
    }
}

fn make_outcome(success_tag: &str, failure_tag: &str) -> ProvisioningOutcome {
    let mut outcome = ProvisioningOutcome::new();
    outcome.insert(
        success_tag.into(),
        TagResult::Success {
            handle: [("s3Bucket".to_string(), "demo-bucket-x".to_string())]
                .into_iter()
                .collect(),
        },
    );
    outcome.insert(failure_tag.into(), TagResult::failure("timeout"));
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_groups_checks_and_lists_failures() {
        let report = ConformanceReport {
            checks: vec![
                Check::new("put", "put_then_get_roundtrips_intent", Ok(())),
                Check::new("put", "double_put_returns_already_exists", Ok(())),
                Check::new(
                    "outcome",
                    "outcome_is_write_once",
                    Err("second outcome accepted".to_string()),
                ),
            ],
        };

        assert!(!report.is_conformant());
        assert_eq!(report.failures().count(), 1);
        assert_eq!(
            report.to_string(),
            "RequestStore conformance: 3 checks, 1 failing\n\
             \x20 put         2/2\n\
             \x20 outcome     0/1\n\
             \x20   x outcome_is_write_once: second outcome accepted\n"
        );
    }
}
