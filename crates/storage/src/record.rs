use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier naming a provisionable capability (e.g. `object-store`).
///
/// Any string is a syntactically valid tag. Whether a tag is *supported* is
/// decided by the service registry at dispatch time, not here.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ServiceTag(String);

impl ServiceTag {
    pub fn new(tag: impl Into<String>) -> Self {
        ServiceTag(tag.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ServiceTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ServiceTag {
    fn from(s: &str) -> Self {
        ServiceTag(s.to_string())
    }
}

impl From<String> for ServiceTag {
    fn from(s: String) -> Self {
        ServiceTag(s)
    }
}

/// Opaque key/value description of a provisioned resource, e.g.
/// `{"s3Bucket": "demo-bucket-<id>"}`.
pub type ResourceHandle = BTreeMap<String, String>;

/// Result of provisioning a single service tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum TagResult {
    Success { handle: ResourceHandle },
    Failure { reason: String },
}

impl TagResult {
    pub fn failure(reason: impl Into<String>) -> Self {
        TagResult::Failure {
            reason: reason.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, TagResult::Success { .. })
    }
}

/// Per-tag aggregation of provisioning results for one request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProvisioningOutcome(BTreeMap<ServiceTag, TagResult>);

impl ProvisioningOutcome {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the result for `tag`. Returns the previous result, if any.
    pub fn insert(&mut self, tag: ServiceTag, result: TagResult) -> Option<TagResult> {
        self.0.insert(tag, result)
    }

    pub fn get(&self, tag: &ServiceTag) -> Option<&TagResult> {
        self.0.get(tag)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ServiceTag, &TagResult)> {
        self.0.iter()
    }

    pub fn tags(&self) -> impl Iterator<Item = &ServiceTag> {
        self.0.keys()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// True when the outcome holds exactly one entry per requested tag and
    /// nothing else.
    pub fn covers_exactly(&self, requested: &[ServiceTag]) -> bool {
        self.0.len() == requested.len() && requested.iter().all(|t| self.0.contains_key(t))
    }

    pub fn failures(&self) -> impl Iterator<Item = (&ServiceTag, &str)> {
        self.0.iter().filter_map(|(tag, r)| match r {
            TagResult::Failure { reason } => Some((tag, reason.as_str())),
            TagResult::Success { .. } => None,
        })
    }
}

/// The persisted entity for one provisioning request, keyed by `request_id`.
///
/// Written once with `outcome = None` before any routine runs; the outcome
/// (and `completed_at`) is attached once provisioning finishes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProvisioningRecord {
    pub request_id: String,
    pub requested_services: Vec<ServiceTag>,
    #[serde(default)]
    pub extra: serde_json::Map<String, serde_json::Value>,
    /// RFC 3339 timestamp string.
    pub created_at: String,
    /// RFC 3339 timestamp string. None until the outcome is attached.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outcome: Option<ProvisioningOutcome>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_result_serializes_with_status_discriminator() {
        let ok = TagResult::Success {
            handle: [("s3Bucket".to_string(), "demo-bucket-1".to_string())]
                .into_iter()
                .collect(),
        };
        assert_eq!(
            serde_json::to_value(&ok).unwrap(),
            serde_json::json!({"status": "success", "handle": {"s3Bucket": "demo-bucket-1"}})
        );
        assert_eq!(
            serde_json::to_value(TagResult::failure("timeout")).unwrap(),
            serde_json::json!({"status": "failure", "reason": "timeout"})
        );
    }

    #[test]
    fn outcome_is_a_plain_json_object_keyed_by_tag() {
        let mut outcome = ProvisioningOutcome::new();
        outcome.insert("rest-api".into(), TagResult::failure("boom"));
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["rest-api"]["reason"], "boom");

        let back: ProvisioningOutcome = serde_json::from_value(json).unwrap();
        assert_eq!(back, outcome);
    }

    #[test]
    fn covers_exactly_rejects_missing_and_extra_tags() {
        let mut outcome = ProvisioningOutcome::new();
        outcome.insert("a".into(), TagResult::failure("x"));
        outcome.insert("b".into(), TagResult::failure("y"));

        assert!(outcome.covers_exactly(&["a".into(), "b".into()]));
        assert!(!outcome.covers_exactly(&["a".into()]));
        assert!(!outcome.covers_exactly(&["a".into(), "b".into(), "c".into()]));
        assert!(!outcome.covers_exactly(&["a".into(), "c".into()]));
    }

    #[test]
    fn record_uses_camel_case_and_omits_missing_outcome() {
        let record = ProvisioningRecord {
            request_id: "r-1".to_string(),
            requested_services: vec!["object-store".into()],
            extra: serde_json::Map::new(),
            created_at: "2025-01-01T00:00:00Z".to_string(),
            completed_at: None,
            outcome: None,
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["requestId"], "r-1");
        assert_eq!(json["requestedServices"], serde_json::json!(["object-store"]));
        assert!(json.get("outcome").is_none());
        assert!(json.get("completedAt").is_none());
    }
}
