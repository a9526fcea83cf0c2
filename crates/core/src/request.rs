//! The inbound provisioning request.

use provisioner_storage::ServiceTag;
use serde_json::{Map, Value};

use crate::error::ValidationError;

/// Immutable input to [`Orchestrator::provision`](crate::Orchestrator::provision).
///
/// `services` keeps the caller's order with duplicates removed (first
/// occurrence wins). `extra` holds every other top-level field of the client
/// payload and is passed through to persistence untouched.
#[derive(Debug, Clone, PartialEq)]
pub struct ProvisioningRequest {
    services: Vec<ServiceTag>,
    extra: Map<String, Value>,
}

impl ProvisioningRequest {
    pub fn new<I, T>(services: I, extra: Map<String, Value>) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<ServiceTag>,
    {
        let mut deduped: Vec<ServiceTag> = Vec::new();
        for tag in services {
            let tag = tag.into();
            if !deduped.contains(&tag) {
                deduped.push(tag);
            }
        }
        Self {
            services: deduped,
            extra,
        }
    }

    /// Build a request from a client JSON body.
    ///
    /// The body must be an object with a `services` array of strings. An empty
    /// array is accepted here and rejected by the orchestrator, so there is one
    /// place that enforces non-emptiness.
    pub fn from_json(body: Value) -> Result<Self, ValidationError> {
        let mut fields = match body {
            Value::Object(map) => map,
            _ => return Err(ValidationError::NotAnObject),
        };

        let services = match fields.remove("services") {
            Some(Value::Array(items)) => items,
            Some(_) => return Err(ValidationError::ServicesNotArray),
            None => return Err(ValidationError::MissingServices),
        };

        let tags = services
            .into_iter()
            .enumerate()
            .map(|(index, item)| match item {
                Value::String(s) => Ok(ServiceTag::from(s)),
                _ => Err(ValidationError::InvalidServiceTag { index }),
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self::new(tags, fields))
    }

    pub fn services(&self) -> &[ServiceTag] {
        &self.services
    }

    pub fn extra(&self) -> &Map<String, Value> {
        &self.extra
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn splits_services_from_extra_fields() {
        let req = ProvisioningRequest::from_json(json!({
            "services": ["object-store", "rest-api"],
            "owner": "team-a",
            "tags": {"env": "dev"}
        }))
        .unwrap();

        assert_eq!(
            req.services(),
            &[ServiceTag::from("object-store"), ServiceTag::from("rest-api")]
        );
        assert_eq!(req.extra().len(), 2);
        assert_eq!(req.extra()["owner"], "team-a");
        assert!(!req.extra().contains_key("services"));
    }

    #[test]
    fn duplicate_tags_collapse_keeping_first_position() {
        let req = ProvisioningRequest::new(["rest-api", "object-store", "rest-api"], Map::new());
        assert_eq!(
            req.services(),
            &[ServiceTag::from("rest-api"), ServiceTag::from("object-store")]
        );
    }

    #[test]
    fn unknown_tags_are_accepted_at_construction() {
        let req = ProvisioningRequest::from_json(json!({"services": ["quantum-db"]})).unwrap();
        assert_eq!(req.services()[0].as_str(), "quantum-db");
    }

    #[test]
    fn empty_services_parse_and_are_left_to_the_orchestrator() {
        let req = ProvisioningRequest::from_json(json!({"services": []})).unwrap();
        assert!(req.services().is_empty());
    }

    #[test]
    fn rejects_malformed_bodies() {
        assert_eq!(
            ProvisioningRequest::from_json(json!(["object-store"])),
            Err(ValidationError::NotAnObject)
        );
        assert_eq!(
            ProvisioningRequest::from_json(json!({"owner": "x"})),
            Err(ValidationError::MissingServices)
        );
        assert_eq!(
            ProvisioningRequest::from_json(json!({"services": "object-store"})),
            Err(ValidationError::ServicesNotArray)
        );
        assert_eq!(
            ProvisioningRequest::from_json(json!({"services": ["object-store", 7]})),
            Err(ValidationError::InvalidServiceTag { index: 1 })
        );
    }
}
