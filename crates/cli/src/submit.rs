//! `provisioner submit` -- run one provisioning request from the command line.

use anyhow::{anyhow, Context, Result};
use provisioner_core::{Provisioned, ProvisioningRequest};
use serde_json::{Map, Value};

use crate::backend::Backend;

/// Parse `--extra key=value` pairs. The value is taken as JSON when it parses,
/// otherwise as a plain string.
pub(crate) fn parse_extra(pairs: &[String]) -> Result<Map<String, Value>> {
    let mut extra = Map::new();
    for pair in pairs {
        let (key, raw) = pair
            .split_once('=')
            .ok_or_else(|| anyhow!("--extra expects key=value, got '{}'", pair))?;
        if key.is_empty() {
            return Err(anyhow!("--extra key must not be empty in '{}'", pair));
        }
        if key == "services" {
            return Err(anyhow!("use --services to name services"));
        }
        let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
        extra.insert(key.to_string(), value);
    }
    Ok(extra)
}

pub(crate) async fn run_submit(
    backend: &Backend,
    services: &[String],
    extra: &[String],
) -> Result<Provisioned> {
    let request = ProvisioningRequest::new(services.iter().map(String::as_str), parse_extra(extra)?);
    backend
        .orchestrator
        .provision(request)
        .await
        .context("provisioning failed")
}
