//! HTTP route handlers: health and submit.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use provisioner_core::{OrchestratorError, Provisioned, ProvisioningRequest};
use provisioner_storage::TagResult;
use serde_json::{Map, Value};
use tracing::error;

use super::json_error;
use super::state::AppState;

/// Fallback handler for unmatched routes.
pub(crate) async fn handle_not_found() -> impl IntoResponse {
    json_error(StatusCode::NOT_FOUND, "not found")
}

/// GET /health
pub(crate) async fn handle_health() -> impl IntoResponse {
    let response = serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    });
    (StatusCode::OK, Json(response))
}

/// POST /submit
///
/// The body is read as raw bytes so that malformed JSON is reported as a
/// 400 with the usual `{"error": ...}` shape.
pub(crate) async fn handle_submit(State(state): State<Arc<AppState>>, body: Bytes) -> Response {
    let value: Value = match serde_json::from_slice(&body) {
        Ok(v) => v,
        Err(e) => {
            return json_error(StatusCode::BAD_REQUEST, &format!("invalid JSON body: {}", e))
                .into_response()
        }
    };

    let request = match ProvisioningRequest::from_json(value) {
        Ok(r) => r,
        Err(e) => return json_error(StatusCode::BAD_REQUEST, &e.to_string()).into_response(),
    };

    // Provision on its own task so a dropped connection cannot cancel the
    // outcome write for resources that were already created.
    let orchestrator = state.orchestrator.clone();
    let task = tokio::spawn(async move { orchestrator.provision(request).await });
    let provisioned = match task.await {
        Ok(result) => result,
        Err(e) => {
            error!(error = %e, "Provisioning task failed");
            return json_error(StatusCode::INTERNAL_SERVER_ERROR, "provisioning task failed")
                .into_response();
        }
    };

    match provisioned {
        // A persistence warning was already logged by the orchestrator.
        Ok(provisioned) => (StatusCode::OK, Json(submit_response(&provisioned))).into_response(),
        Err(OrchestratorError::Validation(e)) => {
            json_error(StatusCode::BAD_REQUEST, &e.to_string()).into_response()
        }
        Err(e) => {
            error!(request_id = ?e.request_id(), error = %e, "Provisioning request failed");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string()).into_response()
        }
    }
}

/// Render a completed provisioning as the `/submit` response body.
///
/// Successful handles are flattened into top-level fields. When two handles
/// share a key, the tag listed first in the request keeps it. Failed tags
/// are reported under `errors` as `{tag: reason}`; the field is omitted when
/// every tag succeeded.
pub(crate) fn submit_response(provisioned: &Provisioned) -> Value {
    let mut body = Map::new();
    body.insert(
        "requestId".to_string(),
        Value::String(provisioned.request_id().to_string()),
    );

    let mut errors = Map::new();
    for tag in &provisioned.record.requested_services {
        match provisioned.outcome().get(tag) {
            Some(TagResult::Success { handle }) => {
                for (key, value) in handle {
                    if key == "requestId" || key == "errors" {
                        continue;
                    }
                    body.entry(key.clone())
                        .or_insert_with(|| Value::String(value.clone()));
                }
            }
            Some(TagResult::Failure { reason }) => {
                errors.insert(tag.to_string(), Value::String(reason.clone()));
            }
            None => {}
        }
    }

    if !errors.is_empty() {
        body.insert("errors".to_string(), Value::Object(errors));
    }
    Value::Object(body)
}
