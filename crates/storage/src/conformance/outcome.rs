use std::future::Future;

use super::{make_outcome, make_record, Check};
use crate::{RequestStore, StorageError};

pub(super) async fn run_outcome_tests<S, F, Fut>(factory: &F) -> Vec<Check>
where
    S: RequestStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.push(Check::new(
        "outcome",
        "record_outcome_attaches_outcome",
        record_outcome_attaches_outcome(factory).await,
    ));
    results.push(Check::new(
        "outcome",
        "record_outcome_keeps_intent_fields",
        record_outcome_keeps_intent_fields(factory).await,
    ));
    results.push(Check::new(
        "outcome",
        "second_outcome_is_rejected",
        second_outcome_is_rejected(factory).await,
    ));
    results.push(Check::new(
        "outcome",
        "outcome_on_missing_record_is_not_found",
        outcome_on_missing_record_is_not_found(factory).await,
    ));

    results
}

async fn record_outcome_attaches_outcome<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RequestStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    s.put(&make_record("req-1", &["object-store", "rest-api"]))
        .await
        .map_err(|e| e.to_string())?;

    let outcome = make_outcome("object-store", "rest-api");
    s.record_outcome("req-1", &outcome, "2025-01-01T00:01:00Z")
        .await
        .map_err(|e| e.to_string())?;

    let read = s.get("req-1").await.map_err(|e| e.to_string())?;
    if read.outcome.as_ref() != Some(&outcome) {
        return Err(format!("expected outcome {:?}, got {:?}", outcome, read.outcome));
    }
    if read.completed_at.as_deref() != Some("2025-01-01T00:01:00Z") {
        return Err(format!("unexpected completed_at {:?}", read.completed_at));
    }
    Ok(())
}

/// Attaching the outcome must not touch services, extra or created_at.
async fn record_outcome_keeps_intent_fields<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RequestStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let intent = make_record("req-1", &["object-store", "rest-api"]);
    s.put(&intent).await.map_err(|e| e.to_string())?;
    s.record_outcome(
        "req-1",
        &make_outcome("object-store", "rest-api"),
        "2025-01-01T00:01:00Z",
    )
    .await
    .map_err(|e| e.to_string())?;

    let read = s.get("req-1").await.map_err(|e| e.to_string())?;
    if read.requested_services != intent.requested_services
        || read.extra != intent.extra
        || read.created_at != intent.created_at
    {
        return Err(format!("intent fields changed: {:?}", read));
    }
    Ok(())
}

async fn second_outcome_is_rejected<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RequestStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    s.put(&make_record("req-1", &["object-store", "rest-api"]))
        .await
        .map_err(|e| e.to_string())?;
    let first = make_outcome("object-store", "rest-api");
    s.record_outcome("req-1", &first, "2025-01-01T00:01:00Z")
        .await
        .map_err(|e| e.to_string())?;

    let second = make_outcome("rest-api", "object-store");
    match s
        .record_outcome("req-1", &second, "2025-01-01T00:02:00Z")
        .await
    {
        Err(StorageError::OutcomeAlreadyRecorded { request_id }) if request_id == "req-1" => {}
        other => return Err(format!("expected OutcomeAlreadyRecorded, got {:?}", other)),
    }

    let read = s.get("req-1").await.map_err(|e| e.to_string())?;
    if read.outcome.as_ref() != Some(&first) {
        return Err("first outcome was overwritten".to_string());
    }
    Ok(())
}

async fn outcome_on_missing_record_is_not_found<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RequestStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let result = s
        .record_outcome(
            "req-404",
            &make_outcome("object-store", "rest-api"),
            "2025-01-01T00:01:00Z",
        )
        .await;
    match result {
        Err(StorageError::NotFound { request_id }) if request_id == "req-404" => {}
        other => return Err(format!("expected NotFound, got {:?}", other)),
    }

    // The failed update must not have created a record as a side effect.
    match s.get("req-404").await {
        Err(StorageError::NotFound { .. }) => Ok(()),
        other => Err(format!("expected NotFound on read-back, got {:?}", other)),
    }
}
