use std::future::Future;

use super::{make_record, Check};
use crate::{RequestStore, StorageError};

pub(super) async fn run_put_tests<S, F, Fut>(factory: &F) -> Vec<Check>
where
    S: RequestStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.push(Check::new(
        "put",
        "put_then_get_roundtrips_intent",
        put_then_get_roundtrips_intent(factory).await,
    ));
    results.push(Check::new(
        "put",
        "put_preserves_service_order",
        put_preserves_service_order(factory).await,
    ));
    results.push(Check::new(
        "put",
        "double_put_returns_already_exists",
        double_put_returns_already_exists(factory).await,
    ));
    results.push(Check::new(
        "put",
        "double_put_keeps_first_record",
        double_put_keeps_first_record(factory).await,
    ));
    results.push(Check::new(
        "put",
        "different_ids_are_independent",
        different_ids_are_independent(factory).await,
    ));

    results
}

// ── Test implementations ──────────────────────────────────────────────────────

/// A stored intent reads back identical, with no outcome attached.
async fn put_then_get_roundtrips_intent<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RequestStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let record = make_record("req-1", &["object-store", "rest-api"]);
    s.put(&record).await.map_err(|e| e.to_string())?;

    let read = s.get("req-1").await.map_err(|e| e.to_string())?;
    if read != record {
        return Err(format!("expected {:?}, got {:?}", record, read));
    }
    if read.outcome.is_some() || read.completed_at.is_some() {
        return Err("fresh intent record must not carry an outcome".to_string());
    }
    Ok(())
}

async fn put_preserves_service_order<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RequestStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let record = make_record("req-1", &["rest-api", "object-store", "queue"]);
    s.put(&record).await.map_err(|e| e.to_string())?;

    let read = s.get("req-1").await.map_err(|e| e.to_string())?;
    let order: Vec<&str> = read.requested_services.iter().map(|t| t.as_str()).collect();
    if order != ["rest-api", "object-store", "queue"] {
        return Err(format!("service order changed: {:?}", order));
    }
    Ok(())
}

async fn double_put_returns_already_exists<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RequestStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let record = make_record("req-1", &["object-store"]);
    s.put(&record).await.map_err(|e| e.to_string())?;

    match s.put(&record).await {
        Err(StorageError::AlreadyExists { request_id }) if request_id == "req-1" => Ok(()),
        Err(StorageError::AlreadyExists { request_id }) => {
            Err(format!("wrong request_id in error: {}", request_id))
        }
        other => Err(format!("expected AlreadyExists, got {:?}", other)),
    }
}

/// A rejected second put must leave the stored payload untouched.
async fn double_put_keeps_first_record<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RequestStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let first = make_record("req-1", &["object-store"]);
    s.put(&first).await.map_err(|e| e.to_string())?;

    let second = make_record("req-1", &["rest-api"]);
    let _ = s.put(&second).await;

    let read = s.get("req-1").await.map_err(|e| e.to_string())?;
    if read != first {
        return Err(format!("record overwritten: {:?}", read));
    }
    Ok(())
}

async fn different_ids_are_independent<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RequestStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    s.put(&make_record("req-1", &["object-store"]))
        .await
        .map_err(|e| e.to_string())?;
    s.put(&make_record("req-2", &["rest-api"]))
        .await
        .map_err(|e| e.to_string())?;

    let a = s.get("req-1").await.map_err(|e| e.to_string())?;
    let b = s.get("req-2").await.map_err(|e| e.to_string())?;
    if a.requested_services[0].as_str() != "object-store"
        || b.requested_services[0].as_str() != "rest-api"
    {
        return Err("records for different ids interfered".to_string());
    }
    Ok(())
}
