use std::future::Future;

use super::Check;
use crate::{RequestStore, StorageError};

pub(super) async fn run_error_tests<S, F, Fut>(factory: &F) -> Vec<Check>
where
    S: RequestStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.push(Check::new(
        "error",
        "get_nonexistent",
        get_nonexistent(factory).await,
    ));
    results.push(Check::new(
        "error",
        "get_not_found_has_correct_field",
        get_not_found_has_correct_field(factory).await,
    ));

    results
}

// ── 1. get on empty store returns NotFound ────────────────────────────────────

async fn get_nonexistent<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RequestStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    match s.get("req-999").await {
        Err(StorageError::NotFound { .. }) => Ok(()),
        other => Err(format!("expected NotFound, got {:?}", other)),
    }
}

// ── 2. NotFound names the requested id ────────────────────────────────────────

async fn get_not_found_has_correct_field<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RequestStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    match s.get("req-abc").await {
        Err(StorageError::NotFound { request_id }) => {
            if request_id != "req-abc" {
                return Err(format!("expected request_id='req-abc', got '{}'", request_id));
            }
            Ok(())
        }
        other => Err(format!("expected NotFound, got {:?}", other)),
    }
}
