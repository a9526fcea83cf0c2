use std::future::Future;
use std::sync::Arc;

use super::{make_outcome, make_record, Check};
use crate::{RequestStore, StorageError};

/// Number of concurrent tasks to spawn in each test.
const N: usize = 10;

pub(super) async fn run_concurrent_tests<S, F, Fut>(factory: &F) -> Vec<Check>
where
    S: RequestStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.push(Check::new(
        "concurrent",
        "concurrent_puts_distinct_ids_all_succeed",
        concurrent_puts_distinct_ids_all_succeed(factory).await,
    ));
    results.push(Check::new(
        "concurrent",
        "concurrent_puts_same_id_exactly_one_wins",
        concurrent_puts_same_id_exactly_one_wins(factory).await,
    ));
    results.push(Check::new(
        "concurrent",
        "concurrent_outcomes_same_id_exactly_one_wins",
        concurrent_outcomes_same_id_exactly_one_wins(factory).await,
    ));

    results
}

// ── Distinct ids: no coordination needed ────────────────────────────────────

/// N tasks each write their own record. Every write succeeds and every record
/// is readable afterwards.
async fn concurrent_puts_distinct_ids_all_succeed<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RequestStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = Arc::new(factory().await);

    let mut handles = Vec::new();
    for i in 0..N {
        let s = storage.clone();
        handles.push(tokio::spawn(async move {
            let id = format!("req-{i}");
            s.put(&make_record(&id, &["object-store"])).await?;
            s.record_outcome(
                &id,
                &make_outcome("object-store", "rest-api"),
                "2025-01-01T00:01:00Z",
            )
            .await
        }));
    }

    for handle in handles {
        handle
            .await
            .map_err(|e| format!("task panic: {e}"))?
            .map_err(|e: StorageError| format!("storage error: {e}"))?;
    }

    for i in 0..N {
        let rec = storage
            .get(&format!("req-{i}"))
            .await
            .map_err(|e| format!("read req-{i}: {e}"))?;
        if rec.outcome.is_none() {
            return Err(format!("req-{i} lost its outcome"));
        }
    }
    Ok(())
}

// ── Same id: write-once under contention ────────────────────────────────────

async fn concurrent_puts_same_id_exactly_one_wins<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RequestStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = Arc::new(factory().await);

    let mut handles = Vec::new();
    for _ in 0..N {
        let s = storage.clone();
        handles.push(tokio::spawn(async move {
            match s.put(&make_record("req-shared", &["object-store"])).await {
                Ok(()) => Ok(true),
                Err(StorageError::AlreadyExists { .. }) => Ok(false),
                Err(e) => Err(e),
            }
        }));
    }

    let mut winners = 0usize;
    for handle in handles {
        let won = handle
            .await
            .map_err(|e| format!("task panic: {e}"))?
            .map_err(|e: StorageError| format!("storage error: {e}"))?;
        if won {
            winners += 1;
        }
    }

    if winners != 1 {
        return Err(format!("expected exactly 1 winner, got {winners}"));
    }
    Ok(())
}

async fn concurrent_outcomes_same_id_exactly_one_wins<S, F, Fut>(
    factory: &F,
) -> Result<(), String>
where
    S: RequestStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = Arc::new(factory().await);
    storage
        .put(&make_record("req-shared", &["object-store", "rest-api"]))
        .await
        .map_err(|e| format!("put: {e}"))?;

    let mut handles = Vec::new();
    for i in 0..N {
        let s = storage.clone();
        handles.push(tokio::spawn(async move {
            let result = s
                .record_outcome(
                    "req-shared",
                    &make_outcome("object-store", "rest-api"),
                    &format!("2025-01-01T00:{:02}:00Z", i),
                )
                .await;
            match result {
                Ok(()) => Ok(true),
                Err(StorageError::OutcomeAlreadyRecorded { .. }) => Ok(false),
                Err(e) => Err(e),
            }
        }));
    }

    let mut winners = 0usize;
    for handle in handles {
        let won = handle
            .await
            .map_err(|e| format!("task panic: {e}"))?
            .map_err(|e: StorageError| format!("storage error: {e}"))?;
        if won {
            winners += 1;
        }
    }

    if winners != 1 {
        return Err(format!("expected exactly 1 winner, got {winners}"));
    }
    Ok(())
}
