//! Watch orchestrator integration tests
//!
//! Real files in a temp dir, change notifications coalesced over 20 ms.

mod helpers;

use helpers::{create_test_db, write_timing_log};
use livestream_ingest::db;
use livestream_ingest::services::{
    PipelineContext, SheetMirror, WatchError, WatchOrchestrator, WatchState,
};
use sqlx::SqlitePool;
use std::future::Future;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

const TICK: Duration = Duration::from_millis(20);
const WAIT: Duration = Duration::from_secs(10);

fn orchestrator(pool: &SqlitePool) -> WatchOrchestrator {
    let ctx = PipelineContext::new(pool.clone(), Arc::new(SheetMirror::without_client()), 100);
    WatchOrchestrator::new(ctx, TICK)
}

fn append(path: &Path, lines: &[&str]) {
    let mut file = std::fs::OpenOptions::new().append(true).open(path).unwrap();
    for line in lines {
        writeln!(file, "{}", line).unwrap();
    }
    file.sync_all().unwrap();
}

/// Poll `check` until it holds or the wait times out
async fn wait_for<F, Fut>(what: &str, mut check: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + WAIT;
    while !check().await {
        if tokio::time::Instant::now() > deadline {
            panic!("timed out waiting for {}", what);
        }
        tokio::time::sleep(TICK).await;
    }
}

#[tokio::test]
async fn test_start_append_ingest_stop() {
    let (dir, pool) = create_test_db().await.unwrap();
    let log = write_timing_log(dir.path(), &["1\t2024-01-01 10:00:00.000"]);
    let orchestrator = orchestrator(&pool);
    assert_eq!(orchestrator.state().await, WatchState::Idle);

    let ack = orchestrator.start_watch(&log).await.unwrap();
    assert_eq!(ack.path, log);
    assert_eq!(orchestrator.state().await, WatchState::Watching);

    append(
        &log,
        &["2\t2024-01-01 10:00:01.000", "3\t2024-01-01 10:00:02.000"],
    );

    let (db_pool, watcher) = (&pool, &orchestrator);
    wait_for("three stored results", move || async move {
        db::count_results(db_pool).await.unwrap() == 3
    })
    .await;
    wait_for("a completed pass", move || async move {
        watcher.status().await.passes_completed >= 1
    })
    .await;

    let status = orchestrator.status().await;
    assert_eq!(status.path.as_deref(), Some(log.as_path()));
    assert_eq!(status.passes_failed, 0);
    assert!(status.last_pass.is_some());

    orchestrator.stop_watch().await;
    let status = orchestrator.status().await;
    assert_eq!(status.state, WatchState::Idle);
    assert_eq!(status.path, None);
}

#[tokio::test]
async fn test_start_on_missing_path_fails() {
    let (dir, pool) = create_test_db().await.unwrap();
    let orchestrator = orchestrator(&pool);

    let result = orchestrator.start_watch(dir.path().join("nope.txt")).await;
    assert!(matches!(result, Err(WatchError::Detector(_))));

    let status = orchestrator.status().await;
    assert_eq!(status.state, WatchState::Idle);
    assert!(status.last_error.is_some());
}

#[tokio::test]
async fn test_restart_replaces_previous_watch() {
    let (dir, pool) = create_test_db().await.unwrap();
    let first = dir.path().join("first.txt");
    let second = dir.path().join("second.txt");
    std::fs::write(&first, "").unwrap();
    std::fs::write(&second, "").unwrap();
    let orchestrator = orchestrator(&pool);

    orchestrator.start_watch(&first).await.unwrap();
    orchestrator.start_watch(&second).await.unwrap();
    assert_eq!(
        orchestrator.status().await.path.as_deref(),
        Some(second.as_path())
    );

    append(&second, &["8\t2024-01-01 11:00:00.000"]);
    let db_pool = &pool;
    wait_for("result from the second log", move || async move {
        db::count_results(db_pool).await.unwrap() == 1
    })
    .await;

    orchestrator.stop_watch().await;
    assert_eq!(orchestrator.state().await, WatchState::Idle);
}

#[tokio::test]
async fn test_removed_file_returns_to_idle_with_error() {
    let (dir, pool) = create_test_db().await.unwrap();
    let log = write_timing_log(dir.path(), &["1\t2024-01-01 10:00:00.000"]);
    let orchestrator = orchestrator(&pool);

    orchestrator.start_watch(&log).await.unwrap();
    std::fs::remove_file(&log).unwrap();

    let watcher = &orchestrator;
    wait_for("idle after removal", move || async move {
        watcher.state().await == WatchState::Idle
    })
    .await;
    let status = orchestrator.status().await;
    assert!(status
        .last_error
        .as_deref()
        .is_some_and(|e| e.contains("removed")));

    // Stopping an already failed watch keeps the error for diagnostics
    orchestrator.stop_watch().await;
    assert!(orchestrator.status().await.last_error.is_some());
}

#[tokio::test]
async fn test_stop_without_watch_is_noop() {
    let (_dir, pool) = create_test_db().await.unwrap();
    let orchestrator = orchestrator(&pool);
    orchestrator.stop_watch().await;
    assert_eq!(orchestrator.state().await, WatchState::Idle);
}
