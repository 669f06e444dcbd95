//! Watch orchestrator
//!
//! Owns the Change Detector -> ingestion pass lifecycle for one timing log.
//!
//! States:
//! - `Idle`: no watch
//! - `Watching`: subscribed, waiting for a change signal
//! - `Ingesting`: a pass is running
//!
//! Only one watch is active. Starting a new watch, or calling `stop_watch`,
//! cancels the previous task and waits for it to finish. A fatal detector
//! error (the file vanished) returns to `Idle` and is kept as `last_error`.
//! A failed pass only affects that signal; the watch keeps going.

use crate::services::change_detector::{DetectorError, DetectorEvent, FileChangeDetector};
use crate::services::ingest::{run_pass, PassReport, PipelineContext};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Orchestrator state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WatchState {
    Idle,
    Watching,
    Ingesting,
}

/// Errors surfaced to the caller of `start_watch`
#[derive(Debug, Error)]
pub enum WatchError {
    #[error("cannot watch timing log: {0}")]
    Detector(#[from] DetectorError),
}

/// Acknowledgement returned by `start_watch`
#[derive(Debug, Clone, Serialize)]
pub struct WatchAck {
    pub path: PathBuf,
    pub started_at: DateTime<Utc>,
}

/// Snapshot of the orchestrator for status queries
#[derive(Debug, Clone, Serialize)]
pub struct WatchStatus {
    pub state: WatchState,
    pub path: Option<PathBuf>,
    pub started_at: Option<DateTime<Utc>>,
    pub passes_completed: u64,
    pub passes_failed: u64,
    pub last_pass: Option<PassReport>,
    pub last_error: Option<String>,
}

impl WatchStatus {
    fn idle() -> Self {
        Self {
            state: WatchState::Idle,
            path: None,
            started_at: None,
            passes_completed: 0,
            passes_failed: 0,
            last_pass: None,
            last_error: None,
        }
    }
}

/// Status shared with the watch task, tagged with the watch generation
struct SharedStatus {
    generation: u64,
    status: WatchStatus,
}

struct ActiveWatch {
    cancel: CancellationToken,
    watch_task: JoinHandle<()>,
    detector_task: JoinHandle<()>,
}

/// Starts, stops and reports on the single active watch
#[derive(Clone)]
pub struct WatchOrchestrator {
    ctx: PipelineContext,
    debounce: Duration,
    /// Serializes start/stop calls
    control: Arc<Mutex<Option<ActiveWatch>>>,
    shared: Arc<RwLock<SharedStatus>>,
}

impl WatchOrchestrator {
    pub fn new(ctx: PipelineContext, debounce: Duration) -> Self {
        Self {
            ctx,
            debounce,
            control: Arc::new(Mutex::new(None)),
            shared: Arc::new(RwLock::new(SharedStatus {
                generation: 0,
                status: WatchStatus::idle(),
            })),
        }
    }

    pub fn context(&self) -> &PipelineContext {
        &self.ctx
    }

    pub async fn state(&self) -> WatchState {
        self.shared.read().await.status.state
    }

    pub async fn status(&self) -> WatchStatus {
        self.shared.read().await.status.clone()
    }

    /// Begin watching `path`, replacing any previous watch
    pub async fn start_watch(&self, path: impl AsRef<Path>) -> Result<WatchAck, WatchError> {
        let path = path.as_ref().to_path_buf();
        let mut active = self.control.lock().await;

        if let Some(previous) = active.take() {
            info!("Stopping previous watch before starting a new one");
            shutdown(previous).await;
        }

        let cancel = CancellationToken::new();
        let subscription = match FileChangeDetector::new(&path, self.debounce)
            .subscribe(cancel.child_token())
            .await
        {
            Ok(subscription) => subscription,
            Err(e) => {
                let mut shared = self.shared.write().await;
                shared.generation += 1;
                shared.status = WatchStatus {
                    last_error: Some(e.to_string()),
                    ..WatchStatus::idle()
                };
                return Err(e.into());
            }
        };

        let started_at = Utc::now();
        let generation = {
            let mut shared = self.shared.write().await;
            shared.generation += 1;
            shared.status = WatchStatus {
                state: WatchState::Watching,
                path: Some(path.clone()),
                started_at: Some(started_at),
                ..WatchStatus::idle()
            };
            shared.generation
        };

        info!(path = %path.display(), "Started watching timing log");

        let watch_task = tokio::spawn(watch_loop(
            self.ctx.clone(),
            path.clone(),
            subscription.signals,
            cancel.clone(),
            self.shared.clone(),
            generation,
        ));

        *active = Some(ActiveWatch {
            cancel,
            watch_task,
            detector_task: subscription.handle,
        });

        Ok(WatchAck { path, started_at })
    }

    /// Stop the active watch, if any, and return to `Idle`
    pub async fn stop_watch(&self) {
        let mut active = self.control.lock().await;
        if let Some(previous) = active.take() {
            shutdown(previous).await;
            info!("Stopped watching timing log");
        }

        let mut shared = self.shared.write().await;
        shared.generation += 1;
        let last_error = shared.status.last_error.take();
        shared.status = WatchStatus {
            last_error,
            ..WatchStatus::idle()
        };
    }
}

async fn shutdown(watch: ActiveWatch) {
    watch.cancel.cancel();
    if let Err(e) = watch.watch_task.await {
        warn!(error = %e, "Watch task ended abnormally");
    }
    if let Err(e) = watch.detector_task.await {
        warn!(error = %e, "Change detector task ended abnormally");
    }
}

/// Apply `update` only if the watch generation is still current
async fn update_status<F>(shared: &RwLock<SharedStatus>, generation: u64, update: F)
where
    F: FnOnce(&mut WatchStatus),
{
    let mut shared = shared.write().await;
    if shared.generation == generation {
        update(&mut shared.status);
    }
}

async fn watch_loop(
    ctx: PipelineContext,
    path: PathBuf,
    mut signals: mpsc::UnboundedReceiver<DetectorEvent>,
    cancel: CancellationToken,
    shared: Arc<RwLock<SharedStatus>>,
    generation: u64,
) {
    loop {
        let event = tokio::select! {
            _ = cancel.cancelled() => break,
            event = signals.recv() => event,
        };

        let signal = match event {
            Some(Ok(signal)) => signal,
            Some(Err(e)) => {
                error!(path = %path.display(), error = %e, "Watch failed");
                update_status(&shared, generation, |status| {
                    status.state = WatchState::Idle;
                    status.last_error = Some(e.to_string());
                })
                .await;
                return;
            }
            None => break,
        };

        info!(path = %path.display(), kind = ?signal.kind, "File modified");
        update_status(&shared, generation, |status| {
            status.state = WatchState::Ingesting;
        })
        .await;

        let outcome = tokio::select! {
            _ = cancel.cancelled() => break,
            outcome = run_pass(&ctx, &path) => outcome,
        };

        match outcome {
            Ok(report) => {
                update_status(&shared, generation, |status| {
                    status.state = WatchState::Watching;
                    status.passes_completed += 1;
                    status.last_pass = Some(report);
                })
                .await;
            }
            Err(e) => {
                error!(path = %path.display(), error = %e, "Ingestion pass abandoned");
                update_status(&shared, generation, |status| {
                    status.state = WatchState::Watching;
                    status.passes_failed += 1;
                    status.last_error = Some(e.to_string());
                })
                .await;
            }
        }
    }

    update_status(&shared, generation, |status| {
        status.state = WatchState::Idle;
    })
    .await;
}
