//! Ingestion pass
//!
//! One pass reads the timing log, parses every line, resolves every punch,
//! stores every result in file order and finally mirrors the latest window.
//!
//! Reading the whole file each time is what the `FullFileReingest` strategy
//! does. It relies on idempotent storage: every punch seen before is
//! presented again and absorbed as a duplicate. A different strategy (for
//! example an offset-tracking one) can be plugged in through `IngestStrategy`
//! without touching the resolver or the store.

use crate::db::{self, SortOrder, UpsertOutcome};
use crate::parser::{parse_content, ParsedContent};
use crate::services::resolver::{ParticipantResolver, Resolution};
use crate::services::sheet_mirror::{MirrorError, SheetMirror};
use async_trait::async_trait;
use serde::Serialize;
use sqlx::SqlitePool;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Pass-level failures; the watch stays active and retries on the next signal
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("cannot read timing log {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("storage failure: {0}")]
    Storage(#[from] livestream_common::Error),
}

/// How a pass obtains the punches to store
#[async_trait]
pub trait IngestStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    async fn collect(&self, path: &Path) -> Result<ParsedContent, IngestError>;
}

/// Re-read and re-parse the entire file on every pass
#[derive(Debug, Default, Clone, Copy)]
pub struct FullFileReingest;

#[async_trait]
impl IngestStrategy for FullFileReingest {
    fn name(&self) -> &'static str {
        "full-file"
    }

    async fn collect(&self, path: &Path) -> Result<ParsedContent, IngestError> {
        let bytes = tokio::fs::read(path).await.map_err(|source| IngestError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        // Stray non-UTF-8 bytes only spoil their own line
        let content = String::from_utf8_lossy(&bytes);
        Ok(parse_content(&content))
    }
}

/// Everything a pass needs, built once at startup and passed explicitly
#[derive(Clone)]
pub struct PipelineContext {
    pub db: SqlitePool,
    pub resolver: ParticipantResolver,
    pub mirror: Arc<SheetMirror>,
    pub strategy: Arc<dyn IngestStrategy>,
    /// Rows mirrored per pass
    pub mirror_limit: i64,
}

impl PipelineContext {
    pub fn new(db: SqlitePool, mirror: Arc<SheetMirror>, mirror_limit: i64) -> Self {
        Self {
            resolver: ParticipantResolver::new(db.clone()),
            db,
            mirror,
            strategy: Arc::new(FullFileReingest),
            mirror_limit,
        }
    }

    pub fn with_strategy(mut self, strategy: Arc<dyn IngestStrategy>) -> Self {
        self.strategy = strategy;
        self
    }
}

/// What the mirror step did
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum MirrorStatus {
    #[default]
    Skipped,
    Synced { rows: usize },
    Failed { reason: String },
}

/// Counters for one pass
#[derive(Debug, Clone, Default, Serialize)]
pub struct PassReport {
    pub pass_id: Uuid,
    pub punches_parsed: usize,
    pub lines_rejected: usize,
    /// An unterminated final line was left for a later pass
    pub partial_line_held: bool,
    pub inserted: usize,
    pub duplicates: usize,
    pub unresolved: usize,
    pub mirror: MirrorStatus,
}

/// Run one full ingestion pass over `path`
///
/// A storage failure aborts the pass. Mirror failures are recorded in the
/// report and never fail the pass.
pub async fn run_pass(ctx: &PipelineContext, path: &Path) -> Result<PassReport, IngestError> {
    let pass_id = Uuid::new_v4();
    debug!(%pass_id, path = %path.display(), strategy = ctx.strategy.name(), "Ingestion pass started");

    let parsed = ctx.strategy.collect(path).await?;
    let mut report = PassReport {
        pass_id,
        punches_parsed: parsed.punches.len(),
        lines_rejected: parsed.rejected.len(),
        partial_line_held: parsed.held_back.is_some(),
        ..Default::default()
    };

    // Bibs repeat many times per file; resolve each once per pass
    let mut resolved: HashMap<i64, Resolution> = HashMap::new();

    for punch in &parsed.punches {
        let resolution = match resolved.get(&punch.bib_number) {
            Some(resolution) => resolution.clone(),
            None => {
                let resolution = ctx.resolver.resolve(punch.bib_number).await?;
                resolved.insert(punch.bib_number, resolution.clone());
                resolution
            }
        };

        if !resolution.is_found() {
            report.unresolved += 1;
        }

        match db::upsert_result(&ctx.db, punch, resolution.participant()).await? {
            UpsertOutcome::Inserted => report.inserted += 1,
            UpsertOutcome::Duplicate => report.duplicates += 1,
        }
    }

    report.mirror = mirror_latest(ctx).await?;

    info!(
        %pass_id,
        parsed = report.punches_parsed,
        rejected = report.lines_rejected,
        partial_line_held = report.partial_line_held,
        inserted = report.inserted,
        duplicates = report.duplicates,
        unresolved = report.unresolved,
        mirror = ?report.mirror,
        "Ingestion pass complete"
    );

    Ok(report)
}

async fn mirror_latest(ctx: &PipelineContext) -> Result<MirrorStatus, IngestError> {
    if ctx.mirror.target().await.is_none() {
        return Ok(MirrorStatus::Skipped);
    }

    let rows = db::latest_results(&ctx.db, ctx.mirror_limit, SortOrder::Newest).await?;

    Ok(match ctx.mirror.sync_configured(&rows, ctx.mirror_limit).await {
        Ok(report) => MirrorStatus::Synced {
            rows: report.rows_written,
        },
        Err(MirrorError::NotConfigured) => MirrorStatus::Skipped,
        Err(e) => {
            warn!(error = %e, "Mirror sync failed; will retry on next pass");
            MirrorStatus::Failed {
                reason: e.to_string(),
            }
        }
    })
}
