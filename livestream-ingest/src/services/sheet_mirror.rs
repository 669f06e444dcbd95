//! Sheet mirror
//!
//! Best-effort copy of the latest results into a spreadsheet tab for
//! spectators. The store is the source of truth; a failed sync is logged by
//! the caller and retried naturally on the next ingestion pass.
//!
//! Every sync is a full overwrite of the tracked window (columns A..G, one
//! row per result). There is no cell diffing.

use crate::services::sheets_client::{a1_range, CellGrid, SheetsError, SpreadsheetClient};
use livestream_common::db::ResultRow;
use livestream_common::time::format_timestamp;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{info, warn};

/// Last mirrored column (bib, first, last, club, birthdate, timestamp, placement)
const LAST_COLUMN: char = 'G';

/// Range read when importing a roster tab
const ROSTER_RANGE: &str = "A1:Z1000";

/// Where the mirror writes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MirrorTarget {
    pub spreadsheet_id: String,
    pub tab_name: String,
}

/// Mirror errors; none of them affect the store
#[derive(Debug, Error)]
pub enum MirrorError {
    #[error("no mirror destination configured")]
    NotConfigured,

    #[error("no spreadsheet credentials configured")]
    NoCredentials,

    /// The tab was missing and has been created; it is filled on the next pass
    #[error("tab {0:?} was missing and has been created")]
    TabCreated(String),

    #[error("tab {tab:?} was missing and could not be created: {source}")]
    TabCreateFailed {
        tab: String,
        #[source]
        source: SheetsError,
    },

    #[error(transparent)]
    Sheets(#[from] SheetsError),
}

/// Successful sync summary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MirrorReport {
    pub rows_written: usize,
}

/// Owns the spreadsheet client and the runtime-configurable destination
pub struct SheetMirror {
    client: Option<Arc<dyn SpreadsheetClient>>,
    target: RwLock<Option<MirrorTarget>>,
}

impl SheetMirror {
    pub fn new(client: Arc<dyn SpreadsheetClient>) -> Self {
        Self {
            client: Some(client),
            target: RwLock::new(None),
        }
    }

    /// Mirror without credentials; every sync reports `NoCredentials`
    pub fn without_client() -> Self {
        Self {
            client: None,
            target: RwLock::new(None),
        }
    }

    /// Set the initial destination
    pub fn with_target(self, target: Option<MirrorTarget>) -> Self {
        Self {
            client: self.client,
            target: RwLock::new(target),
        }
    }

    /// Change the destination used by subsequent passes
    pub async fn configure(&self, target: MirrorTarget) {
        info!(
            spreadsheet_id = %target.spreadsheet_id,
            tab = %target.tab_name,
            "Mirror destination configured"
        );
        *self.target.write().await = Some(target);
    }

    pub async fn target(&self) -> Option<MirrorTarget> {
        self.target.read().await.clone()
    }

    pub fn has_client(&self) -> bool {
        self.client.is_some()
    }

    fn client(&self) -> Result<&Arc<dyn SpreadsheetClient>, MirrorError> {
        self.client.as_ref().ok_or(MirrorError::NoCredentials)
    }

    /// Sync to the configured destination
    pub async fn sync_configured(
        &self,
        rows: &[ResultRow],
        limit: i64,
    ) -> Result<MirrorReport, MirrorError> {
        let target = self.target().await.ok_or(MirrorError::NotConfigured)?;
        self.sync(&target, rows, limit).await
    }

    /// Overwrite the destination window with `rows`
    ///
    /// The tab is checked with a read first. A missing tab is created and the
    /// sync reports `TabCreated` without writing; the next pass fills it.
    pub async fn sync(
        &self,
        target: &MirrorTarget,
        rows: &[ResultRow],
        limit: i64,
    ) -> Result<MirrorReport, MirrorError> {
        let client = self.client()?;
        let range = window_range(&target.tab_name, limit);

        match client.read_range(&target.spreadsheet_id, &range).await {
            Ok(_) => {}
            Err(SheetsError::TabMissing(_)) => {
                warn!(tab = %target.tab_name, "Mirror tab missing, creating it");
                return match client.add_tab(&target.spreadsheet_id, &target.tab_name).await {
                    Ok(()) => Err(MirrorError::TabCreated(target.tab_name.clone())),
                    Err(source) => Err(MirrorError::TabCreateFailed {
                        tab: target.tab_name.clone(),
                        source,
                    }),
                };
            }
            Err(e) => return Err(e.into()),
        }

        let values: CellGrid = rows
            .iter()
            .take(limit.max(0) as usize)
            .map(result_to_cells)
            .collect();
        let rows_written = values.len();

        client
            .write_range(&target.spreadsheet_id, &range, values)
            .await?;

        Ok(MirrorReport { rows_written })
    }

    /// Read a roster tab from the configured spreadsheet
    pub async fn read_tab(&self, tab_name: &str) -> Result<CellGrid, MirrorError> {
        let client = self.client()?;
        let target = self.target().await.ok_or(MirrorError::NotConfigured)?;
        let values = client
            .read_range(&target.spreadsheet_id, &a1_range(tab_name, ROSTER_RANGE))
            .await?;
        Ok(values)
    }
}

/// The tracked window for a given row limit
pub fn window_range(tab: &str, limit: i64) -> String {
    a1_range(tab, &format!("A1:{}{}", LAST_COLUMN, limit.max(1)))
}

/// One mirrored row; absent values become empty strings so old cells clear
pub fn result_to_cells(row: &ResultRow) -> Vec<Value> {
    fn text(value: &Option<String>) -> Value {
        Value::String(value.clone().unwrap_or_default())
    }

    vec![
        Value::from(row.bib_number),
        text(&row.first_name),
        text(&row.last_name),
        text(&row.club),
        text(&row.birthdate),
        Value::String(format_timestamp(&row.timestamp)),
        row.placement
            .map(Value::from)
            .unwrap_or_else(|| Value::String(String::new())),
    ]
}
