//! In-memory spreadsheet
//!
//! Tabs are keyed by title. Reading a missing tab fails the same way the
//! Sheets API does, so mirror tab creation can be exercised offline.

use async_trait::async_trait;
use livestream_ingest::services::{CellGrid, SheetsError, SpreadsheetClient};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

#[derive(Default)]
pub struct FakeSheets {
    tabs: Mutex<HashMap<String, CellGrid>>,
    pub reads: AtomicUsize,
    pub writes: AtomicUsize,
    pub tabs_added: AtomicUsize,
    /// Make every write fail with an API error
    pub fail_writes: AtomicBool,
    /// The next N reads report the tab missing even if it exists, like a
    /// second writer that looked before the first one created it
    pub stale_reads: AtomicUsize,
}

impl FakeSheets {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tab(self, title: &str, grid: CellGrid) -> Self {
        self.tabs.lock().unwrap().insert(title.to_string(), grid);
        self
    }

    pub fn tab(&self, title: &str) -> Option<CellGrid> {
        self.tabs.lock().unwrap().get(title).cloned()
    }

    pub fn has_tab(&self, title: &str) -> bool {
        self.tabs.lock().unwrap().contains_key(title)
    }
}

/// Tab title of an A1 range such as `'Men 10k'!A1:G10`
fn tab_of(range: &str) -> String {
    let tab = match range.rfind('!') {
        Some(idx) => &range[..idx],
        None => range,
    };
    tab.trim_matches('\'').replace("''", "'")
}

#[async_trait]
impl SpreadsheetClient for FakeSheets {
    async fn read_range(&self, _spreadsheet_id: &str, range: &str) -> Result<CellGrid, SheetsError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        let stale = self
            .stale_reads
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if stale {
            return Err(SheetsError::TabMissing(range.to_string()));
        }
        self.tab(&tab_of(range))
            .ok_or_else(|| SheetsError::TabMissing(range.to_string()))
    }

    async fn add_tab(&self, _spreadsheet_id: &str, title: &str) -> Result<(), SheetsError> {
        let mut tabs = self.tabs.lock().unwrap();
        if tabs.contains_key(title) {
            return Err(SheetsError::TabExists(title.to_string()));
        }
        tabs.insert(title.to_string(), Vec::new());
        self.tabs_added.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn write_range(
        &self,
        _spreadsheet_id: &str,
        range: &str,
        values: CellGrid,
    ) -> Result<(), SheetsError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(SheetsError::Api(429, "Quota exceeded".to_string()));
        }
        let tab = tab_of(range);
        let mut tabs = self.tabs.lock().unwrap();
        match tabs.get_mut(&tab) {
            Some(grid) => {
                *grid = values;
                self.writes.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
            None => Err(SheetsError::TabMissing(range.to_string())),
        }
    }
}
