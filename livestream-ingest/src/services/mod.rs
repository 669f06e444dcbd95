//! Pipeline services
//!
//! Change detector -> ingestion pass (parser, resolver, store) -> sheet
//! mirror, driven by the watch orchestrator. Roster import feeds the
//! participants the resolver looks up.

pub mod change_detector;
pub mod ingest;
pub mod orchestrator;
pub mod resolver;
pub mod roster;
pub mod sheet_mirror;
pub mod sheets_client;

pub use change_detector::{ChangeKind, ChangeSignal, DetectorError, FileChangeDetector};
pub use ingest::{
    run_pass, FullFileReingest, IngestError, IngestStrategy, MirrorStatus, PassReport,
    PipelineContext,
};
pub use orchestrator::{WatchAck, WatchError, WatchOrchestrator, WatchState, WatchStatus};
pub use resolver::{ParticipantResolver, Resolution};
pub use roster::{import_participants, ImportReport, RowOutcome, RowRejection, RowStatus};
pub use sheet_mirror::{MirrorError, MirrorReport, MirrorTarget, SheetMirror};
pub use sheets_client::{CellGrid, GoogleSheetsClient, SheetsError, SpreadsheetClient};
