//! Spreadsheet client
//!
//! The mirror only needs three calls: read a rectangular range, add a tab,
//! and overwrite a range. `GoogleSheetsClient` implements them against the
//! Sheets v4 REST API with a bearer token.

use async_trait::async_trait;
use reqwest::{StatusCode, Url};
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use thiserror::Error;

const SHEETS_BASE_URL: &str = "https://sheets.googleapis.com";
const USER_AGENT: &str = concat!("livestream-ingest/", env!("CARGO_PKG_VERSION"));

/// Row-major cell values
pub type CellGrid = Vec<Vec<Value>>;

/// Spreadsheet client errors
#[derive(Debug, Error)]
pub enum SheetsError {
    #[error("Network error: {0}")]
    Network(String),

    /// The range names a tab that does not exist
    #[error("Tab not found: {0}")]
    TabMissing(String),

    /// add_tab lost a race or the tab was created by hand
    #[error("Tab already exists: {0}")]
    TabExists(String),

    #[error("API error {0}: {1}")]
    Api(u16, String),

    #[error("Parse error: {0}")]
    Parse(String),
}

/// Minimal spreadsheet surface used by the mirror and roster import
#[async_trait]
pub trait SpreadsheetClient: Send + Sync {
    /// Read all values of an A1 range
    async fn read_range(&self, spreadsheet_id: &str, range: &str) -> Result<CellGrid, SheetsError>;

    /// Create a new tab with the given title
    async fn add_tab(&self, spreadsheet_id: &str, title: &str) -> Result<(), SheetsError>;

    /// Overwrite an A1 range with raw (untransformed) values
    async fn write_range(
        &self,
        spreadsheet_id: &str,
        range: &str,
        values: CellGrid,
    ) -> Result<(), SheetsError>;
}

/// Build an A1 range on a tab, quoting the tab name
pub fn a1_range(tab: &str, cells: &str) -> String {
    format!("'{}'!{}", tab.replace('\'', "''"), cells)
}

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: CellGrid,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
}

/// Google Sheets v4 REST client
pub struct GoogleSheetsClient {
    http_client: reqwest::Client,
    base_url: String,
    access_token: String,
}

impl GoogleSheetsClient {
    pub fn new(access_token: impl Into<String>) -> Result<Self, SheetsError> {
        Self::with_base_url(SHEETS_BASE_URL, access_token)
    }

    /// Client against a different host (used by tests)
    pub fn with_base_url(
        base_url: impl Into<String>,
        access_token: impl Into<String>,
    ) -> Result<Self, SheetsError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| SheetsError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url: base_url.into(),
            access_token: access_token.into(),
        })
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, SheetsError> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| SheetsError::Parse(format!("base url {:?}: {}", self.base_url, e)))?;
        url.path_segments_mut()
            .map_err(|_| SheetsError::Parse(format!("base url {:?} cannot be a base", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Turn a non-success response into a SheetsError
    async fn failure(response: reqwest::Response, subject: &str) -> SheetsError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorEnvelope>(&body)
            .map(|envelope| envelope.error.message)
            .unwrap_or(body);

        if status == StatusCode::BAD_REQUEST && message.contains("Unable to parse range") {
            return SheetsError::TabMissing(subject.to_string());
        }
        if status == StatusCode::BAD_REQUEST && message.contains("already exists") {
            return SheetsError::TabExists(subject.to_string());
        }
        SheetsError::Api(status.as_u16(), message)
    }
}

#[async_trait]
impl SpreadsheetClient for GoogleSheetsClient {
    async fn read_range(&self, spreadsheet_id: &str, range: &str) -> Result<CellGrid, SheetsError> {
        let url = self.endpoint(&["v4", "spreadsheets", spreadsheet_id, "values", range])?;
        tracing::debug!(spreadsheet_id = %spreadsheet_id, range = %range, "Reading sheet range");

        let response = self
            .http_client
            .get(url)
            .bearer_auth(&self.access_token)
            .send()
            .await
            .map_err(|e| SheetsError::Network(e.to_string()))?;

        if !response.status().is_success() {
            return Err(Self::failure(response, range).await);
        }

        let value_range: ValueRange = response
            .json()
            .await
            .map_err(|e| SheetsError::Parse(e.to_string()))?;
        Ok(value_range.values)
    }

    async fn add_tab(&self, spreadsheet_id: &str, title: &str) -> Result<(), SheetsError> {
        let batch_update = format!("{}:batchUpdate", spreadsheet_id);
        let url = self.endpoint(&["v4", "spreadsheets", &batch_update])?;
        tracing::debug!(spreadsheet_id = %spreadsheet_id, title = %title, "Adding sheet tab");

        let body = json!({
            "requests": [
                { "addSheet": { "properties": { "title": title } } }
            ]
        });

        let response = self
            .http_client
            .post(url)
            .bearer_auth(&self.access_token)
            .json(&body)
            .send()
            .await
            .map_err(|e| SheetsError::Network(e.to_string()))?;

        if !response.status().is_success() {
            return Err(Self::failure(response, title).await);
        }
        Ok(())
    }

    async fn write_range(
        &self,
        spreadsheet_id: &str,
        range: &str,
        values: CellGrid,
    ) -> Result<(), SheetsError> {
        let mut url = self.endpoint(&["v4", "spreadsheets", spreadsheet_id, "values", range])?;
        url.query_pairs_mut().append_pair("valueInputOption", "RAW");
        tracing::debug!(
            spreadsheet_id = %spreadsheet_id,
            range = %range,
            rows = values.len(),
            "Writing sheet range"
        );

        let body = json!({
            "range": range,
            "majorDimension": "ROWS",
            "values": values,
        });

        let response = self
            .http_client
            .put(url)
            .bearer_auth(&self.access_token)
            .json(&body)
            .send()
            .await
            .map_err(|e| SheetsError::Network(e.to_string()))?;

        if !response.status().is_success() {
            return Err(Self::failure(response, range).await);
        }
        Ok(())
    }
}
