//! Configuration loading and resolution
//!
//! Resolution priority for every setting:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable (both handled by the binary's clap parser)
//! 3. TOML config file
//! 4. Compiled default (fallback)

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Default HTTP bind address for the control plane
pub const DEFAULT_BIND_ADDRESS: &str = "127.0.0.1:8080";

/// Default window over which change notifications are coalesced
pub const DEFAULT_DEBOUNCE_MS: u64 = 100;

/// Default number of result rows mirrored to the spreadsheet
pub const DEFAULT_MIRROR_LIMIT: i64 = 10_000;

/// Database file name inside the data folder
pub const DATABASE_FILE_NAME: &str = "race_timing.db";

/// On-disk TOML configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct TomlConfig {
    pub database_path: Option<PathBuf>,
    pub bind_address: Option<String>,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub watch: WatchConfig,
    #[serde(default)]
    pub sheets: SheetsConfig,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// tracing level directive (e.g. "info", "debug")
    pub level: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct WatchConfig {
    pub debounce_ms: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct SheetsConfig {
    /// OAuth bearer token used for the Sheets REST API
    pub access_token: Option<String>,
    /// Mirror destination configured at startup (can be changed at runtime)
    pub spreadsheet_id: Option<String>,
    pub tab_name: Option<String>,
    /// Number of most recent results mirrored per pass
    pub mirror_limit: Option<i64>,
}

/// Values supplied by the command line or environment
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub database_path: Option<PathBuf>,
    pub bind_address: Option<String>,
    pub debounce_ms: Option<u64>,
    pub mirror_limit: Option<i64>,
    pub log_level: Option<String>,
    pub sheets_access_token: Option<String>,
    pub spreadsheet_id: Option<String>,
    pub tab_name: Option<String>,
}

/// Fully resolved service configuration
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub database_path: PathBuf,
    pub bind_address: String,
    pub debounce: Duration,
    pub mirror_limit: i64,
    pub log_level: String,
    pub sheets: SheetsSettings,
}

#[derive(Debug, Clone, Default)]
pub struct SheetsSettings {
    pub access_token: Option<String>,
    pub spreadsheet_id: Option<String>,
    pub tab_name: Option<String>,
}

impl ServiceConfig {
    /// Merge overrides over the TOML file over compiled defaults
    pub fn resolve(overrides: ConfigOverrides, toml_config: TomlConfig) -> Result<Self> {
        let debounce_ms = overrides
            .debounce_ms
            .or(toml_config.watch.debounce_ms)
            .unwrap_or(DEFAULT_DEBOUNCE_MS);
        if debounce_ms == 0 {
            return Err(Error::Config("debounce window must be greater than zero".to_string()));
        }

        let mirror_limit = overrides
            .mirror_limit
            .or(toml_config.sheets.mirror_limit)
            .unwrap_or(DEFAULT_MIRROR_LIMIT);
        if mirror_limit <= 0 {
            return Err(Error::Config(format!(
                "mirror limit must be positive, got {}",
                mirror_limit
            )));
        }

        Ok(Self {
            database_path: overrides
                .database_path
                .or(toml_config.database_path)
                .unwrap_or_else(default_database_path),
            bind_address: overrides
                .bind_address
                .or(toml_config.bind_address)
                .unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string()),
            debounce: Duration::from_millis(debounce_ms),
            mirror_limit,
            log_level: overrides
                .log_level
                .or(toml_config.logging.level)
                .unwrap_or_else(|| "info".to_string()),
            sheets: SheetsSettings {
                access_token: non_blank(
                    overrides.sheets_access_token.or(toml_config.sheets.access_token),
                ),
                spreadsheet_id: non_blank(
                    overrides.spreadsheet_id.or(toml_config.sheets.spreadsheet_id),
                ),
                tab_name: non_blank(overrides.tab_name.or(toml_config.sheets.tab_name)),
            },
        })
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Load the TOML config file
///
/// An explicitly requested file must exist. Without one, the platform default
/// location is tried and a missing file yields the empty configuration.
pub fn load_toml_config(explicit_path: Option<&Path>) -> Result<TomlConfig> {
    let path = match explicit_path {
        Some(path) => path.to_path_buf(),
        None => match default_config_path() {
            Some(path) if path.exists() => path,
            _ => {
                debug!("No config file found, using defaults");
                return Ok(TomlConfig::default());
            }
        },
    };

    let content = std::fs::read_to_string(&path)
        .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
    let config = toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))?;

    debug!("Loaded config file: {}", path.display());
    Ok(config)
}

/// `~/.config/livestream/config.toml` (platform equivalent elsewhere)
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("livestream").join("config.toml"))
}

/// OS-dependent default database location
pub fn default_database_path() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("livestream"))
        .unwrap_or_else(|| PathBuf::from("./livestream_data"))
        .join(DATABASE_FILE_NAME)
}
