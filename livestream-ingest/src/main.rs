//! livestream-ingest - live race-timing ingestion service
//!
//! Serves the control API; watching starts on `POST /watch/start` or at
//! startup with `--watch`.

use anyhow::{Context, Result};
use clap::Parser;
use livestream_common::config::{load_toml_config, ConfigOverrides, ServiceConfig};
use livestream_common::db::init_database;
use livestream_ingest::services::{
    GoogleSheetsClient, MirrorTarget, PipelineContext, SheetMirror,
};
use livestream_ingest::{build_router, AppState};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Command-line arguments
#[derive(Parser, Debug)]
#[command(version, about = "Live race-timing ingestion service")]
struct Args {
    /// Config file (default: ~/.config/livestream/config.toml)
    #[arg(short, long, env = "LIVESTREAM_CONFIG")]
    config: Option<PathBuf>,

    /// SQLite database file
    #[arg(long, env = "LIVESTREAM_DATABASE_PATH")]
    database_path: Option<PathBuf>,

    /// Address for the control API
    #[arg(short, long, env = "LIVESTREAM_BIND")]
    bind: Option<String>,

    /// Window in milliseconds over which file change notifications are coalesced
    #[arg(long, env = "LIVESTREAM_DEBOUNCE_MS")]
    debounce_ms: Option<u64>,

    /// Number of most recent results mirrored per pass
    #[arg(long, env = "LIVESTREAM_MIRROR_LIMIT")]
    mirror_limit: Option<i64>,

    /// Default log level when RUST_LOG is unset
    #[arg(long, env = "LIVESTREAM_LOG_LEVEL")]
    log_level: Option<String>,

    /// OAuth bearer token for the Google Sheets API
    #[arg(long, env = "LIVESTREAM_SHEETS_TOKEN", hide_env_values = true)]
    sheets_token: Option<String>,

    /// Spreadsheet to mirror into
    #[arg(long, env = "LIVESTREAM_SPREADSHEET_ID")]
    spreadsheet_id: Option<String>,

    /// Tab to mirror into
    #[arg(long, env = "LIVESTREAM_TAB_NAME")]
    tab_name: Option<String>,

    /// Start watching this timing log immediately
    #[arg(short, long)]
    watch: Option<PathBuf>,
}

impl Args {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            database_path: self.database_path.clone(),
            bind_address: self.bind.clone(),
            debounce_ms: self.debounce_ms,
            mirror_limit: self.mirror_limit,
            log_level: self.log_level.clone(),
            sheets_access_token: self.sheets_token.clone(),
            spreadsheet_id: self.spreadsheet_id.clone(),
            tab_name: self.tab_name.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let toml_config =
        load_toml_config(args.config.as_deref()).context("Failed to load config file")?;
    let config = ServiceConfig::resolve(args.overrides(), toml_config)
        .context("Invalid configuration")?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!(
                    "livestream_ingest={0},livestream_common={0},tower_http=info",
                    config.log_level
                )
                .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting livestream-ingest v{}", env!("CARGO_PKG_VERSION"));
    info!("Database path: {}", config.database_path.display());

    let pool = match init_database(&config.database_path).await {
        Ok(pool) => {
            info!("✓ Database ready");
            pool
        }
        Err(e) => {
            error!("Failed to open database: {}", e);
            return Err(e.into());
        }
    };

    let mirror = match &config.sheets.access_token {
        Some(token) => SheetMirror::new(Arc::new(
            GoogleSheetsClient::new(token.clone()).context("Failed to build Sheets client")?,
        )),
        None => {
            warn!("No Sheets access token configured; results will not be mirrored");
            SheetMirror::without_client()
        }
    };
    let target = match (&config.sheets.spreadsheet_id, &config.sheets.tab_name) {
        (Some(spreadsheet_id), Some(tab_name)) => Some(MirrorTarget {
            spreadsheet_id: spreadsheet_id.clone(),
            tab_name: tab_name.clone(),
        }),
        _ => None,
    };
    if let Some(target) = &target {
        info!(
            spreadsheet_id = %target.spreadsheet_id,
            tab = %target.tab_name,
            "Mirror destination from configuration"
        );
    }
    let mirror = Arc::new(mirror.with_target(target));

    let context = PipelineContext::new(pool, mirror, config.mirror_limit);
    let state = AppState::new(context, config.debounce);

    if let Some(path) = &args.watch {
        state
            .orchestrator
            .start_watch(path)
            .await
            .with_context(|| format!("Failed to watch {}", path.display()))?;
    }

    let app = build_router(state.clone());

    let listener = tokio::net::TcpListener::bind(&config.bind_address)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_address))?;
    info!("livestream-ingest listening on http://{}", config.bind_address);
    info!("Health check: http://{}/health", config.bind_address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    state.orchestrator.stop_watch().await;
    info!("Shutdown complete");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
