//! Startup helpers:
//! - database connection + migrations
//! - periodic sync worker spawn
//!
//! Kept out of `main.rs` so the binary only wires things together.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;

use crate::config::Config;
use crate::AppState;

/// File path of a SQLite database URL, without scheme or query string.
///
/// `sqlite://data/app.db?mode=rwc` and `sqlite:data/app.db` both give
/// `data/app.db`; a bare path is returned unchanged.
pub fn sqlite_file_path(db_url: &str) -> &str {
    let path = db_url
        .strip_prefix("sqlite://")
        .or_else(|| db_url.strip_prefix("sqlite:"))
        .unwrap_or(db_url);
    path.split_once('?').map_or(path, |(file, _)| file)
}

/// Open the SQLite pool and run migrations.
///
/// The parent directory of the database file is created when missing, and the
/// file itself is created by `create_if_missing(true)`.
pub async fn init_db(config: &Config) -> Result<sqlx::SqlitePool> {
    let db_path = sqlite_file_path(&config.database.url);
    let db_file_path = Path::new(db_path);
    tracing::info!("Opening database file: {}", db_file_path.display());

    if let Some(parent) = db_file_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|e| {
                anyhow::anyhow!(
                    "Failed to create database directory {}: {}",
                    parent.display(),
                    e
                )
            })?;
        }
    }

    let connect_options = sqlx::sqlite::SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true);

    let pool = sqlx::sqlite::SqlitePoolOptions::new()
        .max_connections(config.database.max_connections)
        .connect_with(connect_options)
        .await?;

    tracing::info!("Running database migrations");
    sqlx::migrate!("./migrations").run(&pool).await?;

    Ok(pool)
}

/// Spawn the periodic sync worker.
///
/// Returns the worker handles so the caller can await them on shutdown. The
/// worker exits when a message arrives on `shutdown`.
pub fn spawn_background_workers(
    state: Arc<AppState>,
    shutdown: tokio::sync::broadcast::Sender<()>,
) -> Vec<tokio::task::JoinHandle<()>> {
    let mut handles = Vec::new();

    if !state.config.sync.worker_enabled {
        tracing::info!("Sync worker disabled (SYNC_WORKER_ENABLED=false)");
        return handles;
    }

    let interval = Duration::from_secs(state.config.sync.interval_seconds.max(1));
    let mut shutdown_rx = shutdown.subscribe();
    handles.push(tokio::spawn(async move {
        loop {
            tracing::info!("Starting periodic feed synchronization");

            if let Err(e) = state.sync.run().await {
                tracing::warn!("Periodic sync failed: {:?}", e);
            }

            tokio::select! {
                _ = shutdown_rx.recv() => {
                    tracing::info!("Sync worker shutting down");
                    break;
                }
                _ = tokio::time::sleep(interval) => {}
            }
        }
    }));

    handles
}
