//! One reconciliation run: validate the configured feeds, fetch and parse
//! them concurrently, diff against the ledger, write the plan back and sort.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use sqlx::SqlitePool;
use tokio::sync::{Mutex, RwLock};
use tracing::{error, info, warn};
use url::Url;

use crate::config::{Config, LedgerBackend};
use crate::db::models::RawFeedSource;
use crate::db::FeedSourceRepository;
use crate::error::{AppError, AppResult};
use crate::i18n;
use crate::ics::{self, CalendarEvent};
use crate::ledger::{CsvLedger, LedgerSchema, LedgerStore, SqliteLedger, UpdateKind};
use crate::services::fetcher::{FeedFetcher, FetchError};
use crate::services::reconciler::Reconciler;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SkippedFeed {
    pub property_name: String,
    pub url: String,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub feeds_total: usize,
    pub feeds_processed: usize,
    pub skipped_feeds: Vec<SkippedFeed>,
    pub events_parsed: usize,
    pub inserted: usize,
    pub updated: usize,
    /// Updates that only refreshed a stale timestamp.
    pub refreshed: usize,
    pub marked_absent: usize,
    pub skipped_writes: usize,
}

#[derive(Debug, Clone, Copy)]
pub struct RunOptions {
    pub max_concurrent: usize,
    pub staleness: Duration,
}

impl RunOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_concurrent: config.fetch.max_concurrent.max(1),
            staleness: Duration::seconds(config.sync.staleness_seconds),
        }
    }
}

/// Reason a source cannot be processed this run, if any.
fn skip_reason(source: &RawFeedSource, lang: &str) -> Option<String> {
    if !source.enabled {
        return Some(i18n::tr(Some(lang), "skip.disabled", None));
    }
    if source.property_name.trim().is_empty() {
        return Some(i18n::tr(Some(lang), "skip.blank_property_name", None));
    }
    let url = source.url.trim();
    let valid = Url::parse(url)
        .map(|u| matches!(u.scheme(), "http" | "https"))
        .unwrap_or(false);
    if !valid {
        return Some(i18n::tr(Some(lang), "skip.invalid_url", Some(&[("url", url)])));
    }
    None
}

async fn fetch_events(
    fetcher: &dyn FeedFetcher,
    source: &RawFeedSource,
) -> Result<Vec<CalendarEvent>, FetchError> {
    let body = fetcher.fetch(source.url.trim()).await?;
    let events = ics::parse(&body);
    info!(
        "Fetched {} events for {}",
        events.len(),
        source.property_name
    );
    Ok(events)
}

/// Reconcile `sources` (in order) into `store`.
///
/// Only configuration-level failures of the store abort the run; a feed that
/// is invalid or cannot be fetched is skipped and reported.
pub async fn reconcile_feeds<S: LedgerStore>(
    store: &mut S,
    sources: &[RawFeedSource],
    fetcher: &dyn FeedFetcher,
    schema: &LedgerSchema,
    options: RunOptions,
) -> AppResult<SyncReport> {
    let started_at = Utc::now();
    let existing = store.load_existing().await?;

    let mut skipped_feeds = Vec::new();
    let mut valid = Vec::new();
    for source in sources {
        match skip_reason(source, schema.language()) {
            Some(reason) => {
                info!("Skipping feed {:?}: {}", source.property_name, reason);
                skipped_feeds.push(SkippedFeed {
                    property_name: source.property_name.clone(),
                    url: source.url.clone(),
                    reason,
                });
            }
            None => valid.push(source.clone()),
        }
    }

    // `buffered` keeps results in feed order while fetching concurrently.
    let fetched: Vec<_> = stream::iter(valid.into_iter().map(|source| async move {
        let result = fetch_events(fetcher, &source).await;
        (source, result)
    }))
    .buffered(options.max_concurrent.max(1))
    .collect()
    .await;

    let mut reconciler = Reconciler::new(schema, &existing, Utc::now(), options.staleness);
    let mut feeds_processed = 0;
    let mut events_parsed = 0;
    for (source, result) in fetched {
        match result {
            Ok(events) => {
                feeds_processed += 1;
                events_parsed += events.len();
                reconciler.ingest(source.property_name.trim(), &events);
            }
            Err(e) => {
                warn!("Failed to fetch feed for {}: {}", source.property_name, e);
                let err = e.to_string();
                skipped_feeds.push(SkippedFeed {
                    property_name: source.property_name.clone(),
                    url: source.url.clone(),
                    reason: i18n::tr(
                        Some(schema.language()),
                        "skip.fetch_failed",
                        Some(&[("err", err.as_str())]),
                    ),
                });
            }
        }
    }

    let plan = reconciler.finish();
    let refreshed = plan
        .to_update
        .iter()
        .filter(|u| u.kind == UpdateKind::Refresh)
        .count();

    let applied = store.apply_plan(&plan).await?;
    store.sort_by_check_out().await?;

    let report = SyncReport {
        started_at,
        finished_at: Utc::now(),
        feeds_total: sources.len(),
        feeds_processed,
        skipped_feeds,
        events_parsed,
        inserted: applied.inserted,
        updated: applied.updated,
        refreshed,
        marked_absent: applied.marked_absent,
        skipped_writes: applied.skipped_writes,
    };

    info!(
        "Sync finished: {}/{} feeds, {} inserted, {} updated, {} marked absent, {} writes skipped",
        report.feeds_processed,
        report.feeds_total,
        report.inserted,
        report.updated,
        report.marked_absent,
        report.skipped_writes
    );

    Ok(report)
}

/// Runs reconciliation against the configured ledger, one run at a time.
pub struct SyncService {
    db: SqlitePool,
    config: Config,
    schema: LedgerSchema,
    fetcher: Arc<dyn FeedFetcher>,
    run_lock: Mutex<()>,
    running: AtomicBool,
    last_report: RwLock<Option<SyncReport>>,
}

impl SyncService {
    pub fn new(
        db: SqlitePool,
        config: Config,
        schema: LedgerSchema,
        fetcher: Arc<dyn FeedFetcher>,
    ) -> Self {
        Self {
            db,
            config,
            schema,
            fetcher,
            run_lock: Mutex::new(()),
            running: AtomicBool::new(false),
            last_report: RwLock::new(None),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub async fn last_report(&self) -> Option<SyncReport> {
        self.last_report.read().await.clone()
    }

    /// Run now, waiting for a run in progress to finish first.
    pub async fn run(&self) -> AppResult<SyncReport> {
        let _guard = self.run_lock.lock().await;
        self.run_locked().await
    }

    /// Run now, or fail with `Conflict` when a run is already in progress.
    pub async fn try_run(&self) -> AppResult<SyncReport> {
        let _guard = self
            .run_lock
            .try_lock()
            .map_err(|_| AppError::Conflict(i18n::t("sync.already_running")))?;
        self.run_locked().await
    }

    async fn run_locked(&self) -> AppResult<SyncReport> {
        self.running.store(true, Ordering::SeqCst);
        let result = self.execute().await;
        self.running.store(false, Ordering::SeqCst);

        match result {
            Ok(report) => {
                *self.last_report.write().await = Some(report.clone());
                Ok(report)
            }
            Err(e) => {
                error!("Sync run failed: {}", e);
                Err(e)
            }
        }
    }

    async fn execute(&self) -> AppResult<SyncReport> {
        let marker = &self.config.sync.enabled_marker;
        let sources: Vec<RawFeedSource> = FeedSourceRepository::list_ordered(&self.db)
            .await?
            .iter()
            .map(|s| s.to_raw(marker))
            .collect();

        let options = RunOptions::from_config(&self.config);
        let fetcher = self.fetcher.as_ref();

        match self.config.ledger.backend {
            LedgerBackend::Sqlite => {
                let mut store = SqliteLedger::new(self.db.clone(), self.schema.clone());
                reconcile_feeds(&mut store, &sources, fetcher, &self.schema, options).await
            }
            LedgerBackend::Csv => {
                let mut store = CsvLedger::open(&self.config.ledger.csv_path, self.schema.clone())?;
                reconcile_feeds(&mut store, &sources, fetcher, &self.schema, options).await
            }
        }
    }
}
