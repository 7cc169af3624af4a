//! iCal feed to booking ledger reconciliation service.
//!
//! Remote iCal feeds (one per property) are fetched, parsed and diffed against
//! a UID-keyed booking ledger kept either in SQLite or in a CSV sheet. A
//! background worker runs the reconciliation periodically and a small JSON API
//! manages the feed list, triggers runs and exposes the ledger.

use std::sync::Arc;

pub mod config;
pub mod db;
pub mod error;
pub mod i18n;
pub mod ics;
pub mod ledger;
pub mod routes;
pub mod services;

use config::{Config, ConfigError};
use ledger::LedgerSchema;
use services::fetcher::FeedFetcher;
use services::sync::SyncService;

pub struct AppState {
    pub db: sqlx::SqlitePool,
    pub config: Config,
    pub schema: LedgerSchema,
    pub sync: SyncService,
}

impl AppState {
    pub fn new(
        db: sqlx::SqlitePool,
        config: Config,
        fetcher: Arc<dyn FeedFetcher>,
    ) -> Result<Self, ConfigError> {
        let schema = LedgerSchema::from_config(&config.ledger)?;
        let sync = SyncService::new(db.clone(), config.clone(), schema.clone(), fetcher);
        Ok(Self {
            db,
            config,
            schema,
            sync,
        })
    }
}
