//! Booking ledger storage.
//!
//! The reconciler works against [`LedgerStore`], a keyed view of the ledger
//! (UID -> row + location). Each adapter owns its notion of a location: a row
//! id for SQLite, a physical row number for the CSV sheet.

use std::collections::HashMap;
use std::fmt::Debug;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::SqlitePool;

use crate::config::{LedgerBackend, LedgerConfig};
use crate::db::models::{BookingRecord, LedgerRow, StoredBooking};
use crate::error::AppResult;

pub mod csv_file;
pub mod schema;
pub mod sqlite;

pub use self::csv_file::CsvLedger;
pub use self::schema::LedgerSchema;
pub use self::sqlite::SqliteLedger;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateKind {
    /// A tracked field differs from the stored row.
    Changed,
    /// Same content, the stored timestamp was stale.
    Refresh,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlannedUpdate<L> {
    pub location: L,
    pub record: BookingRecord,
    pub kind: UpdateKind,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AbsentMark<L> {
    pub uid: String,
    pub location: L,
}

/// Write-back decisions of one reconciliation run.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconciliationPlan<L> {
    pub to_insert: Vec<BookingRecord>,
    pub to_update: Vec<PlannedUpdate<L>>,
    pub to_mark_absent: Vec<AbsentMark<L>>,
    /// Timestamp written on rows marked absent.
    pub marked_at: DateTime<Utc>,
}

impl<L> ReconciliationPlan<L> {
    pub fn is_empty(&self) -> bool {
        self.to_insert.is_empty() && self.to_update.is_empty() && self.to_mark_absent.is_empty()
    }
}

/// Outcome of materializing a plan.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ApplyReport {
    pub inserted: usize,
    pub updated: usize,
    pub marked_absent: usize,
    /// Writes skipped because their location was invalid or the store refused them.
    pub skipped_writes: usize,
}

#[async_trait]
pub trait LedgerStore: Send {
    type Location: Clone + Debug + Send + Sync;

    /// Current ledger keyed by UID. Ensures the ledger layout first; rows with
    /// a blank UID are logged and left out.
    async fn load_existing(&mut self) -> AppResult<HashMap<String, StoredBooking<Self::Location>>>;

    /// Materialize a plan. A failing single write is logged and counted, it
    /// never rolls back the others.
    async fn apply_plan(
        &mut self,
        plan: &ReconciliationPlan<Self::Location>,
    ) -> AppResult<ApplyReport>;

    /// Reorder data rows by check-out date ascending.
    async fn sort_by_check_out(&mut self) -> AppResult<()>;

    /// Ledger rows in ledger order.
    async fn rows(&mut self) -> AppResult<Vec<LedgerRow>>;
}

/// Rows of whichever ledger backend is configured, in ledger order.
pub async fn configured_rows(
    config: &LedgerConfig,
    pool: &SqlitePool,
    schema: &LedgerSchema,
) -> AppResult<Vec<LedgerRow>> {
    match config.backend {
        LedgerBackend::Sqlite => SqliteLedger::new(pool.clone(), schema.clone()).rows().await,
        LedgerBackend::Csv => CsvLedger::open(&config.csv_path, schema.clone())?.rows().await,
    }
}
