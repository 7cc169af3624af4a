use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::SqlitePool;
use tracing::{debug, warn};

use crate::db::models::{LedgerRow, StoredBooking};
use crate::db::BookingRepository;
use crate::error::{AppError, AppResult};
use crate::ledger::{ApplyReport, LedgerSchema, LedgerStore, ReconciliationPlan};

/// Ledger kept in the `bookings` table. A row's location is its `id`.
pub struct SqliteLedger {
    pool: SqlitePool,
    schema: LedgerSchema,
}

impl SqliteLedger {
    pub fn new(pool: SqlitePool, schema: LedgerSchema) -> Self {
        Self { pool, schema }
    }

    async fn ensure_table(&self) -> AppResult<()> {
        if BookingRepository::table_exists(&self.pool).await? {
            Ok(())
        } else {
            Err(AppError::Config(
                "ledger table `bookings` does not exist".to_string(),
            ))
        }
    }
}

#[async_trait]
impl LedgerStore for SqliteLedger {
    type Location = i64;

    async fn load_existing(&mut self) -> AppResult<HashMap<String, StoredBooking<i64>>> {
        self.ensure_table().await?;

        let mut existing = HashMap::new();
        for stored in BookingRepository::list_with_ids(&self.pool).await? {
            if stored.row.uid.trim().is_empty() {
                warn!("Skipping ledger row {} with blank UID", stored.id);
                continue;
            }
            existing
                .entry(stored.row.uid.clone())
                .or_insert(StoredBooking {
                    row: stored.row,
                    location: stored.id,
                });
        }

        debug!("Loaded {} bookings from SQLite ledger", existing.len());
        Ok(existing)
    }

    async fn apply_plan(&mut self, plan: &ReconciliationPlan<i64>) -> AppResult<ApplyReport> {
        let mut report = ApplyReport::default();

        for record in &plan.to_insert {
            match BookingRepository::insert(&self.pool, &record.to_row(&self.schema)).await {
                Ok(id) => {
                    debug!("Inserted booking {} as row {}", record.uid, id);
                    report.inserted += 1;
                }
                Err(e) => {
                    warn!("Failed to insert booking {}: {:?}", record.uid, e);
                    report.skipped_writes += 1;
                }
            }
        }

        for update in &plan.to_update {
            let row = update.record.to_row(&self.schema);
            match BookingRepository::update_row(&self.pool, update.location, &row).await {
                Ok(true) => report.updated += 1,
                Ok(false) => {
                    warn!(
                        "Skipping update of booking {}: row {} does not exist",
                        update.record.uid, update.location
                    );
                    report.skipped_writes += 1;
                }
                Err(e) => {
                    warn!("Failed to update booking {}: {:?}", update.record.uid, e);
                    report.skipped_writes += 1;
                }
            }
        }

        let status = &self.schema.statuses().possibly_cancelled;
        let marked_at = self.schema.format_timestamp(plan.marked_at);
        for mark in &plan.to_mark_absent {
            match BookingRepository::update_status(&self.pool, mark.location, status, &marked_at)
                .await
            {
                Ok(true) => report.marked_absent += 1,
                Ok(false) => {
                    warn!(
                        "Skipping absence mark of booking {}: row {} does not exist",
                        mark.uid, mark.location
                    );
                    report.skipped_writes += 1;
                }
                Err(e) => {
                    warn!("Failed to mark booking {} absent: {:?}", mark.uid, e);
                    report.skipped_writes += 1;
                }
            }
        }

        Ok(report)
    }

    async fn sort_by_check_out(&mut self) -> AppResult<()> {
        self.ensure_table().await?;
        BookingRepository::reorder_by_check_out(&self.pool).await
    }

    async fn rows(&mut self) -> AppResult<Vec<LedgerRow>> {
        self.ensure_table().await?;
        Ok(BookingRepository::list_with_ids(&self.pool)
            .await?
            .into_iter()
            .map(|stored| stored.row)
            .collect())
    }
}
