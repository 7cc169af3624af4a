//! Ledger kept in a CSV file that plays the role of a spreadsheet.
//!
//! Row 1 is the header; a booking's location is its 1-based physical row
//! number. Every write rewrites the whole file through a temporary sibling
//! followed by a rename, so a crash never leaves a half-written ledger.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::NaiveDate;
use tracing::{debug, info, warn};

use crate::db::models::{LedgerRow, StoredBooking};
use crate::error::{AppError, AppResult};
use crate::ledger::schema::{Column, DATE_FORMAT};
use crate::ledger::{ApplyReport, LedgerSchema, LedgerStore, ReconciliationPlan};

type Sheet = Vec<Vec<String>>;

pub struct CsvLedger {
    path: PathBuf,
    schema: LedgerSchema,
}

impl CsvLedger {
    /// Open the ledger at `path`. The file must already exist.
    pub fn open(path: impl Into<PathBuf>, schema: LedgerSchema) -> AppResult<Self> {
        let path = path.into();
        if !path.is_file() {
            return Err(AppError::Config(format!(
                "ledger file {} does not exist",
                path.display()
            )));
        }
        Ok(Self { path, schema })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read(&self) -> AppResult<Sheet> {
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || read_sheet(&path))
            .await
            .map_err(|e| AppError::Internal(e.into()))?
    }

    async fn write(&self, sheet: Sheet) -> AppResult<()> {
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || write_sheet(&path, &sheet))
            .await
            .map_err(|e| AppError::Internal(e.into()))?
    }

    /// Read the sheet with a valid header in row 1, repairing the file when
    /// needed.
    async fn load_sheet(&self) -> AppResult<Sheet> {
        let mut sheet = self.read().await?;
        if ensure_header(&mut sheet, &self.schema) {
            info!("Repaired ledger header in {}", self.path.display());
            self.write(sheet.clone()).await?;
        }
        Ok(sheet)
    }
}

#[async_trait]
impl LedgerStore for CsvLedger {
    type Location = usize;

    async fn load_existing(&mut self) -> AppResult<HashMap<String, StoredBooking<usize>>> {
        let sheet = self.load_sheet().await?;

        let mut existing: HashMap<String, StoredBooking<usize>> = HashMap::new();
        for (idx, cells) in sheet.iter().enumerate().skip(1) {
            let location = idx + 1;
            let row = LedgerRow::from_cells(cells);
            if row.uid.is_empty() {
                warn!("Skipping ledger row {} with blank UID", location);
                continue;
            }
            if existing.contains_key(&row.uid) {
                warn!(
                    "Duplicate UID {} on ledger row {}, keeping the first occurrence",
                    row.uid, location
                );
                continue;
            }
            existing.insert(row.uid.clone(), StoredBooking { row, location });
        }

        debug!(
            "Loaded {} bookings from {}",
            existing.len(),
            self.path.display()
        );
        Ok(existing)
    }

    async fn apply_plan(&mut self, plan: &ReconciliationPlan<usize>) -> AppResult<ApplyReport> {
        let mut sheet = self.load_sheet().await?;
        let mut report = ApplyReport::default();

        // Locations refer to the sheet as loaded, so appends come last.
        for update in &plan.to_update {
            match data_row_mut(&mut sheet, update.location, &update.record.uid) {
                Some(cells) => {
                    *cells = update.record.to_row(&self.schema).to_cells();
                    report.updated += 1;
                }
                None => {
                    warn!(
                        "Skipping update of booking {}: row {} does not hold it",
                        update.record.uid, update.location
                    );
                    report.skipped_writes += 1;
                }
            }
        }

        let status = self.schema.statuses().possibly_cancelled.clone();
        let marked_at = self.schema.format_timestamp(plan.marked_at);
        for mark in &plan.to_mark_absent {
            match data_row_mut(&mut sheet, mark.location, &mark.uid) {
                Some(cells) => {
                    if cells.len() < Column::ALL.len() {
                        cells.resize(Column::ALL.len(), String::new());
                    }
                    cells[Column::Status.index()] = status.clone();
                    cells[Column::LastUpdated.index()] = marked_at.clone();
                    report.marked_absent += 1;
                }
                None => {
                    warn!(
                        "Skipping absence mark of booking {}: row {} does not hold it",
                        mark.uid, mark.location
                    );
                    report.skipped_writes += 1;
                }
            }
        }

        for record in &plan.to_insert {
            sheet.push(record.to_row(&self.schema).to_cells());
            report.inserted += 1;
        }

        if report.inserted + report.updated + report.marked_absent > 0 {
            self.write(sheet).await?;
        }
        Ok(report)
    }

    async fn sort_by_check_out(&mut self) -> AppResult<()> {
        let mut sheet = self.load_sheet().await?;
        if sheet.len() <= 2 {
            return Ok(());
        }

        let before = sheet.clone();
        sheet[1..].sort_by_key(|cells| {
            let date = cells
                .get(Column::CheckOut.index())
                .and_then(|c| NaiveDate::parse_from_str(c.trim(), DATE_FORMAT).ok());
            // Rows without a readable date go last.
            (date.is_none(), date)
        });

        if sheet != before {
            self.write(sheet).await?;
        }
        Ok(())
    }

    async fn rows(&mut self) -> AppResult<Vec<LedgerRow>> {
        let sheet = self.read().await?;
        let skip = match sheet.first() {
            Some(first) if self.schema.is_replaceable_header(first) => 1,
            _ => 0,
        };
        Ok(sheet
            .iter()
            .skip(skip)
            .map(|cells| LedgerRow::from_cells(cells))
            .filter(|row| !row.uid.is_empty())
            .collect())
    }
}

/// The data row at physical row `location`, provided it still holds `uid`.
fn data_row_mut<'a>(sheet: &'a mut Sheet, location: usize, uid: &str) -> Option<&'a mut Vec<String>> {
    if location < 2 {
        return None;
    }
    let cells = sheet.get_mut(location - 1)?;
    let stored = cells
        .get(Column::Uid.index())
        .map(|c| c.trim())
        .unwrap_or_default();
    (stored == uid).then_some(cells)
}

/// Make row 1 the schema header. A row that looks like a header (or is
/// empty) is overwritten; anything else is pushed down so no booking is lost.
/// Returns whether the sheet changed.
fn ensure_header(sheet: &mut Sheet, schema: &LedgerSchema) -> bool {
    let header = schema.headers().to_vec();
    match sheet.first() {
        None => {
            sheet.push(header);
            true
        }
        Some(first) if schema.is_header(first) => false,
        Some(first) if schema.is_replaceable_header(first) => {
            sheet[0] = header;
            true
        }
        Some(_) => {
            sheet.insert(0, header);
            true
        }
    }
}

fn read_sheet(path: &Path) -> AppResult<Sheet> {
    let mut reader = ::csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)?;

    let mut sheet = Vec::new();
    for record in reader.records() {
        let record = record?;
        sheet.push(record.iter().map(str::to_string).collect());
    }
    Ok(sheet)
}

fn write_sheet(path: &Path, sheet: &Sheet) -> AppResult<()> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    {
        let mut writer = ::csv::WriterBuilder::new()
            .flexible(true)
            .from_path(&tmp)?;
        for row in sheet {
            writer.write_record(row)?;
        }
        writer.flush()?;
    }

    fs::rename(&tmp, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::BookingRecord;
    use crate::ledger::{AbsentMark, PlannedUpdate, UpdateKind};
    use chrono::{TimeZone, Utc};
    use tempfile::TempDir;

    const EN_HEADER: &str =
        "UID,Property Name,Status,Guest Info,Check-in Date,Check-out Date,Nights,Last Updated";

    fn schema() -> LedgerSchema {
        LedgerSchema::new("en", chrono_tz::UTC)
    }

    fn ledger_with(contents: &str) -> (TempDir, CsvLedger) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bookings.csv");
        fs::write(&path, contents).unwrap();
        let ledger = CsvLedger::open(&path, schema()).unwrap();
        (dir, ledger)
    }

    fn record(uid: &str, check_out_day: u32) -> BookingRecord {
        BookingRecord {
            uid: uid.to_string(),
            property_name: "Cabin".to_string(),
            status: "confirmed".to_string(),
            guest_info: "Reserved".to_string(),
            check_in: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            check_out: NaiveDate::from_ymd_opt(2024, 3, check_out_day).unwrap(),
            nights: check_out_day as i64 - 1,
            last_updated: Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap(),
        }
    }

    fn empty_plan() -> ReconciliationPlan<usize> {
        ReconciliationPlan {
            to_insert: Vec::new(),
            to_update: Vec::new(),
            to_mark_absent: Vec::new(),
            marked_at: Utc.with_ymd_and_hms(2024, 4, 1, 6, 30, 0).unwrap(),
        }
    }

    fn first_line(ledger: &CsvLedger) -> String {
        fs::read_to_string(ledger.path())
            .unwrap()
            .lines()
            .next()
            .unwrap_or_default()
            .to_string()
    }

    #[test]
    fn missing_file_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = CsvLedger::open(dir.path().join("nope.csv"), schema());
        assert!(matches!(result, Err(AppError::Config(_))));
    }

    #[tokio::test]
    async fn empty_file_gains_header() {
        let (_dir, mut ledger) = ledger_with("");
        assert!(ledger.load_existing().await.unwrap().is_empty());
        assert_eq!(first_line(&ledger), EN_HEADER);
    }

    #[tokio::test]
    async fn foreign_language_header_is_replaced_in_place() {
        let zh_header = LedgerSchema::new("zh", chrono_tz::UTC).headers().join(",");
        let contents = format!(
            "{}\nu1,Cabin,confirmed,Reserved,2024-03-01,2024-03-04,3,2024-03-01 00:00:00\n",
            zh_header
        );
        let (_dir, mut ledger) = ledger_with(&contents);

        let existing = ledger.load_existing().await.unwrap();
        assert_eq!(first_line(&ledger), EN_HEADER);
        assert_eq!(existing["u1"].location, 2);
    }

    #[tokio::test]
    async fn data_in_first_row_is_pushed_down() {
        let (_dir, mut ledger) = ledger_with(
            "u1,Cabin,confirmed,Reserved,2024-03-01,2024-03-04,3,2024-03-01 00:00:00\n",
        );

        let existing = ledger.load_existing().await.unwrap();
        assert_eq!(first_line(&ledger), EN_HEADER);
        assert_eq!(existing["u1"].location, 2);
    }

    #[tokio::test]
    async fn blank_uid_rows_are_skipped() {
        let contents = format!(
            "{}\n,Cabin,confirmed\nu2,Cabin,confirmed,,2024-03-01,2024-03-02,1,\n",
            EN_HEADER
        );
        let (_dir, mut ledger) = ledger_with(&contents);

        let existing = ledger.load_existing().await.unwrap();
        assert_eq!(existing.len(), 1);
        assert_eq!(existing["u2"].location, 3);
    }

    #[tokio::test]
    async fn apply_writes_and_skips_invalid_locations() {
        let (_dir, mut ledger) = ledger_with("");
        let mut plan = empty_plan();
        plan.to_insert = vec![record("a", 5), record("b", 3)];
        assert_eq!(ledger.apply_plan(&plan).await.unwrap().inserted, 2);

        let existing = ledger.load_existing().await.unwrap();
        assert_eq!(existing["a"].location, 2);
        assert_eq!(existing["b"].location, 3);

        let mut changed = record("a", 7);
        changed.guest_info = "Airbnb (Not available)".to_string();

        let mut plan = empty_plan();
        plan.to_update = vec![
            PlannedUpdate {
                location: 2,
                record: changed,
                kind: UpdateKind::Changed,
            },
            PlannedUpdate {
                location: 42,
                record: record("ghost", 2),
                kind: UpdateKind::Changed,
            },
            PlannedUpdate {
                location: 3,
                record: record("not-b", 2),
                kind: UpdateKind::Refresh,
            },
        ];
        plan.to_mark_absent = vec![AbsentMark {
            uid: "b".to_string(),
            location: 3,
        }];
        plan.to_insert = vec![record("c", 4)];

        let report = ledger.apply_plan(&plan).await.unwrap();
        assert_eq!(
            report,
            ApplyReport {
                inserted: 1,
                updated: 1,
                marked_absent: 1,
                skipped_writes: 2,
            }
        );

        let existing = ledger.load_existing().await.unwrap();
        assert_eq!(existing["a"].row.check_out, "2024-03-07");
        assert_eq!(existing["a"].row.guest_info, "Airbnb (Not available)");
        assert_eq!(existing["b"].row.status, "possibly cancelled");
        assert_eq!(existing["b"].row.last_updated, "2024-04-01 06:30:00");
        assert_eq!(existing["b"].row.check_out, "2024-03-03");
        assert_eq!(existing["c"].location, 4);
    }

    #[tokio::test]
    async fn sort_orders_by_check_out_and_keeps_header() {
        let (_dir, mut ledger) = ledger_with("");
        let mut plan = empty_plan();
        plan.to_insert = vec![record("late", 9), record("early", 2), record("mid", 5)];
        ledger.apply_plan(&plan).await.unwrap();

        ledger.sort_by_check_out().await.unwrap();

        assert_eq!(first_line(&ledger), EN_HEADER);
        let uids: Vec<String> = ledger
            .rows()
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.uid)
            .collect();
        assert_eq!(uids, vec!["early", "mid", "late"]);

        let existing = ledger.load_existing().await.unwrap();
        assert_eq!(existing["early"].location, 2);
        assert_eq!(existing["late"].location, 4);
    }
}
