use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::ics::CalendarEvent;
use crate::ledger::schema::{Column, LedgerSchema};

// ============================================================================
// Booking ledger models
// ============================================================================

/// Fresh booking data derived from a feed event during a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookingRecord {
    pub uid: String,
    pub property_name: String,
    /// Localized status label.
    pub status: String,
    pub guest_info: String,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    pub nights: i64,
    pub last_updated: DateTime<Utc>,
}

impl BookingRecord {
    pub fn from_event(
        event: &CalendarEvent,
        property_name: &str,
        schema: &LedgerSchema,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            uid: event.uid.clone(),
            property_name: property_name.to_string(),
            status: schema.status_label(&event.status),
            guest_info: event.summary.clone().unwrap_or_default(),
            check_in: schema.local_date(event.start),
            check_out: schema.local_date(event.end),
            nights: nights_between(event.start, event.end),
            last_updated: now,
        }
    }

    /// Render the record into its stored textual form.
    pub fn to_row(&self, schema: &LedgerSchema) -> LedgerRow {
        LedgerRow {
            uid: self.uid.clone(),
            property_name: self.property_name.clone(),
            status: self.status.clone(),
            guest_info: self.guest_info.clone(),
            check_in: schema.format_date(self.check_in),
            check_out: schema.format_date(self.check_out),
            nights: self.nights,
            last_updated: schema.format_timestamp(self.last_updated),
        }
    }

    /// True when any field the ledger tracks differs from the stored row.
    /// `nights` and `last_updated` are derived/bookkeeping and not compared.
    pub fn differs_from(&self, stored: &LedgerRow, schema: &LedgerSchema) -> bool {
        stored.status != self.status
            || stored.check_in != schema.format_date(self.check_in)
            || stored.check_out != schema.format_date(self.check_out)
            || stored.guest_info != self.guest_info
            || stored.property_name != self.property_name
    }
}

/// Whole nights between two instants, rounded to the nearest day.
/// Negative or zero durations give 0.
pub fn nights_between(start: DateTime<Utc>, end: DateTime<Utc>) -> i64 {
    let secs = (end - start).num_seconds();
    if secs <= 0 {
        return 0;
    }
    (secs as f64 / 86_400.0).round() as i64
}

/// A ledger row exactly as persisted, in contract column order.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct LedgerRow {
    pub uid: String,
    pub property_name: String,
    pub status: String,
    pub guest_info: String,
    pub check_in: String,
    pub check_out: String,
    pub nights: i64,
    pub last_updated: String,
}

impl LedgerRow {
    pub fn to_cells(&self) -> Vec<String> {
        vec![
            self.uid.clone(),
            self.property_name.clone(),
            self.status.clone(),
            self.guest_info.clone(),
            self.check_in.clone(),
            self.check_out.clone(),
            self.nights.to_string(),
            self.last_updated.clone(),
        ]
    }

    /// Build a row from sheet cells. Missing cells read as empty, a
    /// non-numeric nights cell reads as 0. Only the UID and nights are trimmed.
    pub fn from_cells(cells: &[String]) -> Self {
        // Cells are kept verbatim so they compare equal to what a sync wrote.
        let cell = |c: Column| cells.get(c.index()).cloned().unwrap_or_default();

        Self {
            uid: cell(Column::Uid).trim().to_string(),
            property_name: cell(Column::PropertyName),
            status: cell(Column::Status),
            guest_info: cell(Column::GuestInfo),
            check_in: cell(Column::CheckIn),
            check_out: cell(Column::CheckOut),
            nights: cell(Column::Nights).trim().parse().unwrap_or(0),
            last_updated: cell(Column::LastUpdated),
        }
    }
}

/// A stored row together with the adapter's location for it.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredBooking<L> {
    pub row: LedgerRow,
    pub location: L,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ics::EventStatus;
    use chrono::TimeZone;

    fn utc(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
    }

    #[test]
    fn nights_count_whole_days() {
        assert_eq!(nights_between(utc(2024, 1, 10, 0), utc(2024, 1, 13, 0)), 3);
        assert_eq!(nights_between(utc(2024, 1, 10, 15), utc(2024, 1, 13, 11)), 3);
        assert_eq!(nights_between(utc(2024, 1, 10, 0), utc(2024, 1, 10, 0)), 0);
    }

    #[test]
    fn nights_never_negative() {
        assert_eq!(nights_between(utc(2024, 1, 13, 0), utc(2024, 1, 10, 0)), 0);
    }

    #[test]
    fn record_from_event_uses_schema() {
        let schema = LedgerSchema::new("en", chrono_tz::UTC);
        let event = CalendarEvent {
            uid: "u1".to_string(),
            summary: None,
            description: None,
            status: EventStatus::Tentative,
            start: utc(2024, 1, 10, 0),
            end: utc(2024, 1, 13, 0),
        };
        let now = utc(2024, 1, 1, 9);
        let record = BookingRecord::from_event(&event, "Loft", &schema, now);

        assert_eq!(record.status, "tentative");
        assert_eq!(record.guest_info, "");
        assert_eq!(record.nights, 3);

        let row = record.to_row(&schema);
        assert_eq!(row.check_in, "2024-01-10");
        assert_eq!(row.check_out, "2024-01-13");
        assert_eq!(row.last_updated, "2024-01-01 09:00:00");
        assert!(!record.differs_from(&row, &schema));

        let mut moved = row.clone();
        moved.check_out = "2024-01-14".to_string();
        assert!(record.differs_from(&moved, &schema));
    }

    #[test]
    fn cells_round_trip_and_tolerate_short_rows() {
        let row = LedgerRow {
            uid: "u1".to_string(),
            property_name: "Loft".to_string(),
            status: "confirmed".to_string(),
            guest_info: "Reserved".to_string(),
            check_in: "2024-01-10".to_string(),
            check_out: "2024-01-13".to_string(),
            nights: 3,
            last_updated: "2024-01-01 09:00:00".to_string(),
        };
        assert_eq!(LedgerRow::from_cells(&row.to_cells()), row);

        let short = LedgerRow::from_cells(&["u2".to_string(), "Cabin".to_string()]);
        assert_eq!(short.uid, "u2");
        assert_eq!(short.nights, 0);
        assert_eq!(short.last_updated, "");
    }

    #[test]
    fn untrimmed_feed_values_survive_a_sheet_pass() {
        let schema = LedgerSchema::new("en", chrono_tz::UTC);
        let event = CalendarEvent {
            uid: "u1".to_string(),
            summary: Some(" Jane Doe".to_string()),
            description: None,
            status: EventStatus::Confirmed,
            start: utc(2024, 1, 10, 0),
            end: utc(2024, 1, 13, 0),
        };
        let record = BookingRecord::from_event(&event, "Loft", &schema, utc(2024, 1, 1, 9));

        let mut cells = record.to_row(&schema).to_cells();
        cells[0] = " u1 ".to_string();
        cells[6] = " 3".to_string();
        let read_back = LedgerRow::from_cells(&cells);

        assert_eq!(read_back.uid, "u1");
        assert_eq!(read_back.guest_info, " Jane Doe");
        assert_eq!(read_back.nights, 3);
        assert!(!record.differs_from(&read_back, &schema));
    }
}
