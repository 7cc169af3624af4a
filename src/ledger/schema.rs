use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;

use crate::config::{ConfigError, LedgerConfig};
use crate::i18n;
use crate::ics::EventStatus;

pub const DATE_FORMAT: &str = "%Y-%m-%d";
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Ledger columns in contract order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Column {
    Uid,
    PropertyName,
    Status,
    GuestInfo,
    CheckIn,
    CheckOut,
    Nights,
    LastUpdated,
}

impl Column {
    pub const ALL: [Column; 8] = [
        Column::Uid,
        Column::PropertyName,
        Column::Status,
        Column::GuestInfo,
        Column::CheckIn,
        Column::CheckOut,
        Column::Nights,
        Column::LastUpdated,
    ];

    /// Zero-based position of the column in a ledger row.
    pub fn index(self) -> usize {
        self as usize
    }

    fn label_key(self) -> &'static str {
        match self {
            Column::Uid => "ledger.header.uid",
            Column::PropertyName => "ledger.header.property_name",
            Column::Status => "ledger.header.status",
            Column::GuestInfo => "ledger.header.guest_info",
            Column::CheckIn => "ledger.header.check_in",
            Column::CheckOut => "ledger.header.check_out",
            Column::Nights => "ledger.header.nights",
            Column::LastUpdated => "ledger.header.last_updated",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusLabels {
    pub confirmed: String,
    pub tentative: String,
    pub cancelled: String,
    pub possibly_cancelled: String,
}

/// Immutable description of the ledger layout shared by the reconciler and
/// the store adapters: header labels, status labels and the timezone used to
/// render dates.
#[derive(Debug, Clone)]
pub struct LedgerSchema {
    language: String,
    headers: Vec<String>,
    statuses: StatusLabels,
    timezone: Tz,
}

impl LedgerSchema {
    pub fn new(language: &str, timezone: Tz) -> Self {
        let language = i18n::normalize_language(language);
        let lang = Some(language.as_str());

        let headers = Column::ALL
            .iter()
            .map(|c| i18n::tr(lang, c.label_key(), None))
            .collect();

        let statuses = StatusLabels {
            confirmed: i18n::tr(lang, "status.confirmed", None),
            tentative: i18n::tr(lang, "status.tentative", None),
            cancelled: i18n::tr(lang, "status.cancelled", None),
            possibly_cancelled: i18n::tr(lang, "status.possibly_cancelled", None),
        };

        Self {
            language,
            headers,
            statuses,
            timezone,
        }
    }

    pub fn from_config(config: &LedgerConfig) -> Result<Self, ConfigError> {
        let language = i18n::normalize_language(&config.language);
        if !i18n::is_supported_language(&language) {
            return Err(ConfigError::InvalidValue("LEDGER_LANGUAGE".to_string()));
        }
        Ok(Self::new(&language, config.tz()?))
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn statuses(&self) -> &StatusLabels {
        &self.statuses
    }

    pub fn timezone(&self) -> Tz {
        self.timezone
    }

    /// Display label for a feed status. Unknown values pass through unchanged.
    pub fn status_label(&self, status: &EventStatus) -> String {
        match status {
            EventStatus::Confirmed => self.statuses.confirmed.clone(),
            EventStatus::Tentative => self.statuses.tentative.clone(),
            EventStatus::Cancelled => self.statuses.cancelled.clone(),
            EventStatus::Unknown(raw) => raw.clone(),
        }
    }

    /// True for statuses that must not be downgraded to "possibly cancelled".
    pub fn is_terminal_status(&self, stored: &str) -> bool {
        stored == self.statuses.cancelled || stored == self.statuses.possibly_cancelled
    }

    /// Calendar date of an instant in the ledger timezone.
    pub fn local_date(&self, instant: DateTime<Utc>) -> NaiveDate {
        instant.with_timezone(&self.timezone).date_naive()
    }

    pub fn format_date(&self, date: NaiveDate) -> String {
        date.format(DATE_FORMAT).to_string()
    }

    pub fn format_timestamp(&self, instant: DateTime<Utc>) -> String {
        instant
            .with_timezone(&self.timezone)
            .format(TIMESTAMP_FORMAT)
            .to_string()
    }

    /// Parse a stored "last updated" cell back into an instant.
    pub fn parse_timestamp(&self, value: &str) -> Option<DateTime<Utc>> {
        let naive = NaiveDateTime::parse_from_str(value.trim(), TIMESTAMP_FORMAT).ok()?;
        self.timezone
            .from_local_datetime(&naive)
            .earliest()
            .map(|dt| dt.with_timezone(&Utc))
    }

    /// True when `row` is exactly this schema's header.
    pub fn is_header(&self, row: &[String]) -> bool {
        row.len() >= self.headers.len()
            && row.iter().zip(self.headers.iter()).all(|(a, b)| a == b)
    }

    /// True when `row` looks like a header of any supported language or is
    /// empty, i.e. it can be overwritten without losing a booking.
    pub fn is_replaceable_header(&self, row: &[String]) -> bool {
        match row.first().map(|c| c.trim()) {
            None | Some("") => true,
            Some(first) => i18n::all_translations_of(Column::Uid.label_key())
                .iter()
                .any(|label| label == first),
        }
    }
}
