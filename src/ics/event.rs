use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// STATUS of a VEVENT. Values outside the three standard ones are kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventStatus {
    Confirmed,
    Tentative,
    Cancelled,
    Unknown(String),
}

impl EventStatus {
    /// Case-insensitive parse of a STATUS value.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_uppercase().as_str() {
            "CONFIRMED" => EventStatus::Confirmed,
            "TENTATIVE" => EventStatus::Tentative,
            "CANCELLED" => EventStatus::Cancelled,
            _ => EventStatus::Unknown(raw.to_string()),
        }
    }
}

impl Default for EventStatus {
    fn default() -> Self {
        EventStatus::Confirmed
    }
}

/// A validated booking event taken from a feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalendarEvent {
    pub uid: String,
    pub summary: Option<String>,
    pub description: Option<String>,
    pub status: EventStatus,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_parse_is_case_insensitive() {
        assert_eq!(EventStatus::parse("confirmed"), EventStatus::Confirmed);
        assert_eq!(EventStatus::parse("Tentative"), EventStatus::Tentative);
        assert_eq!(EventStatus::parse("CANCELLED"), EventStatus::Cancelled);
    }

    #[test]
    fn unknown_status_keeps_raw_value() {
        assert_eq!(
            EventStatus::parse("Blocked"),
            EventStatus::Unknown("Blocked".to_string())
        );
    }
}
