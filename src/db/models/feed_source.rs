use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

// ============================================================================
// Feed source configuration rows
// ============================================================================

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct FeedSource {
    pub id: String,
    /// Processing order; lower positions are processed first.
    pub position: i64,
    pub property_name: String,
    pub url: String,
    /// Raw value of the enabled column, compared against the configured marker.
    pub enabled: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateFeedSource {
    pub property_name: String,
    pub url: String,
    pub enabled: String,
    /// Appended at the end when omitted.
    pub position: Option<i64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateFeedSource {
    pub property_name: Option<String>,
    pub url: Option<String>,
    pub enabled: Option<String>,
    pub position: Option<i64>,
}

/// The per-run view of a feed source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RawFeedSource {
    pub property_name: String,
    pub url: String,
    pub enabled: bool,
}

impl FeedSource {
    /// The enabled flag is an exact (trimmed) match against `marker`;
    /// no truthy parsing takes place.
    pub fn to_raw(&self, marker: &str) -> RawFeedSource {
        RawFeedSource {
            property_name: self.property_name.clone(),
            url: self.url.clone(),
            enabled: self.enabled.trim() == marker,
        }
    }
}
