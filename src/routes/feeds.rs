use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, put},
    Json, Router,
};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::db::models::{CreateFeedSource, FeedSource, UpdateFeedSource};
use crate::db::FeedSourceRepository;
use crate::error::{AppError, AppResult};
use crate::i18n;
use crate::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_feeds).post(create_feed))
        .route("/:id", put(update_feed).delete(delete_feed))
}

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct CreateFeedRequest {
    pub property_name: String,
    pub url: String,
    /// Defaults to the configured enabled marker.
    pub enabled: Option<String>,
    pub position: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateFeedRequest {
    pub property_name: Option<String>,
    pub url: Option<String>,
    pub enabled: Option<String>,
    pub position: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct FeedResponse {
    pub id: String,
    pub position: i64,
    pub property_name: String,
    pub url: String,
    pub enabled: String,
    /// Whether `enabled` matches the configured marker.
    pub active: bool,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl FeedResponse {
    fn new(feed: FeedSource, marker: &str) -> Self {
        let active = feed.to_raw(marker).enabled;
        Self {
            id: feed.id,
            position: feed.position,
            property_name: feed.property_name,
            url: feed.url,
            enabled: feed.enabled,
            active,
            created_at: feed.created_at,
            updated_at: feed.updated_at,
        }
    }
}

fn validate_property_name(name: &str) -> AppResult<()> {
    if name.trim().is_empty() {
        return Err(AppError::Validation(i18n::t("skip.blank_property_name")));
    }
    Ok(())
}

fn validate_url(url: &str) -> AppResult<()> {
    let ok = Url::parse(url.trim())
        .map(|u| matches!(u.scheme(), "http" | "https"))
        .unwrap_or(false);
    if !ok {
        return Err(AppError::Validation(i18n::tr(
            None,
            "skip.invalid_url",
            Some(&[("url", url)]),
        )));
    }
    Ok(())
}

// ============================================================================
// Handlers
// ============================================================================

async fn list_feeds(State(state): State<Arc<AppState>>) -> AppResult<Json<Vec<FeedResponse>>> {
    let marker = &state.config.sync.enabled_marker;
    let feeds = FeedSourceRepository::list_ordered(&state.db).await?;
    Ok(Json(
        feeds
            .into_iter()
            .map(|f| FeedResponse::new(f, marker))
            .collect(),
    ))
}

async fn create_feed(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CreateFeedRequest>,
) -> AppResult<(StatusCode, Json<FeedResponse>)> {
    validate_property_name(&body.property_name)?;
    validate_url(&body.url)?;

    let marker = &state.config.sync.enabled_marker;
    let feed = FeedSourceRepository::create(
        &state.db,
        CreateFeedSource {
            property_name: body.property_name.trim().to_string(),
            url: body.url.trim().to_string(),
            enabled: body.enabled.unwrap_or_else(|| marker.clone()),
            position: body.position,
        },
    )
    .await?;

    tracing::info!("Created feed {} for {}", feed.id, feed.property_name);
    Ok((StatusCode::CREATED, Json(FeedResponse::new(feed, marker))))
}

async fn update_feed(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<UpdateFeedRequest>,
) -> AppResult<Json<FeedResponse>> {
    if let Some(ref name) = body.property_name {
        validate_property_name(name)?;
    }
    if let Some(ref url) = body.url {
        validate_url(url)?;
    }

    let update = UpdateFeedSource {
        property_name: body.property_name.map(|s| s.trim().to_string()),
        url: body.url.map(|s| s.trim().to_string()),
        enabled: body.enabled,
        position: body.position,
    };

    let feed = FeedSourceRepository::update(&state.db, &id, update)
        .await?
        .ok_or_else(|| AppError::NotFound(i18n::t("not_found.feed")))?;

    Ok(Json(FeedResponse::new(
        feed,
        &state.config.sync.enabled_marker,
    )))
}

async fn delete_feed(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> AppResult<StatusCode> {
    if FeedSourceRepository::delete(&state.db, &id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound(i18n::t("not_found.feed")))
    }
}
