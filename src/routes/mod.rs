use std::sync::Arc;

use axum::{routing::get, Router};

use crate::AppState;

pub mod bookings;
pub mod feeds;
pub mod health;
pub mod sync;

/// All API routes with shared state attached. Middleware layers are added by
/// the binary.
pub fn app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health::health_check))
        .nest("/api/feeds", feeds::router())
        .nest("/api/sync", sync::router())
        .nest("/api/bookings", bookings::router())
        .with_state(state)
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;

    use async_trait::async_trait;
    use axum::body::Body;
    use http::{Request, Response};
    use http_body_util::BodyExt;

    use crate::config::Config;
    use crate::services::fetcher::{FeedFetcher, FetchError};
    use crate::AppState;

    /// Fetcher for route tests: every feed is unreachable.
    pub struct OfflineFetcher;

    #[async_trait]
    impl FeedFetcher for OfflineFetcher {
        async fn fetch(&self, _url: &str) -> Result<String, FetchError> {
            Err(FetchError::Status(503))
        }
    }

    pub async fn state() -> Arc<AppState> {
        let pool = crate::db::test_pool().await;
        Arc::new(AppState::new(pool, Config::default(), Arc::new(OfflineFetcher)).unwrap())
    }

    pub fn json_request(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(http::header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    pub fn empty_request(method: &str, uri: &str) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap()
    }

    pub async fn body_json(response: Response<Body>) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }
}
