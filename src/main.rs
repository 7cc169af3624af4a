use std::sync::Arc;
use std::time::Duration;

use http::HeaderValue;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ical_booking_sync::config::Config;
use ical_booking_sync::routes;
use ical_booking_sync::services::{fetcher::HttpFeedFetcher, init};
use ical_booking_sync::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ical_booking_sync=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;

    tracing::info!(
        "Starting iCal booking sync (ledger backend: {:?})",
        config.ledger.backend
    );

    let pool = init::init_db(&config).await?;
    let fetcher = Arc::new(HttpFeedFetcher::new(&config.fetch)?);
    let app_state = Arc::new(AppState::new(pool, config.clone(), fetcher)?);

    let (shutdown_tx, _shutdown_rx) = tokio::sync::broadcast::channel::<()>(1);
    let bg_handles = init::spawn_background_workers(app_state.clone(), shutdown_tx.clone());

    let mut app = routes::app(app_state).layer(TraceLayer::new_for_http());
    if let Some(ref origin) = config.server.cors_allowed_origin {
        let origin = origin
            .parse::<HeaderValue>()
            .map_err(|_| anyhow::anyhow!("Invalid CORS_ALLOWED_ORIGIN: {}", origin))?;
        app = app.layer(
            CorsLayer::new()
                .allow_origin(origin)
                .allow_methods([
                    http::Method::GET,
                    http::Method::POST,
                    http::Method::PUT,
                    http::Method::DELETE,
                    http::Method::OPTIONS,
                ])
                .allow_headers([http::header::CONTENT_TYPE, http::header::ACCEPT]),
        );
    }

    let addr = format!("{}:{}", config.server.host, config.server.port);
    tracing::info!("Server listening on {}", addr);

    // Serve until a shutdown signal arrives, then notify the sync worker and
    // drop the server future so no new connections are accepted.
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    let server_fut = axum::serve(listener, app.into_make_service());

    let shutdown_tx_clone = shutdown_tx.clone();
    let signal_fut = async move {
        let ctrl_c = tokio::signal::ctrl_c();

        #[cfg(unix)]
        {
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(mut term) => {
                    tokio::select! {
                        _ = ctrl_c => {},
                        _ = term.recv() => {},
                    }
                }
                Err(e) => {
                    tracing::warn!("Failed to bind SIGTERM, waiting for Ctrl+C only: {}", e);
                    let _ = ctrl_c.await;
                }
            }
        }

        #[cfg(not(unix))]
        {
            let _ = ctrl_c.await;
        }

        tracing::info!("Shutdown signal received, notifying sync worker");
        let _ = shutdown_tx_clone.send(());
    };

    tokio::select! {
        res = server_fut => {
            if let Err(e) = res {
                tracing::error!("Server error: {}", e);
            }
        }
        _ = signal_fut => {
            tracing::info!("Signal handler completed; server stopped accepting connections");
        }
    }

    // A run in progress is not interrupted; give it a bounded time to finish.
    let shutdown_wait = Duration::from_secs(15);
    tracing::info!(
        "Waiting up to {}s for the sync worker to exit",
        shutdown_wait.as_secs()
    );
    let bg_wait = async {
        for h in bg_handles {
            let _ = h.await;
        }
    };
    if tokio::time::timeout(shutdown_wait, bg_wait).await.is_err() {
        tracing::warn!("Sync worker did not exit in time");
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
