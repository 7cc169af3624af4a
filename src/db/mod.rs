pub mod models;
pub mod repository;

pub use repository::{BookingRepository, FeedSourceRepository};

/// In-memory database with migrations applied, for tests.
///
/// A single connection that never expires keeps the in-memory database alive
/// for the lifetime of the pool.
#[cfg(test)]
pub async fn test_pool() -> sqlx::SqlitePool {
    let pool = sqlx::sqlite::SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await
        .expect("open in-memory database");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("run migrations");
    pool
}
