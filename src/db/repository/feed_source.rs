use chrono::Utc;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::db::models::{CreateFeedSource, FeedSource, UpdateFeedSource};
use crate::error::{AppError, AppResult};

/// Repository for the ordered feed list (`feed_sources` table).
pub struct FeedSourceRepository;

impl FeedSourceRepository {
    /// All feed sources in processing order.
    pub async fn list_ordered(pool: &SqlitePool) -> AppResult<Vec<FeedSource>> {
        sqlx::query_as::<_, FeedSource>(
            r#"
            SELECT
                id,
                position,
                property_name,
                url,
                enabled,
                created_at,
                updated_at
            FROM feed_sources
            ORDER BY position ASC, created_at ASC
            "#,
        )
        .fetch_all(pool)
        .await
        .map_err(AppError::Database)
    }

    pub async fn find_by_id(pool: &SqlitePool, id: &str) -> AppResult<Option<FeedSource>> {
        sqlx::query_as::<_, FeedSource>(
            r#"
            SELECT
                id,
                position,
                property_name,
                url,
                enabled,
                created_at,
                updated_at
            FROM feed_sources
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(AppError::Database)
    }

    /// Create a feed source. Without an explicit position it goes last.
    pub async fn create(pool: &SqlitePool, create: CreateFeedSource) -> AppResult<FeedSource> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now().naive_utc();

        let position = match create.position {
            Some(p) => p,
            None => {
                let max: Option<i64> =
                    sqlx::query_scalar("SELECT MAX(position) FROM feed_sources")
                        .fetch_one(pool)
                        .await
                        .map_err(AppError::Database)?;
                max.map(|m| m + 1).unwrap_or(0)
            }
        };

        sqlx::query_as::<_, FeedSource>(
            r#"
            INSERT INTO feed_sources (
                id,
                position,
                property_name,
                url,
                enabled,
                created_at,
                updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?)
            RETURNING
                id,
                position,
                property_name,
                url,
                enabled,
                created_at,
                updated_at
            "#,
        )
        .bind(id)
        .bind(position)
        .bind(create.property_name)
        .bind(create.url)
        .bind(create.enabled)
        .bind(now)
        .bind(now)
        .fetch_one(pool)
        .await
        .map_err(AppError::Database)
    }

    /// Apply a partial update. Returns `None` when the id is unknown.
    pub async fn update(
        pool: &SqlitePool,
        id: &str,
        update: UpdateFeedSource,
    ) -> AppResult<Option<FeedSource>> {
        let Some(existing) = Self::find_by_id(pool, id).await? else {
            return Ok(None);
        };
        let now = Utc::now().naive_utc();

        sqlx::query_as::<_, FeedSource>(
            r#"
            UPDATE feed_sources
            SET position = ?,
                property_name = ?,
                url = ?,
                enabled = ?,
                updated_at = ?
            WHERE id = ?
            RETURNING
                id,
                position,
                property_name,
                url,
                enabled,
                created_at,
                updated_at
            "#,
        )
        .bind(update.position.unwrap_or(existing.position))
        .bind(update.property_name.unwrap_or(existing.property_name))
        .bind(update.url.unwrap_or(existing.url))
        .bind(update.enabled.unwrap_or(existing.enabled))
        .bind(now)
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(AppError::Database)
    }

    /// Delete a feed source. Returns whether a row was removed.
    pub async fn delete(pool: &SqlitePool, id: &str) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM feed_sources WHERE id = ?")
            .bind(id)
            .execute(pool)
            .await
            .map_err(AppError::Database)?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_pool;

    fn create(name: &str, position: Option<i64>) -> CreateFeedSource {
        CreateFeedSource {
            property_name: name.to_string(),
            url: format!("https://example.com/{}.ics", name),
            enabled: "enabled".to_string(),
            position,
        }
    }

    #[tokio::test]
    async fn create_appends_and_lists_in_order() {
        let pool = test_pool().await;

        let a = FeedSourceRepository::create(&pool, create("a", None)).await.unwrap();
        let b = FeedSourceRepository::create(&pool, create("b", None)).await.unwrap();
        let first = FeedSourceRepository::create(&pool, create("first", Some(-1)))
            .await
            .unwrap();

        assert_eq!(a.position, 0);
        assert_eq!(b.position, 1);

        let names: Vec<String> = FeedSourceRepository::list_ordered(&pool)
            .await
            .unwrap()
            .into_iter()
            .map(|f| f.property_name)
            .collect();
        assert_eq!(names, vec![first.property_name, a.property_name, b.property_name]);
    }

    #[tokio::test]
    async fn update_and_delete() {
        let pool = test_pool().await;
        let feed = FeedSourceRepository::create(&pool, create("loft", None)).await.unwrap();

        let updated = FeedSourceRepository::update(
            &pool,
            &feed.id,
            UpdateFeedSource {
                enabled: Some("disabled".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap()
        .unwrap();
        assert_eq!(updated.enabled, "disabled");
        assert_eq!(updated.property_name, "loft");

        let missing = FeedSourceRepository::update(&pool, "nope", UpdateFeedSource::default())
            .await
            .unwrap();
        assert!(missing.is_none());

        assert!(FeedSourceRepository::delete(&pool, &feed.id).await.unwrap());
        assert!(!FeedSourceRepository::delete(&pool, &feed.id).await.unwrap());
    }
}
