use sqlx::{FromRow, SqlitePool};

use crate::db::models::LedgerRow;
use crate::error::{AppError, AppResult};

/// A `bookings` row with its row id.
#[derive(Debug, Clone, FromRow)]
pub struct BookingRowWithId {
    pub id: i64,
    #[sqlx(flatten)]
    pub row: LedgerRow,
}

/// Repository for the booking ledger (`bookings` table).
///
/// Rows keep a `position` column so the ledger has a stable display order:
/// inserts go last, `reorder_by_check_out` renumbers every row.
pub struct BookingRepository;

impl BookingRepository {
    /// Whether the `bookings` table exists in the connected database.
    pub async fn table_exists(pool: &SqlitePool) -> AppResult<bool> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'bookings'",
        )
        .fetch_one(pool)
        .await
        .map_err(AppError::Database)?;
        Ok(count > 0)
    }

    /// Every ledger row in display order.
    pub async fn list_with_ids(pool: &SqlitePool) -> AppResult<Vec<BookingRowWithId>> {
        sqlx::query_as::<_, BookingRowWithId>(
            r#"
            SELECT
                id,
                uid,
                property_name,
                status,
                guest_info,
                check_in,
                check_out,
                nights,
                last_updated
            FROM bookings
            ORDER BY position ASC, id ASC
            "#,
        )
        .fetch_all(pool)
        .await
        .map_err(AppError::Database)
    }

    /// Append a row at the end of the ledger and return its id.
    pub async fn insert(pool: &SqlitePool, row: &LedgerRow) -> AppResult<i64> {
        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO bookings (
                uid,
                property_name,
                status,
                guest_info,
                check_in,
                check_out,
                nights,
                last_updated,
                position
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, (SELECT COALESCE(MAX(position), -1) + 1 FROM bookings))
            RETURNING id
            "#,
        )
        .bind(&row.uid)
        .bind(&row.property_name)
        .bind(&row.status)
        .bind(&row.guest_info)
        .bind(&row.check_in)
        .bind(&row.check_out)
        .bind(row.nights)
        .bind(&row.last_updated)
        .fetch_one(pool)
        .await
        .map_err(AppError::Database)?;

        Ok(id)
    }

    /// Overwrite every data column of the row at `id`.
    /// Returns false when no row has that id.
    pub async fn update_row(pool: &SqlitePool, id: i64, row: &LedgerRow) -> AppResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE bookings
            SET uid = ?,
                property_name = ?,
                status = ?,
                guest_info = ?,
                check_in = ?,
                check_out = ?,
                nights = ?,
                last_updated = ?
            WHERE id = ?
            "#,
        )
        .bind(&row.uid)
        .bind(&row.property_name)
        .bind(&row.status)
        .bind(&row.guest_info)
        .bind(&row.check_in)
        .bind(&row.check_out)
        .bind(row.nights)
        .bind(&row.last_updated)
        .bind(id)
        .execute(pool)
        .await
        .map_err(AppError::Database)?;

        Ok(result.rows_affected() > 0)
    }

    /// Rewrite only the status and last-updated columns.
    pub async fn update_status(
        pool: &SqlitePool,
        id: i64,
        status: &str,
        last_updated: &str,
    ) -> AppResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE bookings
            SET status = ?,
                last_updated = ?
            WHERE id = ?
            "#,
        )
        .bind(status)
        .bind(last_updated)
        .bind(id)
        .execute(pool)
        .await
        .map_err(AppError::Database)?;

        Ok(result.rows_affected() > 0)
    }

    /// Renumber positions so rows are ordered by check-out date ascending.
    /// Rows with equal check-out keep their relative order.
    pub async fn reorder_by_check_out(pool: &SqlitePool) -> AppResult<()> {
        let ids: Vec<i64> = sqlx::query_scalar(
            "SELECT id FROM bookings ORDER BY check_out ASC, position ASC, id ASC",
        )
        .fetch_all(pool)
        .await
        .map_err(AppError::Database)?;

        let mut tx = pool.begin().await.map_err(AppError::Database)?;
        for (position, id) in ids.iter().enumerate() {
            sqlx::query("UPDATE bookings SET position = ? WHERE id = ?")
                .bind(position as i64)
                .bind(id)
                .execute(&mut *tx)
                .await
                .map_err(AppError::Database)?;
        }
        tx.commit().await.map_err(AppError::Database)?;

        Ok(())
    }
}
